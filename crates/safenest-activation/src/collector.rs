//! Profile collection: child, app allow-list, and filter policy.
//!
//! Each step turns user input into a state-machine [`Event`]. Input is
//! validated locally first; a validation failure never reaches the network.

use safenest_client::children::{ChildClient, CreateChildRequest};
use safenest_core::{
    age_on, parse_dob, AppCatalog, AppCatalogEntry, AppId, ChildId, FilterPolicy, ValidationError,
};
use safenest_state::{ActivationSession, Event};

use crate::binder::summarize;
use crate::clock::Clock;
use crate::error::ActivationError;
use crate::gate::OperatorIdentity;

/// User input for a new child profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewChild {
    /// Display name. Required.
    pub name: String,
    /// Date of birth as entered, `YYYY-MM-DD`. Required.
    pub dob: Option<String>,
}

/// Turns user choices into validated events.
#[derive(Debug, Clone)]
pub struct ProfileCollector<C> {
    children: ChildClient,
    catalog: AppCatalog,
    clock: C,
}

impl<C: Clock> ProfileCollector<C> {
    /// Collector over the child client and app catalog.
    pub fn new(children: ChildClient, catalog: AppCatalog, clock: C) -> Self {
        Self {
            children,
            catalog,
            clock,
        }
    }

    /// The app catalog.
    pub fn catalog(&self) -> &AppCatalog {
        &self.catalog
    }

    /// Choose a child already known to the session.
    ///
    /// The child needs a date of birth so its age can drive app filtering.
    pub fn select_existing_child(
        &self,
        session: &ActivationSession,
        child_id: &ChildId,
    ) -> Result<Event, ValidationError> {
        let child = session
            .known_children()
            .iter()
            .find(|c| &c.id == child_id)
            .ok_or_else(|| ValidationError::UnknownChild(child_id.to_string()))?;
        let dob = child.dob.ok_or(ValidationError::MissingDateOfBirth)?;
        let age = age_on(dob, self.clock.today())?;
        Ok(Event::ChildChosen {
            child: child.clone(),
            age,
            created: false,
        })
    }

    /// Validate `new_child` locally, then create it on the backend.
    ///
    /// The derived age stays local; only name, date of birth and parent
    /// are sent.
    pub async fn create_child(
        &self,
        operator: &OperatorIdentity,
        new_child: &NewChild,
    ) -> Result<Event, ActivationError> {
        let name = new_child.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingChildName.into());
        }
        let dob = parse_dob(new_child.dob.as_deref().unwrap_or_default())?;
        let age = age_on(dob, self.clock.today())?;

        let req = CreateChildRequest {
            name: name.to_string(),
            dob,
            parent_id: operator.operator_id.clone(),
        };
        let record = self
            .children
            .create(&req, &operator.access_token)
            .await
            .map_err(ActivationError::ChildCreation)?;
        tracing::info!(child_id = %record.id, age, "child profile created");

        let mut child = summarize(record);
        // Keep the validated DOB even if the backend echoes none.
        child.dob.get_or_insert(dob);
        Ok(Event::ChildChosen {
            child,
            age,
            created: true,
        })
    }

    /// Catalog entries a child of `age` may be given.
    pub fn available_apps(&self, age: u32) -> Vec<&AppCatalogEntry> {
        self.catalog.eligible_for(age)
    }

    /// Validate an app selection for a child of `age`.
    pub fn select_apps(
        &self,
        age: u32,
        app_ids: impl IntoIterator<Item = AppId>,
    ) -> Result<Event, ValidationError> {
        let app_ids = self.catalog.validate_selection(age, app_ids)?;
        Ok(Event::AppsChosen { app_ids })
    }

    /// Record the filter policy. Purely local until publishing.
    pub fn set_filter_policy(&self, policy: FilterPolicy) -> Event {
        Event::PolicyChosen { policy }
    }
}
