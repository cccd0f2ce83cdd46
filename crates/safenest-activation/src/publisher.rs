//! Configuration publishing.
//!
//! The push is authorized with the device credential from polling, never
//! the operator token. No request is made unless the session has both a
//! credential and a child.

use safenest_client::postinstall::{PostinstallClient, PostinstallPayload, WebFilterConfig};
use safenest_state::{ActivationSession, TransitionError};

use crate::error::PublishError;

/// Pushes a session's configuration snapshot to the device endpoint.
#[derive(Debug, Clone)]
pub struct ConfigPublisher {
    postinstall: PostinstallClient,
}

impl ConfigPublisher {
    /// Publisher over the postinstall client.
    pub fn new(postinstall: PostinstallClient) -> Self {
        Self { postinstall }
    }

    /// The payload `session` would publish.
    ///
    /// # Errors
    ///
    /// [`PublishError::Precondition`] when the credential or child is missing.
    pub fn payload(session: &ActivationSession) -> Result<PostinstallPayload, PublishError> {
        let (_, child_id) = session.ensure_publishable().map_err(precondition)?;
        Ok(PostinstallPayload {
            device_id: session.device_code().clone(),
            child_id: child_id.clone(),
            app_ids: session.selected_app_ids().clone(),
            web_filter_config: WebFilterConfig::from(session.filter_policy()),
        })
    }

    /// Publish `session`. Re-publishing overwrites the device configuration.
    pub async fn publish(&self, session: &ActivationSession) -> Result<(), PublishError> {
        let (credential, _) = session.ensure_publishable().map_err(precondition)?;
        let payload = Self::payload(session)?;

        self.postinstall
            .push(&payload, credential)
            .await
            .map_err(PublishError::from_api)?;
        tracing::info!(
            device_code = %payload.device_id,
            child_id = %payload.child_id,
            dns_profile = payload.web_filter_config.dns_profile_id.is_some(),
            "device configuration published"
        );
        Ok(())
    }
}

fn precondition(err: TransitionError) -> PublishError {
    match err {
        TransitionError::PublishPrecondition { missing } => PublishError::Precondition { missing },
        _ => PublishError::Precondition {
            missing: "publishable session",
        },
    }
}
