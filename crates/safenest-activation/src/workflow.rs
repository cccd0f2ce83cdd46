//! The activation workflow: an effect executor around [`ActivationSession`].
//!
//! User actions and collaborator results become [`Event`]s; the session's
//! transition function returns [`Effect`]s, which this module executes in
//! order. Stages run one at a time and the session is never mutated
//! concurrently. The only background work is DNS enrichment, merged back
//! through a channel right before publishing.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;

use safenest_client::status::StatusClient;
use safenest_client::{ActivationClient, ClientConfig};
use safenest_core::{
    AppCatalog, AppCatalogEntry, AppId, ChildId, DeviceCode, DnsProfileId, FilterPolicy,
    ValidationError,
};
use safenest_state::{ActivationSession, Effect, Event, Stage, TransitionError};

use crate::binder::DeviceBinder;
use crate::cancel::{CancelHandle, CancelToken};
use crate::clock::Clock;
use crate::collector::{NewChild, ProfileCollector};
use crate::enrichment::{EnrichmentHandle, EnrichmentProvisioner};
use crate::error::{ActivationError, AuthError, EnrichmentWarning, PollError};
use crate::gate::{OperatorAuth, OperatorIdentity, SessionGate};
use crate::poller::{CredentialPoller, PollStats, StatusProbe};
use crate::publisher::ConfigPublisher;

/// Delivered once when the workflow reaches `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    /// The activated device.
    pub device_code: DeviceCode,
    /// The child the device was configured for.
    pub child_id: ChildId,
    /// The DNS profile published with the configuration, if any.
    pub dns_profile_id: Option<DnsProfileId>,
}

/// Drives one device activation from sign-in to published configuration.
pub struct ActivationWorkflow<A, S, C> {
    session: ActivationSession,
    gate: SessionGate<A>,
    binder: DeviceBinder,
    collector: ProfileCollector<C>,
    provisioner: EnrichmentProvisioner,
    poller: CredentialPoller<S, C>,
    publisher: ConfigPublisher,
    identity: Option<OperatorIdentity>,
    enrichment: Option<EnrichmentHandle>,
    enrichment_grace: Duration,
    cancel: CancelHandle,
    completion_tx: Option<oneshot::Sender<CompletionReport>>,
    completion_rx: Option<oneshot::Receiver<CompletionReport>>,
    last_poll: Option<PollStats>,
}

impl<A: OperatorAuth, C: Clock + Clone> ActivationWorkflow<A, StatusClient, C> {
    /// Workflow polling the real status endpoints.
    pub fn new(
        device_code: DeviceCode,
        client: &ActivationClient,
        config: &ClientConfig,
        auth: A,
        clock: C,
        catalog: AppCatalog,
    ) -> Self {
        let probe = client.status().clone();
        Self::with_probe(device_code, client, config, probe, auth, clock, catalog)
    }
}

impl<A: OperatorAuth, S: StatusProbe, C: Clock + Clone> ActivationWorkflow<A, S, C> {
    /// Workflow with a custom status source.
    pub fn with_probe(
        device_code: DeviceCode,
        client: &ActivationClient,
        config: &ClientConfig,
        probe: S,
        auth: A,
        clock: C,
        catalog: AppCatalog,
    ) -> Self {
        let (completion_tx, completion_rx) = oneshot::channel();
        Self {
            session: ActivationSession::new(device_code),
            gate: SessionGate::new(auth),
            binder: DeviceBinder::new(client.devices().clone(), client.children().clone()),
            collector: ProfileCollector::new(client.children().clone(), catalog, clock.clone()),
            provisioner: EnrichmentProvisioner::new(client.filtering().clone()),
            poller: CredentialPoller::from_config(probe, clock, config),
            publisher: ConfigPublisher::new(client.postinstall().clone()),
            identity: None,
            enrichment: None,
            enrichment_grace: Duration::from_millis(config.enrichment_grace_ms),
            cancel: CancelHandle::new(),
            completion_tx: Some(completion_tx),
            completion_rx: Some(completion_rx),
            last_poll: None,
        }
    }

    /// The session being driven.
    pub fn session(&self) -> &ActivationSession {
        &self.session
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.session.stage()
    }

    /// Call counts from the last successful poll.
    pub fn poll_stats(&self) -> Option<PollStats> {
        self.last_poll
    }

    /// Receiver for the completion report. Available once.
    pub fn completion(&mut self) -> Option<oneshot::Receiver<CompletionReport>> {
        self.completion_rx.take()
    }

    /// A handle that can cancel this workflow from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Abandon the activation. In-flight polls and requests stop, and the
    /// enrichment task is aborted.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.enrichment = None;
        tracing::info!(device_code = %self.session.device_code(), stage = %self.session.stage(), "activation cancelled");
    }

    /// Sign in (waiting if needed), claim the pairing code and load the
    /// operator's children. Ends in `CollectChild` on success.
    ///
    /// Also resumes a workflow whose wait at `Auth` was interrupted.
    pub async fn start(&mut self) -> Result<(), ActivationError> {
        self.ensure_live()?;
        let effects = self.session.initial_effects();
        if effects.is_empty() {
            return Err(TransitionError::InvalidEvent {
                stage: self.session.stage(),
                event: "Start",
            }
            .into());
        }
        self.run(effects).await
    }

    /// Choose one of the operator's existing children.
    pub async fn select_existing_child(&mut self, child_id: &ChildId) -> Result<(), ActivationError> {
        self.ensure_live()?;
        self.expect_stage(Stage::CollectChild, "ChildChosen")?;
        let event = self.collector.select_existing_child(&self.session, child_id)?;
        let effects = self.apply(event)?;
        self.run(effects).await
    }

    /// Create a new child profile and select it.
    ///
    /// Input is validated locally before anything is sent.
    pub async fn create_child(&mut self, new_child: &NewChild) -> Result<ChildId, ActivationError> {
        self.ensure_live()?;
        self.expect_stage(Stage::CollectChild, "ChildChosen")?;
        let identity = self.identity.clone().ok_or(AuthError::SignedOut)?;
        let token = self.cancel.token();
        let event = cancellable(&token, self.collector.create_child(&identity, new_child)).await??;
        let effects = self.apply(event)?;
        self.run(effects).await?;
        self.session
            .child_id()
            .cloned()
            .ok_or_else(|| ValidationError::NoChildSelected.into())
    }

    /// Apps the selected child may be given. Empty before a child is chosen.
    pub fn available_apps(&self) -> Vec<&AppCatalogEntry> {
        match self.session.child_age() {
            Some(age) => self.collector.available_apps(age),
            None => Vec::new(),
        }
    }

    /// Confirm the app allow-list.
    pub async fn select_apps(
        &mut self,
        app_ids: impl IntoIterator<Item = AppId>,
    ) -> Result<(), ActivationError> {
        self.ensure_live()?;
        self.expect_stage(Stage::CollectApps, "AppsChosen")?;
        let age = self
            .session
            .child_age()
            .ok_or(ValidationError::NoChildSelected)?;
        let event = self.collector.select_apps(age, app_ids)?;
        let effects = self.apply(event)?;
        self.run(effects).await
    }

    /// Confirm the filter policy, then poll for the credential and publish.
    ///
    /// Returns once the workflow is `Done`, or with the error that moved it
    /// to `Failed`.
    pub async fn set_filter_policy(&mut self, policy: FilterPolicy) -> Result<(), ActivationError> {
        self.ensure_live()?;
        self.expect_stage(Stage::CollectPolicy, "PolicyChosen")?;
        let event = self.collector.set_filter_policy(policy);
        let effects = self.apply(event)?;
        self.run(effects).await
    }

    /// Retry a failed attempt from the earliest stage that is still valid.
    ///
    /// The operator identity is re-read from the auth collaborator, so a
    /// refreshed token is used for the retried calls. If nobody is signed in,
    /// or a different operator is, the retry starts over at `Auth`.
    pub async fn retry(&mut self) -> Result<(), ActivationError> {
        self.ensure_live()?;
        self.expect_stage(Stage::Failed, "Retry")?;
        let current = self
            .gate
            .current()
            .filter(|id| self.session.operator_id() == Some(&id.operator_id));
        let auth_valid = current.is_some();
        let effects = self.apply(Event::Retry { auth_valid })?;
        self.identity = current;
        self.run(effects).await
    }

    fn ensure_live(&self) -> Result<(), ActivationError> {
        if self.cancel.is_cancelled() {
            return Err(ActivationError::Cancelled);
        }
        Ok(())
    }

    fn expect_stage(&self, stage: Stage, event: &'static str) -> Result<(), TransitionError> {
        let current = self.session.stage();
        if current.is_terminal() {
            return Err(TransitionError::Terminal(current));
        }
        if current != stage {
            return Err(TransitionError::InvalidEvent {
                stage: current,
                event,
            });
        }
        Ok(())
    }

    fn apply(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let from = self.session.stage();
        let name = event.name();
        let effects = self.session.handle(event)?;
        tracing::debug!(
            device_code = %self.session.device_code(),
            event = name,
            from = %from,
            to = %self.session.stage(),
            "stage transition"
        );
        Ok(effects)
    }

    async fn run(&mut self, effects: Vec<Effect>) -> Result<(), ActivationError> {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            let next = self.execute(effect).await?;
            queue.extend(next);
        }
        Ok(())
    }

    async fn execute(&mut self, effect: Effect) -> Result<Vec<Effect>, ActivationError> {
        let token = self.cancel.token();
        match effect {
            Effect::EnsureAuthenticated => match self.gate.ensure_authenticated(&token).await {
                Ok(identity) => {
                    let effects = self.apply(Event::Authenticated {
                        operator_id: identity.operator_id.clone(),
                    })?;
                    self.identity = Some(identity);
                    Ok(effects)
                }
                Err(AuthError::Cancelled) => Err(ActivationError::Cancelled),
                Err(e) => {
                    self.apply(Event::AuthFailed {
                        message: e.to_string(),
                    })?;
                    Err(e.into())
                }
            },
            Effect::Bind { device_code } => {
                let identity = self.identity.clone().ok_or(AuthError::SignedOut)?;
                match cancellable(&token, self.binder.bind(&device_code, &identity)).await? {
                    Ok(outcome) => Ok(self.apply(Event::Bound {
                        children: outcome.children,
                    })?),
                    Err(e) => {
                        self.apply(Event::BindFailed {
                            message: e.to_string(),
                        })?;
                        Err(e.into())
                    }
                }
            }
            Effect::ProvisionEnrichment {
                operator_id,
                children,
            } => {
                match &self.identity {
                    Some(identity) => {
                        self.enrichment = Some(self.provisioner.spawn(
                            operator_id,
                            identity.access_token.clone(),
                            children,
                        ));
                    }
                    None => tracing::warn!("no operator token, skipping DNS enrichment"),
                }
                Ok(Vec::new())
            }
            Effect::AwaitCredential { device_code } => {
                self.absorb_enrichment()?;
                match self.poller.await_credential(&device_code, &token).await {
                    Ok(outcome) => {
                        self.last_poll = Some(outcome.stats());
                        Ok(self.apply(Event::CredentialObserved {
                            credential: outcome.credential,
                        })?)
                    }
                    Err(PollError::Cancelled) => Err(ActivationError::Cancelled),
                    Err(PollError::Timeout(timeout)) => {
                        self.apply(Event::PollTimedOut {
                            message: timeout.to_string(),
                        })?;
                        Err(timeout.into())
                    }
                }
            }
            Effect::Publish => {
                self.merge_enrichment(&token).await?;
                match cancellable(&token, self.publisher.publish(&self.session)).await? {
                    Ok(()) => Ok(self.apply(Event::Published)?),
                    Err(e) => {
                        self.apply(Event::PublishFailed {
                            message: e.message(),
                        })?;
                        Err(e.into())
                    }
                }
            }
            Effect::NotifyCompleted => {
                let Some(child_id) = self.session.child_id().cloned() else {
                    return Ok(Vec::new());
                };
                let report = CompletionReport {
                    device_code: self.session.device_code().clone(),
                    child_id,
                    dns_profile_id: self.session.filter_policy().dns_profile_id.clone(),
                };
                tracing::info!(
                    device_code = %report.device_code,
                    child_id = %report.child_id,
                    "activation complete"
                );
                if let Some(tx) = self.completion_tx.take() {
                    let _ = tx.send(report);
                }
                Ok(Vec::new())
            }
        }
    }

    /// Merge an enrichment result that already arrived. Never waits.
    fn absorb_enrichment(&mut self) -> Result<(), ActivationError> {
        let ready = self.enrichment.as_mut().and_then(EnrichmentHandle::try_take);
        if let Some(result) = ready {
            self.enrichment = None;
            self.resolve_enrichment(result)?;
        }
        Ok(())
    }

    /// Give a pending enrichment task its grace period, then merge.
    async fn merge_enrichment(&mut self, token: &CancelToken) -> Result<(), ActivationError> {
        let Some(handle) = self.enrichment.take() else {
            return Ok(());
        };
        let result = cancellable(token, handle.wait(self.enrichment_grace)).await?;
        self.resolve_enrichment(result)
    }

    fn resolve_enrichment(
        &mut self,
        result: Result<DnsProfileId, EnrichmentWarning>,
    ) -> Result<(), ActivationError> {
        let dns_profile_id = match result {
            Ok(id) => Some(id),
            Err(warning) => {
                tracing::warn!(
                    device_code = %self.session.device_code(),
                    %warning,
                    "continuing without a DNS profile"
                );
                None
            }
        };
        self.apply(Event::EnrichmentResolved { dns_profile_id })?;
        Ok(())
    }
}

impl<A, S, C> Drop for ActivationWorkflow<A, S, C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn cancellable<F: Future>(token: &CancelToken, fut: F) -> Result<F::Output, ActivationError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ActivationError::Cancelled),
        out = fut => Ok(out),
    }
}
