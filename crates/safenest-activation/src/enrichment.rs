//! Best-effort DNS-filter provisioning.
//!
//! Runs as a detached task started right before polling. The critical path
//! never awaits it; the publisher gives it a bounded grace period and then
//! publishes without a DNS profile. Dropping the [`EnrichmentHandle`]
//! aborts the task.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use safenest_client::filtering::{ChildFilterEntry, FilteringClient};
use safenest_core::{DnsProfileId, OperatorId, SecretToken};
use safenest_state::ChildSummary;

use crate::error::EnrichmentWarning;

/// Starts enrichment tasks.
#[derive(Debug, Clone)]
pub struct EnrichmentProvisioner {
    filtering: FilteringClient,
}

/// A running enrichment task and its result channel.
#[derive(Debug)]
pub struct EnrichmentHandle {
    rx: oneshot::Receiver<Result<DnsProfileId, EnrichmentWarning>>,
    task: JoinHandle<()>,
}

impl EnrichmentProvisioner {
    /// Provisioner over the filtering client.
    pub fn new(filtering: FilteringClient) -> Self {
        Self { filtering }
    }

    /// Provision (or fetch) the household profile, then ensure a filter
    /// entry for every child. Both calls run on a detached task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        &self,
        operator_id: OperatorId,
        operator_token: SecretToken,
        children: Vec<ChildSummary>,
    ) -> EnrichmentHandle {
        let filtering = self.filtering.clone();
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let result = provision(&filtering, &operator_id, &operator_token, &children).await;
            if let Err(warning) = &result {
                tracing::warn!(operator_id = %operator_id, %warning, "DNS enrichment failed");
            }
            let _ = tx.send(result);
        });
        EnrichmentHandle { rx, task }
    }
}

async fn provision(
    filtering: &FilteringClient,
    operator_id: &OperatorId,
    operator_token: &SecretToken,
    children: &[ChildSummary],
) -> Result<DnsProfileId, EnrichmentWarning> {
    let config_id = filtering
        .provision_profile(operator_id, operator_token)
        .await
        .map_err(EnrichmentWarning::Provision)?;

    let entries: Vec<ChildFilterEntry> = children
        .iter()
        .map(|c| ChildFilterEntry {
            id: c.id.clone(),
            name: c.name.clone(),
        })
        .collect();
    filtering
        .ensure_child_profiles(&config_id, &entries, operator_token)
        .await
        .map_err(EnrichmentWarning::ChildProfiles)?;

    tracing::debug!(config_id = %config_id, children = entries.len(), "DNS profile ready");
    Ok(config_id)
}

impl EnrichmentHandle {
    /// The result, if the task already finished. Never waits.
    pub fn try_take(&mut self) -> Option<Result<DnsProfileId, EnrichmentWarning>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(EnrichmentWarning::Aborted)),
        }
    }

    /// Wait at most `grace` for the result.
    pub async fn wait(mut self, grace: Duration) -> Result<DnsProfileId, EnrichmentWarning> {
        match tokio::time::timeout(grace, &mut self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EnrichmentWarning::Aborted),
            Err(_) => Err(EnrichmentWarning::Pending(
                grace.as_millis().try_into().unwrap_or(u64::MAX),
            )),
        }
    }
}

impl Drop for EnrichmentHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
