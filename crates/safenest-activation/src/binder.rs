//! Device binding: claim the pairing code for the operator.

use safenest_client::children::{ChildClient, ChildRecord};
use safenest_client::devices::DeviceClient;
use safenest_core::DeviceCode;
use safenest_state::ChildSummary;

use crate::error::BindError;
use crate::gate::OperatorIdentity;

/// Result of a successful bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOutcome {
    /// The operator's existing child profiles, for the next stage.
    pub children: Vec<ChildSummary>,
}

pub(crate) fn summarize(r: ChildRecord) -> ChildSummary {
    ChildSummary {
        id: r.id,
        name: r.name,
        dob: r.dob,
    }
}

/// Claims pairing codes. Never retries on its own.
#[derive(Debug, Clone)]
pub struct DeviceBinder {
    devices: DeviceClient,
    children: ChildClient,
}

impl DeviceBinder {
    /// Binder over the given sub-clients.
    pub fn new(devices: DeviceClient, children: ChildClient) -> Self {
        Self { devices, children }
    }

    /// Claim `device_code` for `operator`, then load their children.
    ///
    /// Binding is idempotent server-side. The children listing is a
    /// courtesy: if it fails the bind still succeeds with an empty list.
    pub async fn bind(
        &self,
        device_code: &DeviceCode,
        operator: &OperatorIdentity,
    ) -> Result<BindOutcome, BindError> {
        let resp = self
            .devices
            .bind(device_code, &operator.access_token)
            .await
            .map_err(BindError::from_api)?;
        tracing::info!(
            device_code = %device_code,
            operator_id = %operator.operator_id,
            bound = resp.device.is_some(),
            "pairing code claimed"
        );

        let children = match self
            .children
            .list(&operator.operator_id, &operator.access_token)
            .await
        {
            Ok(records) => records.into_iter().map(summarize).collect(),
            Err(e) => {
                tracing::warn!(
                    operator_id = %operator.operator_id,
                    error = %e,
                    "could not load existing children"
                );
                Vec::new()
            }
        };
        Ok(BindOutcome { children })
    }
}
