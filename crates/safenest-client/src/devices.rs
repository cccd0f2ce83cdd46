//! Typed client for the device-binding function.
//!
//! | Method | Path | Auth | Operation |
//! |--------|------|------|-----------|
//! | POST   | `functions/v1/bind-device` | operator bearer | Claim a pairing code |
//!
//! Binding is idempotent server-side: claiming the same code for the same
//! operator again answers `ok: true` without creating a second device.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use safenest_core::{DeviceCode, SecretToken};

use crate::error::ApiError;
use crate::http::{endpoint_url, read_json};

const BIND_PATH: &str = "functions/v1/bind-device";

/// Request body for claiming a pairing code.
#[derive(Debug, Serialize)]
pub struct BindDeviceRequest<'a> {
    pub device_code: &'a DeviceCode,
}

/// Device record echoed back by the binding function.
#[derive(Debug, Clone, Deserialize)]
pub struct BoundDevice {
    pub device_code: String,
}

/// Response from the binding function.
///
/// Any `device_jwt` in the body is not read. The credential only comes from
/// the status endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct BindDeviceResponse {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default)]
    pub device: Option<BoundDevice>,
}

fn default_true() -> bool {
    true
}

/// Client for the device-binding function.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: url::Url,
    timeout: Option<Duration>,
    retries: u32,
}

impl DeviceClient {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: url::Url,
        timeout: Option<Duration>,
        retries: u32,
    ) -> Self {
        Self {
            http,
            base_url,
            timeout,
            retries,
        }
    }

    /// Claim `device_code` for the operator holding `operator_token`.
    ///
    /// Calls `POST {base_url}/functions/v1/bind-device`. Transport failures,
    /// non-2xx statuses and `ok: false` bodies all surface as errors.
    pub async fn bind(
        &self,
        device_code: &DeviceCode,
        operator_token: &SecretToken,
    ) -> Result<BindDeviceResponse, ApiError> {
        let endpoint = "POST /bind-device";
        let url = endpoint_url(&self.base_url, BIND_PATH);
        let body = BindDeviceRequest { device_code };

        tracing::debug!(device_code = %device_code, "binding device");
        let resp = crate::retry::retry_send(self.retries, || {
            let mut req = self
                .http
                .post(&url)
                .bearer_auth(operator_token.expose())
                .json(&body);
            if let Some(timeout) = self.timeout {
                req = req.timeout(timeout);
            }
            req.send()
        })
        .await
        .map_err(|e| ApiError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;

        read_json(endpoint, resp).await
    }
}
