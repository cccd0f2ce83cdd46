//! Typed client for the activation status read paths.
//!
//! | Method | Path | Auth | Role |
//! |--------|------|------|------|
//! | GET    | `functions/v1/activation-status?device_id=` | API key | primary |
//! | GET    | `functions/v1/device-status?device_id=` | API key | fallback |
//!
//! Both paths answer `{activated, device_jwt?}`. They expose the same
//! activation record through different read paths, so a poller consults the
//! fallback when the primary fails with a non-2xx status.

use serde::Deserialize;

use safenest_core::{DeviceCode, SecretToken};

use crate::error::ApiError;
use crate::http::{endpoint_url, read_json};

/// Which status read path to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusEndpoint {
    /// `functions/v1/activation-status`.
    Primary,
    /// `functions/v1/device-status`.
    Fallback,
}

impl StatusEndpoint {
    /// Path relative to the base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Primary => "functions/v1/activation-status",
            Self::Fallback => "functions/v1/device-status",
        }
    }

    /// Short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for StatusEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activation status as reported by either read path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivationStatus {
    #[serde(default)]
    pub activated: bool,
    #[serde(default)]
    pub device_jwt: Option<String>,
}

impl ActivationStatus {
    /// The device credential, when the status reports a usable one.
    ///
    /// `activated: true` with a missing or blank `device_jwt` is not usable.
    pub fn credential(&self) -> Option<SecretToken> {
        if !self.activated {
            return None;
        }
        self.device_jwt
            .as_deref()
            .and_then(|jwt| SecretToken::new(jwt, "device credential").ok())
    }
}

/// Client for the activation status read paths.
#[derive(Debug, Clone)]
pub struct StatusClient {
    http: reqwest::Client,
    base_url: url::Url,
    api_key: SecretToken,
}

impl StatusClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url, api_key: SecretToken) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    /// Query one status read path for `device_code`.
    ///
    /// Sent once, without transport retries: the poll loop owns retrying.
    pub async fn fetch(
        &self,
        which: StatusEndpoint,
        device_code: &DeviceCode,
    ) -> Result<ActivationStatus, ApiError> {
        let endpoint = match which {
            StatusEndpoint::Primary => "GET /activation-status",
            StatusEndpoint::Fallback => "GET /device-status",
        };
        let url = endpoint_url(&self.base_url, which.path());

        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.api_key.expose())
            .query(&[("device_id", device_code.as_str())])
            .send()
            .await
            .map_err(|e| ApiError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        read_json(endpoint, resp).await
    }
}
