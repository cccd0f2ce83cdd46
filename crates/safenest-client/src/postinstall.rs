//! Typed client for the device postinstall push.
//!
//! | Method | Path | Auth | Operation |
//! |--------|------|------|-----------|
//! | POST   | `functions/v1/device-postinstall` | device credential | Apply configuration |
//!
//! Authority shifts here: the request is signed with the device credential,
//! not the operator's token. The endpoint is a last-write-wins setter, so
//! pushing the same payload twice simply overwrites the device's configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use safenest_core::{AppId, ChildId, DeviceCode, DnsProfileId, FilterPolicy, SecretToken};

use crate::error::ApiError;
use crate::http::{endpoint_url, read_json};

const POSTINSTALL_PATH: &str = "functions/v1/device-postinstall";

/// Web-filter settings as the device endpoint expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebFilterConfig {
    pub dns_profile_id: Option<DnsProfileId>,
    pub school_hours: bool,
    pub block_social: bool,
    pub block_gaming: bool,
    pub block_entertainment: bool,
}

impl From<&FilterPolicy> for WebFilterConfig {
    fn from(p: &FilterPolicy) -> Self {
        Self {
            dns_profile_id: p.dns_profile_id.clone(),
            school_hours: p.school_hours,
            block_social: p.block_social,
            block_gaming: p.block_gaming,
            block_entertainment: p.block_entertainment,
        }
    }
}

/// Canonical postinstall payload. Business logic only ever builds this type;
/// the legacy field aliases are added at serialization time by [`wire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostinstallPayload {
    pub device_id: DeviceCode,
    pub child_id: ChildId,
    pub app_ids: BTreeSet<AppId>,
    pub web_filter_config: WebFilterConfig,
}

pub mod wire {
    //! Versioned wire shim for the postinstall body.
    //!
    //! Older endpoint versions read differently-named keys for the same
    //! values. Until those consumers are retired every body carries both the
    //! canonical key and its legacy alias:
    //!
    //! | Canonical | Legacy alias |
    //! |-----------|--------------|
    //! | `device_id` | `device_code` |
    //! | `child_id` | `selectedChildId` |
    //! | `app_ids` | `selectedAppIds` |
    //!
    //! Deleting this module (and serializing [`PostinstallPayload`]
    //! directly) is all it takes to drop the aliases.

    use serde::Serialize;

    use safenest_core::{AppId, ChildId, DeviceCode};

    use super::{PostinstallPayload, WebFilterConfig};

    /// The body actually sent over the wire.
    #[derive(Debug, Serialize)]
    pub struct LegacyPostinstallBody<'a> {
        pub device_id: &'a DeviceCode,
        pub device_code: &'a DeviceCode,
        pub child_id: &'a ChildId,
        #[serde(rename = "selectedChildId")]
        pub selected_child_id: &'a ChildId,
        pub app_ids: Vec<&'a AppId>,
        #[serde(rename = "selectedAppIds")]
        pub selected_app_ids: Vec<&'a AppId>,
        pub web_filter_config: &'a WebFilterConfig,
    }

    impl<'a> From<&'a PostinstallPayload> for LegacyPostinstallBody<'a> {
        fn from(p: &'a PostinstallPayload) -> Self {
            let apps: Vec<&AppId> = p.app_ids.iter().collect();
            Self {
                device_id: &p.device_id,
                device_code: &p.device_id,
                child_id: &p.child_id,
                selected_child_id: &p.child_id,
                app_ids: apps.clone(),
                selected_app_ids: apps,
                web_filter_config: &p.web_filter_config,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Ack {}

/// Client for the device postinstall push.
#[derive(Debug, Clone)]
pub struct PostinstallClient {
    http: reqwest::Client,
    base_url: url::Url,
    timeout: Option<Duration>,
    retries: u32,
}

impl PostinstallClient {
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

    /// Push `payload` to the device endpoint, authorized by `device_credential`.
    ///
    /// Calls `POST {base_url}/functions/v1/device-postinstall`. A non-2xx
    /// status or a body carrying `error` is returned with the raw text.
    pub async fn push(
        &self,
        payload: &PostinstallPayload,
        device_credential: &SecretToken,
    ) -> Result<(), ApiError> {
        let endpoint = "POST /device-postinstall";
        let url = endpoint_url(&self.base_url, POSTINSTALL_PATH);
        let body = wire::LegacyPostinstallBody::from(payload);

        tracing::debug!(
            device_code = %payload.device_id,
            child_id = %payload.child_id,
            apps = payload.app_ids.len(),
            "pushing device configuration"
        );
        let resp = crate::retry::retry_send(self.retries, || {
            let mut req = self
                .http
                .post(&url)
                .bearer_auth(device_credential.expose())
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

        let _: Ack = read_json(endpoint, resp).await?;
        Ok(())
    }
}
