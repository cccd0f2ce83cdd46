//! Typed client for DNS-filter provisioning functions.
//!
//! | Method | Path | Auth | Operation |
//! |--------|------|------|-----------|
//! | POST   | `functions/v1/dns-provision` | operator bearer | Provision or fetch the household profile |
//! | POST   | `functions/v1/dns-child-profiles` | operator bearer | Ensure per-child filter entries |
//!
//! Both calls are best-effort from the workflow's point of view; this client
//! still reports every failure so the caller can log it.

use serde::{Deserialize, Serialize};

use safenest_core::{ChildId, DnsProfileId, OperatorId, SecretToken};

use crate::error::ApiError;
use crate::http::{endpoint_url, read_json};

const PROVISION_PATH: &str = "functions/v1/dns-provision";
const CHILD_PROFILES_PATH: &str = "functions/v1/dns-child-profiles";

/// Request body for household profile provisioning.
#[derive(Debug, Serialize)]
pub struct ProvisionProfileRequest<'a> {
    pub household_id: &'a OperatorId,
}

/// Household profile provisioning result.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionProfileResponse {
    #[serde(rename = "configId")]
    pub config_id: DnsProfileId,
}

/// One child entry under a household profile.
#[derive(Debug, Clone, Serialize)]
pub struct ChildFilterEntry {
    pub id: ChildId,
    pub name: String,
}

/// Request body for ensuring per-child filter entries.
#[derive(Debug, Serialize)]
pub struct EnsureChildProfilesRequest<'a> {
    #[serde(rename = "configId")]
    pub config_id: &'a DnsProfileId,
    pub children: &'a [ChildFilterEntry],
}

#[derive(Debug, Deserialize)]
struct Ack {}

/// Client for DNS-filter provisioning.
#[derive(Debug, Clone)]
pub struct FilteringClient {
    http: reqwest::Client,
    base_url: url::Url,
    retries: u32,
}

impl FilteringClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url, retries: u32) -> Self {
        Self {
            http,
            base_url,
            retries,
        }
    }

    /// Provision (or fetch the existing) DNS profile for a household.
    ///
    /// Calls `POST {base_url}/functions/v1/dns-provision`.
    pub async fn provision_profile(
        &self,
        household_id: &OperatorId,
        operator_token: &SecretToken,
    ) -> Result<DnsProfileId, ApiError> {
        let endpoint = "POST /dns-provision";
        let url = endpoint_url(&self.base_url, PROVISION_PATH);
        let body = ProvisionProfileRequest { household_id };

        let resp = crate::retry::retry_send(self.retries, || {
            self.http
                .post(&url)
                .bearer_auth(operator_token.expose())
                .json(&body)
                .send()
        })
        .await
        .map_err(|e| ApiError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;

        let parsed: ProvisionProfileResponse = read_json(endpoint, resp).await?;
        Ok(parsed.config_id)
    }

    /// Ensure a filter entry exists under `config_id` for every child.
    ///
    /// Calls `POST {base_url}/functions/v1/dns-child-profiles`.
    pub async fn ensure_child_profiles(
        &self,
        config_id: &DnsProfileId,
        children: &[ChildFilterEntry],
        operator_token: &SecretToken,
    ) -> Result<(), ApiError> {
        let endpoint = "POST /dns-child-profiles";
        let url = endpoint_url(&self.base_url, CHILD_PROFILES_PATH);
        let body = EnsureChildProfilesRequest {
            config_id,
            children,
        };

        let resp = crate::retry::retry_send(self.retries, || {
            self.http
                .post(&url)
                .bearer_auth(operator_token.expose())
                .json(&body)
                .send()
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
