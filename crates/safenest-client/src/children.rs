//! Typed client for child profiles (REST table `children`).
//!
//! | Method | Path | Auth | Operation |
//! |--------|------|------|-----------|
//! | GET    | `rest/v1/children?parent_id=eq.{id}` | operator bearer | List an operator's children |
//! | POST   | `rest/v1/children` | operator bearer | Create a child |

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use safenest_core::{ChildId, OperatorId, SecretToken};

use crate::error::ApiError;
use crate::http::{endpoint_url, read_json};

const CHILDREN_PATH: &str = "rest/v1/children";

/// A child profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRecord {
    pub id: ChildId,
    pub name: String,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
}

/// Request body for creating a child profile.
#[derive(Debug, Clone, Serialize)]
pub struct CreateChildRequest {
    pub name: String,
    pub dob: NaiveDate,
    pub parent_id: OperatorId,
}

/// The REST layer answers inserts with either the row or a one-row array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(ChildRecord),
    Many(Vec<ChildRecord>),
}

/// Client for child profiles.
#[derive(Debug, Clone)]
pub struct ChildClient {
    http: reqwest::Client,
    base_url: url::Url,
    retries: u32,
}

impl ChildClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url, retries: u32) -> Self {
        Self {
            http,
            base_url,
            retries,
        }
    }

    /// List the children owned by `operator_id`.
    ///
    /// Calls `GET {base_url}/rest/v1/children?parent_id=eq.{id}&select=id,name,dob`.
    pub async fn list(
        &self,
        operator_id: &OperatorId,
        operator_token: &SecretToken,
    ) -> Result<Vec<ChildRecord>, ApiError> {
        let endpoint = "GET /children";
        let url = endpoint_url(&self.base_url, CHILDREN_PATH);
        let parent_filter = format!("eq.{operator_id}");

        let resp = crate::retry::retry_send(self.retries, || {
            self.http
                .get(&url)
                .bearer_auth(operator_token.expose())
                .query(&[("parent_id", parent_filter.as_str()), ("select", "id,name,dob")])
                .send()
        })
        .await
        .map_err(|e| ApiError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;

        read_json(endpoint, resp).await
    }

    /// Create a child profile and return the stored row.
    ///
    /// Calls `POST {base_url}/rest/v1/children`. Inserts are not retried.
    pub async fn create(
        &self,
        req: &CreateChildRequest,
        operator_token: &SecretToken,
    ) -> Result<ChildRecord, ApiError> {
        let endpoint = "POST /children";
        let url = endpoint_url(&self.base_url, CHILDREN_PATH);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(operator_token.expose())
            .header("Prefer", "return=representation")
            .json(req)
            .send()
            .await
            .map_err(|e| ApiError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        match read_json::<OneOrMany>(endpoint, resp).await? {
            OneOrMany::One(child) => Ok(child),
            OneOrMany::Many(rows) => rows.into_iter().next().ok_or_else(|| ApiError::Rejected {
                endpoint: endpoint.into(),
                body: "[]".into(),
            }),
        }
    }
}
