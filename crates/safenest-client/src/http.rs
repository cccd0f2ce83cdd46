//! Shared request plumbing: URL building and response decoding.
//!
//! Every collaborator endpoint answers JSON. A 2xx body can still report
//! failure through `ok: false` or a non-null `error` field; both are mapped
//! to [`ApiError::Rejected`] with the raw text preserved for diagnostics.

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::ApiError;

/// Join a relative endpoint path onto the base URL.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> String {
    format!("{}{}", base, path.trim_start_matches('/'))
}

/// Decode a JSON response, mapping status and body-level failures.
pub(crate) async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<T, ApiError> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| ApiError::Http {
        endpoint: endpoint.into(),
        source: e,
    })?;

    if !status.is_success() {
        return Err(ApiError::Status {
            endpoint: endpoint.into(),
            status: status.as_u16(),
            body,
        });
    }

    let value: Value = if body.trim().is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(&body).map_err(|e| ApiError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })?
    };

    if reports_failure(&value) {
        return Err(ApiError::Rejected {
            endpoint: endpoint.into(),
            body,
        });
    }

    serde_json::from_value(value).map_err(|e| ApiError::Deserialization {
        endpoint: endpoint.into(),
        source: e,
    })
}

fn reports_failure(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.get("ok") == Some(&Value::Bool(false))
                || map.get("error").is_some_and(|e| !e.is_null())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_url_handles_leading_slash() {
        let base = Url::parse("http://127.0.0.1:9000").unwrap();
        assert_eq!(
            endpoint_url(&base, "/functions/v1/bind-device"),
            "http://127.0.0.1:9000/functions/v1/bind-device"
        );
        assert_eq!(
            endpoint_url(&base, "rest/v1/children"),
            "http://127.0.0.1:9000/rest/v1/children"
        );
    }

    #[test]
    fn body_level_failures_are_detected() {
        assert!(reports_failure(&json!({"ok": false})));
        assert!(reports_failure(&json!({"error": "device not found"})));
        assert!(reports_failure(&json!({"error": {"code": 42}})));
        assert!(!reports_failure(&json!({"error": null})));
        assert!(!reports_failure(&json!({"ok": true})));
        assert!(!reports_failure(&json!({})));
        assert!(!reports_failure(&json!([{"error": "inside array"}])));
    }
}
