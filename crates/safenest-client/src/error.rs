//! Activation backend client error types.

/// Errors from activation backend calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP transport error (connection, timeout, body read).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The backend returned a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// A 2xx response whose body reports failure (`ok: false` or `error`).
    #[error("{endpoint} rejected the request: {body}")]
    Rejected { endpoint: String, body: String },
    /// Response body did not match the expected schema.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: serde_json::Error,
    },
    /// A credential contained characters not allowed in an HTTP header.
    #[error("invalid {0} header value")]
    InvalidHeader(&'static str),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ApiError {
    /// Whether the request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    /// Whether the backend answered with a non-2xx status.
    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }

    /// The raw response text, when one was received.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } | Self::Rejected { body, .. } => Some(body),
            _ => None,
        }
    }
}
