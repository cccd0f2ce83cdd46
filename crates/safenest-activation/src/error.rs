//! Workflow error taxonomy.
//!
//! Every stage converts its collaborator failures into one of these types
//! before the state machine sees them. Raw [`ApiError`]s never escape a
//! stage without being wrapped.

use thiserror::Error;

use safenest_client::ApiError;
use safenest_core::ValidationError;
use safenest_state::TransitionError;

/// No valid operator identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The auth collaborator has no signed-in operator.
    #[error("no operator is signed in")]
    SignedOut,
    /// The user abandoned the activation while waiting for sign-in.
    #[error("authentication was cancelled")]
    Cancelled,
}

/// The pairing code was rejected or the bind call failed.
#[derive(Error, Debug)]
pub enum BindError {
    /// The backend refused the code; the message is shown verbatim.
    #[error("{message}")]
    Rejected {
        /// Message extracted from the response.
        message: String,
        /// The underlying response.
        #[source]
        source: ApiError,
    },
    /// The bind request never got an answer.
    #[error("could not reach the binding service: {0}")]
    Transport(#[source] ApiError),
}

impl BindError {
    pub(crate) fn from_api(err: ApiError) -> Self {
        match err.response_body().map(user_message) {
            Some(message) => Self::Rejected {
                message,
                source: err,
            },
            None => Self::Transport(err),
        }
    }
}

/// The device credential was not observed within the poll budget.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("not activated")]
pub struct TimeoutError {
    /// Attempts made before giving up.
    pub attempts: u32,
}

/// Why credential polling stopped without a credential.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollError {
    /// The poll budget ran out.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    /// The workflow was abandoned mid-poll.
    #[error("credential polling was cancelled")]
    Cancelled,
}

/// The postinstall push was refused, failed in transit, or never attempted.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Publishing needs a device credential and a child; no request was sent.
    #[error("cannot publish: {missing} is not set")]
    Precondition {
        /// Which field is missing.
        missing: &'static str,
    },
    /// The request failed. `message` is the raw response text when one
    /// was received, otherwise the transport error.
    #[error("publish failed: {message}")]
    Failed {
        /// Diagnostic text captured from the response.
        message: String,
        /// The underlying error.
        #[source]
        source: ApiError,
    },
}

impl PublishError {
    pub(crate) fn from_api(err: ApiError) -> Self {
        let message = err
            .response_body()
            .map(str::to_owned)
            .unwrap_or_else(|| err.to_string());
        Self::Failed {
            message,
            source: err,
        }
    }

    /// Text recorded on the session.
    pub fn message(&self) -> String {
        match self {
            Self::Failed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Non-fatal enrichment failure. Logged, never changes the stage.
#[derive(Error, Debug)]
pub enum EnrichmentWarning {
    /// Provisioning the household DNS profile failed.
    #[error("DNS profile provisioning failed: {0}")]
    Provision(#[source] ApiError),
    /// Creating per-child filter entries failed.
    #[error("child filter profiles failed: {0}")]
    ChildProfiles(#[source] ApiError),
    /// The result did not arrive within the grace period.
    #[error("DNS provisioning still pending after {0} ms")]
    Pending(u64),
    /// The enrichment task ended without reporting.
    #[error("DNS provisioning task was aborted")]
    Aborted,
}

/// Any failure surfaced by the activation workflow.
#[derive(Error, Debug)]
pub enum ActivationError {
    /// See [`AuthError`].
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// See [`BindError`].
    #[error(transparent)]
    Bind(#[from] BindError),
    /// Local input problem; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// See [`TimeoutError`].
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    /// See [`PublishError`].
    #[error(transparent)]
    Publish(#[from] PublishError),
    /// The action is not valid in the current stage.
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// Creating a child profile failed on the backend.
    #[error("could not create child profile: {0}")]
    ChildCreation(#[source] ApiError),
    /// The workflow was abandoned.
    #[error("activation was cancelled")]
    Cancelled,
}

impl From<PollError> for ActivationError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Timeout(t) => Self::Timeout(t),
            PollError::Cancelled => Self::Cancelled,
        }
    }
}

/// Pull a human-readable message out of a response body.
///
/// Bodies like `{"error": "..."}` or `{"message": "..."}` yield the inner
/// string; anything else is returned as-is.
pub(crate) fn user_message(body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(serde_json::Value::String(s)) = map.get(key) {
                if !s.trim().is_empty() {
                    return s.clone();
                }
            }
        }
    }
    body.to_string()
}
