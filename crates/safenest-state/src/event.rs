//! Events fed into the state machine and effects it asks the caller to run.

use std::collections::BTreeSet;

use safenest_core::{AppId, DeviceCode, DnsProfileId, FilterPolicy, OperatorId, SecretToken};

use crate::session::ChildSummary;

/// Something that happened: a user action or the result of an effect.
#[derive(Debug, Clone)]
pub enum Event {
    /// The session gate produced an operator identity.
    Authenticated {
        /// The authenticated operator.
        operator_id: OperatorId,
    },
    /// No operator identity could be obtained.
    AuthFailed {
        /// Diagnostic message.
        message: String,
    },
    /// The pairing code was claimed; carries the operator's existing children.
    Bound {
        /// Children already registered to the operator.
        children: Vec<ChildSummary>,
    },
    /// Claiming the pairing code failed.
    BindFailed {
        /// Message surfaced verbatim to the user.
        message: String,
    },
    /// A child profile was chosen.
    ChildChosen {
        /// The chosen child.
        child: ChildSummary,
        /// Age derived from the child's date of birth.
        age: u32,
        /// Whether the child was created during this session.
        created: bool,
    },
    /// The app allow-list was confirmed.
    AppsChosen {
        /// Selected app ids (unique, order-irrelevant).
        app_ids: BTreeSet<AppId>,
    },
    /// The web-filter policy was confirmed.
    PolicyChosen {
        /// The user's policy choices.
        policy: FilterPolicy,
    },
    /// The detached enrichment task finished.
    EnrichmentResolved {
        /// The provisioned DNS profile, or `None` when enrichment failed.
        dns_profile_id: Option<DnsProfileId>,
    },
    /// The poller observed the device credential.
    CredentialObserved {
        /// The long-lived device credential.
        credential: SecretToken,
    },
    /// The poll budget ran out without a credential.
    PollTimedOut {
        /// Diagnostic message.
        message: String,
    },
    /// The postinstall push succeeded.
    Published,
    /// The postinstall push failed.
    PublishFailed {
        /// Raw response text or transport error.
        message: String,
    },
    /// The user asked to retry a failed attempt.
    Retry {
        /// Whether the operator's authentication is still valid.
        auth_valid: bool,
    },
}

impl Event {
    /// Short name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticated { .. } => "Authenticated",
            Self::AuthFailed { .. } => "AuthFailed",
            Self::Bound { .. } => "Bound",
            Self::BindFailed { .. } => "BindFailed",
            Self::ChildChosen { .. } => "ChildChosen",
            Self::AppsChosen { .. } => "AppsChosen",
            Self::PolicyChosen { .. } => "PolicyChosen",
            Self::EnrichmentResolved { .. } => "EnrichmentResolved",
            Self::CredentialObserved { .. } => "CredentialObserved",
            Self::PollTimedOut { .. } => "PollTimedOut",
            Self::Published => "Published",
            Self::PublishFailed { .. } => "PublishFailed",
            Self::Retry { .. } => "Retry",
        }
    }
}

/// Work the caller must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Obtain an operator identity from the auth collaborator.
    EnsureAuthenticated,
    /// Claim the pairing code and load the operator's children.
    Bind {
        /// The pairing code to claim.
        device_code: DeviceCode,
    },
    /// Start best-effort DNS provisioning without waiting on it.
    ProvisionEnrichment {
        /// Household owner.
        operator_id: OperatorId,
        /// Every child known to the session.
        children: Vec<ChildSummary>,
    },
    /// Poll for the device credential.
    AwaitCredential {
        /// The device whose activation is awaited.
        device_code: DeviceCode,
    },
    /// Push the configuration snapshot to the device endpoint.
    Publish,
    /// Tell the host application that activation finished.
    NotifyCompleted,
}
