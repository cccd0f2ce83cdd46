//! # Activation Session
//!
//! The aggregate for one activation attempt and its transition function.
//!
//! [`ActivationSession::handle`] is the only way to mutate a session. It
//! either applies the event and returns the effects to execute, or rejects
//! it with a [`TransitionError`] and leaves the session untouched.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use safenest_core::{
    AppId, ChildId, DeviceCode, FilterPolicy, OperatorId, SecretToken, ValidationError,
};

use crate::event::{Effect, Event};
use crate::stage::Stage;

/// A child profile as the workflow sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSummary {
    /// Backend identifier.
    pub id: ChildId,
    /// Display name.
    pub name: String,
    /// Date of birth, when the backend has one.
    pub dob: Option<NaiveDate>,
}

/// Category of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No operator identity.
    Auth,
    /// Pairing code rejected or binding call failed.
    Bind,
    /// Credential not observed within the poll budget.
    Timeout,
    /// Postinstall rejected or failed in transit.
    Publish,
}

/// The last failure recorded on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// What kind of failure.
    pub kind: ErrorKind,
    /// Diagnostic text shown to the user.
    pub message: String,
    /// Stage the session was in when it failed.
    pub stage: Stage,
}

/// A rejected transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The event is not accepted in the current stage.
    #[error("event {event} is not valid in stage {stage}")]
    InvalidEvent {
        /// Current stage.
        stage: Stage,
        /// Name of the rejected event.
        event: &'static str,
    },
    /// The event carried invalid input.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A different operator tried to claim an already-owned session.
    #[error("session belongs to operator {existing}, not {attempted}")]
    OperatorMismatch {
        /// The operator recorded on the session.
        existing: OperatorId,
        /// The operator in the rejected event.
        attempted: OperatorId,
    },
    /// The device credential was already recorded.
    #[error("device credential is already set for this session")]
    CredentialAlreadySet,
    /// Publishing requires a credential and a child.
    #[error("cannot publish: {missing} is not set")]
    PublishPrecondition {
        /// Which field is missing.
        missing: &'static str,
    },
    /// The session already completed.
    #[error("session is in terminal stage {0}")]
    Terminal(Stage),
}

/// One device activation attempt.
#[derive(Debug)]
pub struct ActivationSession {
    device_code: DeviceCode,
    stage: Stage,
    operator_id: Option<OperatorId>,
    known_children: Vec<ChildSummary>,
    child_id: Option<ChildId>,
    child_age: Option<u32>,
    selected_app_ids: BTreeSet<AppId>,
    filter_policy: FilterPolicy,
    device_credential: Option<SecretToken>,
    last_error: Option<ErrorRecord>,
    completion_notified: bool,
}

impl ActivationSession {
    /// Start a session for a freshly presented pairing code.
    pub fn new(device_code: DeviceCode) -> Self {
        Self {
            device_code,
            stage: Stage::Auth,
            operator_id: None,
            known_children: Vec::new(),
            child_id: None,
            child_age: None,
            selected_app_ids: BTreeSet::new(),
            filter_policy: FilterPolicy::default(),
            device_credential: None,
            last_error: None,
            completion_notified: false,
        }
    }

    /// Effects to run when the session is first driven.
    pub fn initial_effects(&self) -> Vec<Effect> {
        match self.stage {
            Stage::Auth => vec![Effect::EnsureAuthenticated],
            _ => Vec::new(),
        }
    }

    /// The pairing code. Immutable for the session's lifetime.
    pub fn device_code(&self) -> &DeviceCode {
        &self.device_code
    }

    /// The current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The operator that owns this activation, once authenticated.
    pub fn operator_id(&self) -> Option<&OperatorId> {
        self.operator_id.as_ref()
    }

    /// Children known to the session: loaded after bind plus any created.
    pub fn known_children(&self) -> &[ChildSummary] {
        &self.known_children
    }

    /// The selected child.
    pub fn child_id(&self) -> Option<&ChildId> {
        self.child_id.as_ref()
    }

    /// The selected child's derived age.
    pub fn child_age(&self) -> Option<u32> {
        self.child_age
    }

    /// The selected app allow-list.
    pub fn selected_app_ids(&self) -> &BTreeSet<AppId> {
        &self.selected_app_ids
    }

    /// The web-filter policy, including any DNS profile from enrichment.
    pub fn filter_policy(&self) -> &FilterPolicy {
        &self.filter_policy
    }

    /// The device credential, once the poller observed it.
    pub fn device_credential(&self) -> Option<&SecretToken> {
        self.device_credential.as_ref()
    }

    /// The most recent failure, if any.
    pub fn last_error(&self) -> Option<&ErrorRecord> {
        self.last_error.as_ref()
    }

    /// Check the publishing precondition without changing anything.
    ///
    /// # Errors
    ///
    /// [`TransitionError::PublishPrecondition`] naming the missing field.
    pub fn ensure_publishable(&self) -> Result<(&SecretToken, &ChildId), TransitionError> {
        let credential = self
            .device_credential
            .as_ref()
            .ok_or(TransitionError::PublishPrecondition {
                missing: "device credential",
            })?;
        let child = self
            .child_id
            .as_ref()
            .ok_or(TransitionError::PublishPrecondition { missing: "child id" })?;
        Ok((credential, child))
    }

    /// Apply an event and return the effects to execute.
    ///
    /// The session is left unchanged when an error is returned.
    pub fn handle(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        if self.stage.is_terminal() {
            // Late enrichment results are harmless after completion.
            if matches!(event, Event::EnrichmentResolved { .. }) {
                return Ok(Vec::new());
            }
            return Err(TransitionError::Terminal(self.stage));
        }

        match (self.stage, event) {
            (Stage::Auth, Event::Authenticated { operator_id }) => {
                if let Some(existing) = &self.operator_id {
                    if *existing != operator_id {
                        return Err(TransitionError::OperatorMismatch {
                            existing: existing.clone(),
                            attempted: operator_id,
                        });
                    }
                } else {
                    self.operator_id = Some(operator_id);
                }
                self.stage = Stage::Bind;
                Ok(vec![Effect::Bind {
                    device_code: self.device_code.clone(),
                }])
            }
            (Stage::Auth, Event::AuthFailed { message }) => {
                Ok(self.fail(ErrorKind::Auth, message))
            }
            (Stage::Bind, Event::Bound { children }) => {
                self.known_children = children;
                self.stage = Stage::CollectChild;
                Ok(Vec::new())
            }
            (Stage::Bind, Event::BindFailed { message }) => {
                Ok(self.fail(ErrorKind::Bind, message))
            }
            (
                Stage::CollectChild,
                Event::ChildChosen {
                    child,
                    age,
                    created,
                },
            ) => {
                let known = self.known_children.iter().any(|c| c.id == child.id);
                if !created && !known {
                    return Err(ValidationError::UnknownChild(child.id.to_string()).into());
                }
                self.child_id = Some(child.id.clone());
                self.child_age = Some(age);
                if !known {
                    self.known_children.push(child);
                }
                self.stage = Stage::CollectApps;
                Ok(Vec::new())
            }
            (Stage::CollectApps, Event::AppsChosen { app_ids }) => {
                self.selected_app_ids = app_ids;
                self.stage = Stage::CollectPolicy;
                Ok(Vec::new())
            }
            (Stage::CollectPolicy, Event::PolicyChosen { policy }) => {
                let operator_id = self.operator_id.clone().ok_or(TransitionError::InvalidEvent {
                    stage: self.stage,
                    event: "PolicyChosen",
                })?;
                if self.child_id.is_none() {
                    return Err(ValidationError::NoChildSelected.into());
                }
                // Keep a DNS profile that enrichment may already have delivered.
                let dns = policy
                    .dns_profile_id
                    .clone()
                    .or_else(|| self.filter_policy.dns_profile_id.clone());
                self.filter_policy = policy.with_dns_profile(dns);
                self.stage = Stage::Polling;
                Ok(vec![
                    Effect::ProvisionEnrichment {
                        operator_id,
                        children: self.known_children.clone(),
                    },
                    Effect::AwaitCredential {
                        device_code: self.device_code.clone(),
                    },
                ])
            }
            (_, Event::EnrichmentResolved { dns_profile_id }) => {
                if dns_profile_id.is_some() {
                    self.filter_policy.dns_profile_id = dns_profile_id;
                }
                Ok(Vec::new())
            }
            (Stage::Polling, Event::CredentialObserved { credential }) => {
                if self.device_credential.is_some() {
                    return Err(TransitionError::CredentialAlreadySet);
                }
                if self.child_id.is_none() {
                    return Err(TransitionError::PublishPrecondition { missing: "child id" });
                }
                self.device_credential = Some(credential);
                self.stage = Stage::Publishing;
                Ok(vec![Effect::Publish])
            }
            (Stage::Polling, Event::PollTimedOut { message }) => {
                Ok(self.fail(ErrorKind::Timeout, message))
            }
            (Stage::Publishing, Event::Published) => {
                self.stage = Stage::Done;
                self.last_error = None;
                if self.completion_notified {
                    return Ok(Vec::new());
                }
                self.completion_notified = true;
                Ok(vec![Effect::NotifyCompleted])
            }
            (Stage::Publishing, Event::PublishFailed { message }) => {
                Ok(self.fail(ErrorKind::Publish, message))
            }
            (Stage::Failed, Event::Retry { auth_valid }) => Ok(self.retry(auth_valid)),
            (stage, event) => Err(TransitionError::InvalidEvent {
                stage,
                event: event.name(),
            }),
        }
    }

    fn fail(&mut self, kind: ErrorKind, message: String) -> Vec<Effect> {
        self.last_error = Some(ErrorRecord {
            kind,
            message,
            stage: self.stage,
        });
        self.stage = Stage::Failed;
        Vec::new()
    }

    /// Re-enter the earliest stage that is still valid.
    fn retry(&mut self, auth_valid: bool) -> Vec<Effect> {
        let failed_at = self.last_error.as_ref().map(|e| e.stage).unwrap_or(Stage::Auth);

        let target = if !auth_valid || self.operator_id.is_none() {
            Stage::Auth
        } else {
            match failed_at {
                Stage::Auth | Stage::Bind => Stage::Bind,
                Stage::Polling => Stage::Polling,
                Stage::Publishing if self.device_credential.is_some() => Stage::Publishing,
                Stage::Publishing => Stage::Polling,
                Stage::CollectChild
                | Stage::CollectApps
                | Stage::CollectPolicy
                | Stage::Done
                | Stage::Failed => Stage::Bind,
            }
        };

        self.stage = target;
        match target {
            Stage::Auth => vec![Effect::EnsureAuthenticated],
            Stage::Polling => vec![Effect::AwaitCredential {
                device_code: self.device_code.clone(),
            }],
            Stage::Publishing => vec![Effect::Publish],
            _ => vec![Effect::Bind {
                device_code: self.device_code.clone(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safenest_core::DnsProfileId;

    fn code() -> DeviceCode {
        DeviceCode::new("ABCD-1234").unwrap()
    }

    fn operator() -> OperatorId {
        OperatorId::new("op-1").unwrap()
    }

    fn mia() -> ChildSummary {
        ChildSummary {
            id: ChildId::new("c1").unwrap(),
            name: "Mia".into(),
            dob: NaiveDate::from_ymd_opt(2015, 6, 15),
        }
    }

    fn apps(ids: &[&str]) -> BTreeSet<AppId> {
        ids.iter().map(|s| AppId::new(*s).unwrap()).collect()
    }

    fn credential() -> SecretToken {
        SecretToken::new("tok123", "device credential").unwrap()
    }

    /// Drive a session up to `Polling`.
    fn polling_session() -> ActivationSession {
        let mut s = ActivationSession::new(code());
        s.handle(Event::Authenticated { operator_id: operator() }).unwrap();
        s.handle(Event::Bound { children: vec![mia()] }).unwrap();
        s.handle(Event::ChildChosen {
            child: mia(),
            age: 9,
            created: false,
        })
        .unwrap();
        s.handle(Event::AppsChosen {
            app_ids: apps(&["a1", "a2"]),
        })
        .unwrap();
        s.handle(Event::PolicyChosen {
            policy: FilterPolicy::default(),
        })
        .unwrap();
        s
    }

    #[test]
    fn new_session_starts_at_auth() {
        let s = ActivationSession::new(code());
        assert_eq!(s.stage(), Stage::Auth);
        assert_eq!(s.initial_effects(), vec![Effect::EnsureAuthenticated]);
        assert!(s.device_credential().is_none());
    }

    #[test]
    fn happy_path_emits_expected_effects() {
        let mut s = ActivationSession::new(code());

        let fx = s.handle(Event::Authenticated { operator_id: operator() }).unwrap();
        assert_eq!(fx, vec![Effect::Bind { device_code: code() }]);
        assert_eq!(s.stage(), Stage::Bind);

        assert!(s.handle(Event::Bound { children: vec![mia()] }).unwrap().is_empty());
        assert_eq!(s.stage(), Stage::CollectChild);

        s.handle(Event::ChildChosen {
            child: mia(),
            age: 9,
            created: false,
        })
        .unwrap();
        assert_eq!(s.child_age(), Some(9));

        s.handle(Event::AppsChosen {
            app_ids: apps(&["a1", "a2"]),
        })
        .unwrap();

        let fx = s
            .handle(Event::PolicyChosen {
                policy: FilterPolicy::default(),
            })
            .unwrap();
        assert_eq!(s.stage(), Stage::Polling);
        assert_eq!(fx.len(), 2);
        assert!(matches!(fx[0], Effect::ProvisionEnrichment { .. }));
        assert_eq!(fx[1], Effect::AwaitCredential { device_code: code() });

        let fx = s
            .handle(Event::CredentialObserved {
                credential: credential(),
            })
            .unwrap();
        assert_eq!(fx, vec![Effect::Publish]);
        assert_eq!(s.stage(), Stage::Publishing);

        let fx = s.handle(Event::Published).unwrap();
        assert_eq!(fx, vec![Effect::NotifyCompleted]);
        assert_eq!(s.stage(), Stage::Done);
    }

    #[test]
    fn done_is_terminal() {
        let mut s = polling_session();
        s.handle(Event::CredentialObserved {
            credential: credential(),
        })
        .unwrap();
        s.handle(Event::Published).unwrap();

        let err = s.handle(Event::Published).unwrap_err();
        assert_eq!(err, TransitionError::Terminal(Stage::Done));
        let err = s.handle(Event::Retry { auth_valid: true }).unwrap_err();
        assert_eq!(err, TransitionError::Terminal(Stage::Done));
    }

    #[test]
    fn credential_is_write_once() {
        let mut s = polling_session();
        s.handle(Event::CredentialObserved {
            credential: credential(),
        })
        .unwrap();
        // Now in Publishing; a second credential is not accepted.
        let err = s
            .handle(Event::CredentialObserved {
                credential: SecretToken::new("other", "device credential").unwrap(),
            })
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidEvent { .. }));
        assert_eq!(s.device_credential().unwrap().expose(), "tok123");
    }

    #[test]
    fn credential_outside_polling_is_rejected() {
        let mut s = ActivationSession::new(code());
        let err = s
            .handle(Event::CredentialObserved {
                credential: credential(),
            })
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidEvent {
                stage: Stage::Auth,
                event: "CredentialObserved"
            }
        );
        assert!(s.device_credential().is_none());
    }

    #[test]
    fn unknown_existing_child_is_a_validation_error() {
        let mut s = ActivationSession::new(code());
        s.handle(Event::Authenticated { operator_id: operator() }).unwrap();
        s.handle(Event::Bound { children: vec![] }).unwrap();
        let err = s
            .handle(Event::ChildChosen {
                child: mia(),
                age: 9,
                created: false,
            })
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::Validation(ValidationError::UnknownChild("c1".into()))
        );
        assert_eq!(s.stage(), Stage::CollectChild);
    }

    #[test]
    fn created_child_joins_known_children() {
        let mut s = ActivationSession::new(code());
        s.handle(Event::Authenticated { operator_id: operator() }).unwrap();
        s.handle(Event::Bound { children: vec![] }).unwrap();
        s.handle(Event::ChildChosen {
            child: mia(),
            age: 9,
            created: true,
        })
        .unwrap();
        assert_eq!(s.known_children().len(), 1);
        assert_eq!(s.child_id().unwrap().as_str(), "c1");
    }

    #[test]
    fn enrichment_never_changes_stage() {
        let mut s = polling_session();
        let fx = s
            .handle(Event::EnrichmentResolved {
                dns_profile_id: Some(DnsProfileId::new("cfg-9").unwrap()),
            })
            .unwrap();
        assert!(fx.is_empty());
        assert_eq!(s.stage(), Stage::Polling);
        assert_eq!(
            s.filter_policy().dns_profile_id.as_ref().unwrap().as_str(),
            "cfg-9"
        );

        s.handle(Event::EnrichmentResolved { dns_profile_id: None }).unwrap();
        assert_eq!(s.stage(), Stage::Polling);
        assert!(s.filter_policy().dns_profile_id.is_some());
    }

    #[test]
    fn enrichment_after_done_is_ignored() {
        let mut s = polling_session();
        s.handle(Event::CredentialObserved {
            credential: credential(),
        })
        .unwrap();
        s.handle(Event::Published).unwrap();
        let fx = s
            .handle(Event::EnrichmentResolved {
                dns_profile_id: Some(DnsProfileId::new("late").unwrap()),
            })
            .unwrap();
        assert!(fx.is_empty());
        assert!(s.filter_policy().dns_profile_id.is_none());
    }

    #[test]
    fn bind_failure_retries_from_bind_when_auth_valid() {
        let mut s = ActivationSession::new(code());
        s.handle(Event::Authenticated { operator_id: operator() }).unwrap();
        s.handle(Event::BindFailed {
            message: "code expired".into(),
        })
        .unwrap();
        assert_eq!(s.stage(), Stage::Failed);
        let err = s.last_error().unwrap();
        assert_eq!(err.kind, ErrorKind::Bind);
        assert_eq!(err.stage, Stage::Bind);
        assert_eq!(err.message, "code expired");

        let fx = s.handle(Event::Retry { auth_valid: true }).unwrap();
        assert_eq!(fx, vec![Effect::Bind { device_code: code() }]);
        assert_eq!(s.stage(), Stage::Bind);
    }

    #[test]
    fn retry_with_expired_auth_restarts_at_auth() {
        let mut s = polling_session();
        s.handle(Event::PollTimedOut {
            message: "not activated".into(),
        })
        .unwrap();
        let fx = s.handle(Event::Retry { auth_valid: false }).unwrap();
        assert_eq!(fx, vec![Effect::EnsureAuthenticated]);
        assert_eq!(s.stage(), Stage::Auth);
        // Same operator may re-authenticate; operator id is unchanged.
        s.handle(Event::Authenticated { operator_id: operator() }).unwrap();
        assert_eq!(s.operator_id().unwrap().as_str(), "op-1");
    }

    #[test]
    fn reauthentication_as_different_operator_is_rejected() {
        let mut s = polling_session();
        s.handle(Event::PollTimedOut {
            message: "not activated".into(),
        })
        .unwrap();
        s.handle(Event::Retry { auth_valid: false }).unwrap();
        let err = s
            .handle(Event::Authenticated {
                operator_id: OperatorId::new("intruder").unwrap(),
            })
            .unwrap_err();
        assert!(matches!(err, TransitionError::OperatorMismatch { .. }));
        assert_eq!(s.stage(), Stage::Auth);
    }

    #[test]
    fn timeout_retry_restarts_polling_only() {
        let mut s = polling_session();
        s.handle(Event::PollTimedOut {
            message: "not activated".into(),
        })
        .unwrap();
        assert_eq!(s.last_error().unwrap().kind, ErrorKind::Timeout);
        let fx = s.handle(Event::Retry { auth_valid: true }).unwrap();
        assert_eq!(fx, vec![Effect::AwaitCredential { device_code: code() }]);
        assert_eq!(s.stage(), Stage::Polling);
        assert_eq!(s.selected_app_ids().len(), 2);
    }

    #[test]
    fn publish_failure_retry_republishes_with_same_credential() {
        let mut s = polling_session();
        s.handle(Event::CredentialObserved {
            credential: credential(),
        })
        .unwrap();
        s.handle(Event::PublishFailed {
            message: "{\"error\":\"boom\"}".into(),
        })
        .unwrap();
        assert_eq!(s.stage(), Stage::Failed);
        let fx = s.handle(Event::Retry { auth_valid: true }).unwrap();
        assert_eq!(fx, vec![Effect::Publish]);
        assert_eq!(s.stage(), Stage::Publishing);
        assert_eq!(s.device_credential().unwrap().expose(), "tok123");

        let fx = s.handle(Event::Published).unwrap();
        assert_eq!(fx, vec![Effect::NotifyCompleted]);
        assert!(s.last_error().is_none());
    }

    #[test]
    fn ensure_publishable_reports_missing_credential() {
        let s = polling_session();
        assert_eq!(
            s.ensure_publishable().unwrap_err(),
            TransitionError::PublishPrecondition {
                missing: "device credential"
            }
        );
    }

    #[test]
    fn policy_choice_keeps_user_toggles() {
        let mut s = ActivationSession::new(code());
        s.handle(Event::Authenticated { operator_id: operator() }).unwrap();
        s.handle(Event::Bound { children: vec![mia()] }).unwrap();
        s.handle(Event::ChildChosen {
            child: mia(),
            age: 9,
            created: false,
        })
        .unwrap();
        s.handle(Event::AppsChosen { app_ids: apps(&[]) }).unwrap();
        s.handle(Event::PolicyChosen {
            policy: FilterPolicy {
                school_hours: true,
                block_social: true,
                ..FilterPolicy::default()
            },
        })
        .unwrap();
        assert!(s.filter_policy().school_hours);
        assert!(s.filter_policy().block_social);
        assert!(!s.filter_policy().block_gaming);
    }
}
