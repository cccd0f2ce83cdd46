//! Activation stages.

use serde::{Deserialize, Serialize};

/// Where an activation session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Waiting for an authenticated operator.
    Auth,
    /// Claiming the pairing code for the operator.
    Bind,
    /// Choosing or creating the child profile.
    CollectChild,
    /// Choosing the app allow-list.
    CollectApps,
    /// Choosing the web-filter policy.
    CollectPolicy,
    /// Waiting for the backend to issue the device credential.
    Polling,
    /// Pushing the configuration to the device endpoint.
    Publishing,
    /// Activation complete. Terminal state.
    Done,
    /// The last attempt failed; may be retried.
    Failed,
}

impl Stage {
    /// Whether this stage admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// The canonical string name of this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "AUTH",
            Self::Bind => "BIND",
            Self::CollectChild => "COLLECT_CHILD",
            Self::CollectApps => "COLLECT_APPS",
            Self::CollectPolicy => "COLLECT_POLICY",
            Self::Polling => "POLLING",
            Self::Publishing => "PUBLISHING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }

    /// The next stage on the happy path.
    ///
    /// No wildcard, so adding a variant forces a decision here.
    pub fn next_forward(&self) -> Option<Stage> {
        match self {
            Self::Auth => Some(Self::Bind),
            Self::Bind => Some(Self::CollectChild),
            Self::CollectChild => Some(Self::CollectApps),
            Self::CollectApps => Some(Self::CollectPolicy),
            Self::CollectPolicy => Some(Self::Polling),
            Self::Polling => Some(Self::Publishing),
            Self::Publishing => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Position on the happy path. `Failed` sorts after `Done`.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Auth => 0,
            Self::Bind => 1,
            Self::CollectChild => 2,
            Self::CollectApps => 3,
            Self::CollectPolicy => 4,
            Self::Polling => 5,
            Self::Publishing => 6,
            Self::Done => 7,
            Self::Failed => 8,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_every_stage_once() {
        let mut stage = Stage::Auth;
        let mut seen = vec![stage];
        while let Some(next) = stage.next_forward() {
            assert!(next.ordinal() > stage.ordinal());
            stage = next;
            seen.push(stage);
        }
        assert_eq!(stage, Stage::Done);
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn only_done_is_terminal() {
        assert!(Stage::Done.is_terminal());
        assert!(!Stage::Failed.is_terminal());
        assert!(!Stage::Polling.is_terminal());
    }

    #[test]
    fn display_uses_canonical_names() {
        assert_eq!(Stage::CollectPolicy.to_string(), "COLLECT_POLICY");
        assert_eq!(Stage::Failed.to_string(), "FAILED");
    }

    #[test]
    fn serde_uses_variant_names() {
        let s = serde_json::to_string(&Stage::Polling).unwrap();
        assert_eq!(s, "\"Polling\"");
    }
}
