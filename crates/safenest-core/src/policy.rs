//! # Web-Filter Policy
//!
//! The content policy pushed to the device at postinstall. Pure local state
//! until publishing; the DNS profile id is filled in by enrichment when it
//! succeeds and stays `None` otherwise.

use serde::{Deserialize, Serialize};

use crate::identity::DnsProfileId;

/// Content-filtering policy for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPolicy {
    /// Household DNS-filter profile, when enrichment succeeded.
    pub dns_profile_id: Option<DnsProfileId>,
    /// Restrict usage during school hours.
    pub school_hours: bool,
    /// Block social-media categories.
    pub block_social: bool,
    /// Block gaming categories.
    pub block_gaming: bool,
    /// Block entertainment/streaming categories.
    pub block_entertainment: bool,
}

impl FilterPolicy {
    /// Return a copy of this policy with the DNS profile replaced.
    ///
    /// User-chosen toggles are preserved.
    pub fn with_dns_profile(mut self, id: Option<DnsProfileId>) -> Self {
        self.dns_profile_id = id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_blocks_nothing() {
        let p = FilterPolicy::default();
        assert!(p.dns_profile_id.is_none());
        assert!(!p.school_hours && !p.block_social && !p.block_gaming && !p.block_entertainment);
    }

    #[test]
    fn with_dns_profile_keeps_toggles() {
        let p = FilterPolicy {
            block_gaming: true,
            ..FilterPolicy::default()
        }
        .with_dns_profile(Some(DnsProfileId::new("cfg-1").unwrap()));
        assert!(p.block_gaming);
        assert_eq!(p.dns_profile_id.unwrap().as_str(), "cfg-1");
    }
}
