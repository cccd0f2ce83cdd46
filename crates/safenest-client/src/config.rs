//! Activation client configuration.
//!
//! One base URL serves every collaborator endpoint. The API key is sent on
//! every request; operator and device credentials are supplied per call.
//! Load from environment variables or construct explicitly for tests.

use url::Url;
use zeroize::Zeroizing;

/// Default number of credential poll attempts.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 20;
/// Default delay between credential poll attempts.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_500;
/// Default time the publisher waits for a late enrichment result.
pub const DEFAULT_ENRICHMENT_GRACE_MS: u64 = 2_000;

/// Configuration for talking to the activation backend.
///
/// Custom `Debug` implementation redacts the `api_key` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `https://project.supabase.co`.
    pub base_url: Url,
    /// Project API key, sent as the `apikey` header on every request.
    pub api_key: Zeroizing<String>,
    /// Credential poll attempts before giving up.
    pub poll_attempts: u32,
    /// Delay between credential poll attempts, in milliseconds.
    pub poll_interval_ms: u64,
    /// Per-request timeout for the postinstall push. `None` uses the
    /// transport default.
    pub publish_timeout_ms: Option<u64>,
    /// Per-request timeout for the bind call. `None` uses the transport default.
    pub bind_timeout_ms: Option<u64>,
    /// How long publishing waits for a pending enrichment result.
    pub enrichment_grace_ms: u64,
    /// Transport-level retries for bind, enrichment and publish calls.
    pub transport_retries: u32,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("poll_attempts", &self.poll_attempts)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("publish_timeout_ms", &self.publish_timeout_ms)
            .field("bind_timeout_ms", &self.bind_timeout_ms)
            .field("enrichment_grace_ms", &self.enrichment_grace_ms)
            .field("transport_retries", &self.transport_retries)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration with default tuning for the given backend.
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            base_url,
            api_key: Zeroizing::new(api_key.into()),
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            publish_timeout_ms: None,
            bind_timeout_ms: None,
            enrichment_grace_ms: DEFAULT_ENRICHMENT_GRACE_MS,
            transport_retries: 0,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `SAFENEST_BASE_URL` (required)
    /// - `SAFENEST_API_KEY` (required)
    /// - `SAFENEST_POLL_ATTEMPTS` (default: 20)
    /// - `SAFENEST_POLL_INTERVAL_MS` (default: 1500)
    /// - `SAFENEST_PUBLISH_TIMEOUT_MS` (default: unset)
    /// - `SAFENEST_BIND_TIMEOUT_MS` (default: unset)
    /// - `SAFENEST_ENRICHMENT_GRACE_MS` (default: 2000)
    /// - `SAFENEST_TRANSPORT_RETRIES` (default: 0)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("SAFENEST_BASE_URL").ok_or(ConfigError::Missing("SAFENEST_BASE_URL"))?;
        let base_url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidUrl("SAFENEST_BASE_URL".to_string(), e.to_string()))?;
        let api_key = lookup("SAFENEST_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing("SAFENEST_API_KEY"))?;

        let mut config = Self::new(base_url, api_key);
        if let Some(v) = parse_var(&lookup, "SAFENEST_POLL_ATTEMPTS")? {
            config.poll_attempts = v;
        }
        if let Some(v) = parse_var(&lookup, "SAFENEST_POLL_INTERVAL_MS")? {
            config.poll_interval_ms = v;
        }
        config.publish_timeout_ms = parse_var(&lookup, "SAFENEST_PUBLISH_TIMEOUT_MS")?;
        config.bind_timeout_ms = parse_var(&lookup, "SAFENEST_BIND_TIMEOUT_MS")?;
        if let Some(v) = parse_var(&lookup, "SAFENEST_ENRICHMENT_GRACE_MS")? {
            config.enrichment_grace_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "SAFENEST_TRANSPORT_RETRIES")? {
            config.transport_retries = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration pointing at a local mock server (for testing).
    ///
    /// Poll delays are shortened so that tests driving real HTTP stay fast.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base` cannot be parsed.
    pub fn local_mock(base: &str, api_key: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base)
            .map_err(|e| ConfigError::InvalidUrl("local_mock".to_string(), e.to_string()))?;
        let mut config = Self::new(base_url, api_key);
        config.poll_interval_ms = 10;
        config.enrichment_grace_ms = 5_000;
        Ok(config)
    }

    /// Reject settings the poller cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "SAFENEST_POLL_ATTEMPTS",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_observed_poll_behaviour() {
        let cfg = ClientConfig::from_lookup(lookup_from(&[
            ("SAFENEST_BASE_URL", "https://example.supabase.co"),
            ("SAFENEST_API_KEY", "anon-key"),
        ]))
        .unwrap();
        assert_eq!(cfg.poll_attempts, 20);
        assert_eq!(cfg.poll_interval_ms, 1_500);
        assert_eq!(cfg.publish_timeout_ms, None);
        assert_eq!(cfg.bind_timeout_ms, None);
        assert_eq!(cfg.transport_retries, 0);
        assert_eq!(cfg.api_key.as_str(), "anon-key");
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = ClientConfig::from_lookup(lookup_from(&[
            ("SAFENEST_BASE_URL", "https://example.supabase.co"),
            ("SAFENEST_API_KEY", "anon-key"),
            ("SAFENEST_POLL_ATTEMPTS", "5"),
            ("SAFENEST_POLL_INTERVAL_MS", "250"),
            ("SAFENEST_PUBLISH_TIMEOUT_MS", "8000"),
            ("SAFENEST_TRANSPORT_RETRIES", "2"),
        ]))
        .unwrap();
        assert_eq!(cfg.poll_attempts, 5);
        assert_eq!(cfg.poll_interval_ms, 250);
        assert_eq!(cfg.publish_timeout_ms, Some(8_000));
        assert_eq!(cfg.transport_retries, 2);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = ClientConfig::from_lookup(lookup_from(&[(
            "SAFENEST_BASE_URL",
            "https://example.supabase.co",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SAFENEST_API_KEY")));
    }

    #[test]
    fn invalid_number_names_the_key() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("SAFENEST_BASE_URL", "https://example.supabase.co"),
            ("SAFENEST_API_KEY", "anon-key"),
            ("SAFENEST_POLL_ATTEMPTS", "many"),
        ]))
        .unwrap_err();
        assert!(format!("{err}").contains("SAFENEST_POLL_ATTEMPTS"));
    }

    #[test]
    fn zero_poll_attempts_is_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("SAFENEST_BASE_URL", "https://example.supabase.co"),
            ("SAFENEST_API_KEY", "anon-key"),
            ("SAFENEST_POLL_ATTEMPTS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("SAFENEST_BASE_URL", "not a url"),
            ("SAFENEST_API_KEY", "anon-key"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(..)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg = ClientConfig::local_mock("http://127.0.0.1:9000", "super-secret").unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
