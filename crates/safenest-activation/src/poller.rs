//! Credential polling with a primary and a fallback status read path.
//!
//! ## Algorithm
//!
//! Up to `attempts` ticks, `interval` apart (no sleep after the last tick).
//! Each tick:
//!
//! 1. Query the primary endpoint. A 2xx response reporting `activated`
//!    with a non-empty credential ends the loop.
//! 2. Only if the primary answered non-2xx, query the fallback in the same
//!    tick with identical semantics.
//! 3. Transport errors are logged and end the tick as "not activated".
//!
//! A tick therefore makes at most two calls. Cancellation is checked before
//! every tick and raced against every call and sleep.

use std::future::Future;
use std::time::Duration;

use safenest_client::status::StatusClient;
use safenest_client::{ActivationStatus, ApiError, ClientConfig, StatusEndpoint};
use safenest_core::{DeviceCode, SecretToken};

use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::error::{PollError, TimeoutError};

/// One read of a status endpoint.
pub trait StatusProbe: Send + Sync {
    /// Query `endpoint` for `device_code`.
    fn probe(
        &self,
        endpoint: StatusEndpoint,
        device_code: &DeviceCode,
    ) -> impl Future<Output = Result<ActivationStatus, ApiError>> + Send;
}

impl StatusProbe for StatusClient {
    fn probe(
        &self,
        endpoint: StatusEndpoint,
        device_code: &DeviceCode,
    ) -> impl Future<Output = Result<ActivationStatus, ApiError>> + Send {
        self.fetch(endpoint, device_code)
    }
}

/// A credential and what it took to get it.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// The device credential.
    pub credential: SecretToken,
    /// Ticks used, including the successful one.
    pub attempts: u32,
    /// Calls made to the primary endpoint.
    pub primary_calls: u32,
    /// Calls made to the fallback endpoint.
    pub fallback_calls: u32,
}

impl PollOutcome {
    /// Call counts without the credential.
    pub fn stats(&self) -> PollStats {
        PollStats {
            attempts: self.attempts,
            primary_calls: self.primary_calls,
            fallback_calls: self.fallback_calls,
        }
    }
}

/// Diagnostic counts from a successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    /// Ticks used.
    pub attempts: u32,
    /// Calls made to the primary endpoint.
    pub primary_calls: u32,
    /// Calls made to the fallback endpoint.
    pub fallback_calls: u32,
}

#[derive(Debug, Default)]
struct Tick {
    credential: Option<SecretToken>,
    fallback_called: bool,
}

/// Polls the status endpoints until the device reports its credential.
#[derive(Debug, Clone)]
pub struct CredentialPoller<S, C> {
    probe: S,
    clock: C,
    attempts: u32,
    interval: Duration,
}

impl<S: StatusProbe, C: Clock> CredentialPoller<S, C> {
    /// Poller with an explicit budget. `attempts` below 1 is treated as 1.
    pub fn new(probe: S, clock: C, attempts: u32, interval: Duration) -> Self {
        Self {
            probe,
            clock,
            attempts: attempts.max(1),
            interval,
        }
    }

    /// Poller using the budget from `config`.
    pub fn from_config(probe: S, clock: C, config: &ClientConfig) -> Self {
        Self::new(
            probe,
            clock,
            config.poll_attempts,
            Duration::from_millis(config.poll_interval_ms),
        )
    }

    /// Wait for the device credential.
    ///
    /// # Errors
    ///
    /// [`PollError::Timeout`] once every attempt has been used and
    /// [`PollError::Cancelled`] as soon as `cancel` fires.
    pub async fn await_credential(
        &self,
        device_code: &DeviceCode,
        cancel: &CancelToken,
    ) -> Result<PollOutcome, PollError> {
        let mut primary_calls = 0;
        let mut fallback_calls = 0;

        for attempt in 1..=self.attempts {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            let tick = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                tick = self.tick(device_code, attempt) => tick,
            };
            primary_calls += 1;
            if tick.fallback_called {
                fallback_calls += 1;
            }

            if let Some(credential) = tick.credential {
                tracing::info!(
                    device_code = %device_code,
                    attempt,
                    primary_calls,
                    fallback_calls,
                    "device credential observed"
                );
                return Ok(PollOutcome {
                    credential,
                    attempts: attempt,
                    primary_calls,
                    fallback_calls,
                });
            }

            if attempt < self.attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(PollError::Cancelled),
                    _ = self.clock.sleep(self.interval) => {}
                }
            }
        }

        tracing::warn!(
            device_code = %device_code,
            attempts = self.attempts,
            "device did not activate within the poll budget"
        );
        Err(TimeoutError {
            attempts: self.attempts,
        }
        .into())
    }

    async fn tick(&self, device_code: &DeviceCode, attempt: u32) -> Tick {
        let primary = self.probe.probe(StatusEndpoint::Primary, device_code).await;
        let err = match primary {
            Ok(status) => {
                return Tick {
                    credential: status.credential(),
                    fallback_called: false,
                }
            }
            Err(e) => e,
        };

        if !err.is_status() {
            tracing::warn!(
                device_code = %device_code,
                attempt,
                endpoint = %StatusEndpoint::Primary,
                unreachable = err.is_transport(),
                error = %err,
                "status poll failed"
            );
            return Tick::default();
        }

        tracing::debug!(
            device_code = %device_code,
            attempt,
            error = %err,
            "primary status unavailable, trying fallback"
        );
        match self.probe.probe(StatusEndpoint::Fallback, device_code).await {
            Ok(status) => Tick {
                credential: status.credential(),
                fallback_called: true,
            },
            Err(e) => {
                tracing::warn!(
                    device_code = %device_code,
                    attempt,
                    endpoint = %StatusEndpoint::Fallback,
                    error = %e,
                    "status poll failed"
                );
                Tick {
                    credential: None,
                    fallback_called: true,
                }
            }
        }
    }
}
