//! # safenest-activation -- Device Activation Workflow
//!
//! Pairs a physical SafeNest device with a signed-in parent account, gathers
//! the child profile, app allow-list and web-filter policy, waits for the
//! device to report its long-lived credential, and pushes the configuration
//! to the device using that credential.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`SessionGate`] | Waits for an operator identity from the host's auth |
//! | [`DeviceBinder`] | Claims the pairing code, loads existing children |
//! | [`ProfileCollector`] | Validates child, app and policy choices locally |
//! | [`EnrichmentProvisioner`] | Best-effort DNS-filter setup on a detached task |
//! | [`CredentialPoller`] | Primary/fallback status polling with a fixed budget |
//! | [`ConfigPublisher`] | Device-authorized postinstall push |
//! | [`ActivationWorkflow`] | Executes the effects of the state machine |
//!
//! ## Example
//!
//! ```no_run
//! use safenest_activation::{ActivationWorkflow, StaticOperatorAuth, SystemClock};
//! # async fn run(
//! #     identity: safenest_activation::OperatorIdentity,
//! #     catalog: safenest_core::AppCatalog,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = safenest_client::ClientConfig::from_env()?;
//! let client = safenest_client::ActivationClient::new(&config)?;
//! let code = safenest_core::DeviceCode::new("ABCD-1234")?;
//!
//! let mut wf = ActivationWorkflow::new(
//!     code,
//!     &client,
//!     &config,
//!     StaticOperatorAuth::signed_in(identity),
//!     SystemClock,
//!     catalog,
//! );
//! wf.start().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Logging goes through `tracing`; the host application installs the
//! subscriber.

pub mod binder;
pub mod cancel;
pub mod clock;
pub mod collector;
pub mod enrichment;
pub mod error;
pub mod gate;
pub mod poller;
pub mod publisher;
pub mod workflow;

pub use binder::{BindOutcome, DeviceBinder};
pub use cancel::{CancelHandle, CancelToken};
pub use clock::{Clock, FixedClock, SystemClock};
pub use collector::{NewChild, ProfileCollector};
pub use enrichment::{EnrichmentHandle, EnrichmentProvisioner};
pub use error::{
    ActivationError, AuthError, BindError, EnrichmentWarning, PollError, PublishError, TimeoutError,
};
pub use gate::{OperatorAuth, OperatorIdentity, SessionGate, StaticOperatorAuth, WatchOperatorAuth};
pub use poller::{CredentialPoller, PollOutcome, PollStats, StatusProbe};
pub use publisher::ConfigPublisher;
pub use workflow::{ActivationWorkflow, CompletionReport};
