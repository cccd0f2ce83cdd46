#![deny(missing_docs)]

//! # safenest-core -- Foundational Types for Device Activation
//!
//! Types shared by every crate in the activation stack. This crate performs
//! no I/O and depends only on `serde`, `thiserror`, `chrono` and `zeroize`.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** A [`ChildId`] cannot be passed
//!    where an [`AppId`] is expected, and a pairing code is a [`DeviceCode`],
//!    never a bare string.
//!
//! 2. **Secrets never print.** Operator bearer tokens and device credentials
//!    are held in [`SecretToken`], which zeroizes on drop and redacts its
//!    `Debug` output.
//!
//! 3. **Local validation stays local.** [`ValidationError`] covers every input
//!    problem that must be rejected before anything reaches the network.

pub mod catalog;
pub mod error;
pub mod identity;
pub mod policy;
pub mod temporal;

pub use catalog::{AppCatalog, AppCatalogEntry};
pub use error::ValidationError;
pub use identity::{AppId, ChildId, DeviceCode, DnsProfileId, OperatorId, SecretToken};
pub use policy::FilterPolicy;
pub use temporal::{age_on, parse_dob};
