//! # safenest-state -- Activation State Machine
//!
//! The activation workflow as a pure transition function: an
//! [`ActivationSession`] consumes an [`Event`] and returns the [`Effect`]s the
//! caller must execute. Nothing in this crate performs I/O, so every stage,
//! retry path and invariant is unit-testable without a network or a UI.
//!
//! ## Stages
//!
//! ```text
//! Auth → Bind → CollectChild → CollectApps → CollectPolicy → Polling → Publishing → Done
//!   └──────┴───────────── any stage may fail ─────────────────────┴──────────┘
//!                                   ↓
//!                                 Failed ──retry──→ Auth | Bind | Polling | Publishing
//! ```
//!
//! ## Invariants
//!
//! - The stage only moves forward, except for an explicit `Retry` out of
//!   `Failed`.
//! - The operator id is set once and never reassigned.
//! - The device credential is written at most once, only while `Polling`.
//! - A `Publish` effect is never emitted without both a credential and a child.
//! - Enrichment results never change the stage.
//! - `NotifyCompleted` is emitted exactly once per session.

pub mod event;
pub mod session;
pub mod stage;

pub use event::{Effect, Event};
pub use session::{ActivationSession, ChildSummary, ErrorKind, ErrorRecord, TransitionError};
pub use stage::Stage;
