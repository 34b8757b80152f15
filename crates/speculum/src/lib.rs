//! Speculum: an audited mirror for a remote tuple-space store
//!
//! The [`Auditor`] sits in front of a remote tuple-space service,
//! intercepts every write/take/notify call, and maintains a local shadow
//! log of what it believes the remote store contains. Audit queries
//! ([`Auditor::summarize`], [`Auditor::logged_records`]) let a verifier
//! detect divergence between expected and actual store state.
//!
//! Uncertainty is modeled, not guessed away:
//! - a write whose remote call fails is logged *in doubt*
//! - taking one of several indistinguishable duplicates flags the
//!   survivors *ambiguous*
//! - a take that matches no local bucket bumps a removal-failure counter
//!   and otherwise succeeds
//!
//! The mirror is accurate under a single-client-at-a-time usage
//! discipline; concurrent external clients surface as elevated counters,
//! never as crashes or corrupted state.

pub mod auditor;
pub mod config;
pub mod lease;
pub mod listener;
pub mod prelude;
pub mod summary;

pub use auditor::Auditor;
pub use config::AuditorConfig;
pub use lease::{InstrumentedLease, LeaseKind};
pub use listener::{EventDiscrepancy, PassThroughListener};
pub use summary::AuditSummary;

// Core surface, re-exported so most callers need only this crate.
pub use speculum_core::error::{Result, SpeculumError};
pub use speculum_core::record::{
    fields_match_template, template_matches, Field, FieldValue, Record, StructuralKey,
};
pub use speculum_core::remote::{
    ConstrainedRemoteLease, EventRegistration, EventSink, RemoteLease, RemoteLeaseHandle,
    RemoteSpace, SerialFormat, SpaceEvent, Transaction,
};
pub use speculum_core::types::{CounterSnapshot, LeaseId, LogSummary};
