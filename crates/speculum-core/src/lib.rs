//! Speculum Core: Traits and types for the tuple-space audit mirror
//!
//! This crate defines the core abstractions of a mirror that sits in front
//! of a remote tuple-space store and tracks what it believes the store
//! contains:
//! - Record introspection: explicit matchable-field enumeration instead of
//!   runtime reflection, with structural keys for bucketing
//! - Shadow log: structural-key → FIFO bucket map behind one coarse lock
//! - Remote interfaces: the consumed store/lease/event traits
//!
//! Key properties:
//! - Uncertainty is first-class: failed writes are logged in-doubt,
//!   duplicate takes flag survivors ambiguous, local misses are counted
//! - Remote failures always propagate unchanged after bookkeeping
//! - No persistence, no retries, no transport: those live behind the
//!   remote-invocation boundary

pub mod error;
pub mod observe;
pub mod record;
pub mod remote;
pub mod shadow_log;
pub mod types;

pub use error::{Result, SpeculumError};
pub use record::{template_matches, Field, FieldValue, Record, StructuralKey};
pub use remote::{
    ConstrainedRemoteLease, EventRegistration, EventSink, RemoteLease, RemoteLeaseHandle,
    RemoteSpace, SerialFormat, SpaceEvent, Transaction,
};
pub use shadow_log::{EntryHolder, HolderLease, RemovalOutcome, ShadowLog};
pub use types::{CounterSnapshot, LeaseId, LogSummary};
