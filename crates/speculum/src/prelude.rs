//! Speculum Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use speculum::prelude::*;
//! ```

// Orchestration
pub use crate::{AuditSummary, Auditor, AuditorConfig, InstrumentedLease};

// Record model
pub use crate::{Field, FieldValue, Record, StructuralKey};

// Remote interfaces
pub use crate::{
    EventRegistration, EventSink, RemoteLease, RemoteLeaseHandle, RemoteSpace, SerialFormat,
    SpaceEvent, Transaction,
};

// Errors and reports
pub use crate::{CounterSnapshot, EventDiscrepancy, LogSummary, Result, SpeculumError};
