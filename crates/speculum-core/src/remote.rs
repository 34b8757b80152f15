//! Remote tuple-space interfaces
//!
//! The mirror sits in front of a remote associative store reached through a
//! remote-invocation boundary. These traits are the consumed surface: the
//! store itself (matching engine, persistence, transactions, transport) is
//! out of scope and lives behind them. Any call may block for arbitrary
//! latency and may fail with [`SpeculumError::Remote`].
//!
//! [`SpeculumError::Remote`]: crate::error::SpeculumError::Remote

use crate::error::Result;
use crate::record::Record;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Opaque transaction handle owned by the external transaction manager.
pub trait Transaction: fmt::Debug + Send + Sync {}

/// Wire representation negotiated for a lease.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SerialFormat {
    /// Expiration travels as a duration relative to transfer time.
    Duration,
    /// Expiration travels as an absolute timestamp.
    AbsoluteTime,
}

/// A lease granted by the remote store.
pub trait RemoteLease: Send + Sync {
    fn expiration(&self) -> DateTime<Utc>;

    /// Ask the store to extend the lease by `duration_ms` from now.
    fn renew(&self, duration_ms: i64) -> Result<()>;

    /// Cancel the lease at the store.
    fn cancel(&self) -> Result<()>;

    fn serial_format(&self) -> SerialFormat;

    fn set_serial_format(&self, format: SerialFormat);

    /// Whether this lease can be batch-renewed together with `other`.
    fn can_batch(&self, other: &dyn RemoteLease) -> bool;
}

/// A lease that additionally exposes a constraint/trust-verification
/// capability. Deployments that proxy through untrusted transports grant
/// this variant; plain deployments do not.
pub trait ConstrainedRemoteLease: RemoteLease {
    /// Descriptors of the constraints currently attached to the lease.
    fn constraints(&self) -> Vec<String>;
}

/// Lease handle returned by a successful remote write.
///
/// The capability split is decided once, here, by the store: downstream
/// wrappers branch on the variant at construction instead of re-probing.
pub enum RemoteLeaseHandle {
    Plain(Box<dyn RemoteLease>),
    Constrained(Box<dyn ConstrainedRemoteLease>),
}

impl RemoteLeaseHandle {
    pub fn as_lease(&self) -> &dyn RemoteLease {
        match self {
            RemoteLeaseHandle::Plain(l) => l.as_ref(),
            RemoteLeaseHandle::Constrained(l) => l.as_ref(),
        }
    }
}

impl fmt::Debug for RemoteLeaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteLeaseHandle::Plain(l) => f
                .debug_struct("RemoteLeaseHandle::Plain")
                .field("expiration", &l.expiration())
                .finish(),
            RemoteLeaseHandle::Constrained(l) => f
                .debug_struct("RemoteLeaseHandle::Constrained")
                .field("expiration", &l.expiration())
                .field("constraints", &l.constraints())
                .finish(),
        }
    }
}

/// An event delivered to a registered listener when a matching record is
/// written to the store.
#[derive(Clone, Debug)]
pub struct SpaceEvent {
    /// Registration this event belongs to.
    pub registration_id: u64,

    /// Store-assigned sequence number, monotonic per registration.
    pub sequence: u64,

    /// Caller-supplied opaque bytes returned with every delivery.
    pub handback: Vec<u8>,
}

/// Receiver half of a notify registration.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &SpaceEvent) -> Result<()>;
}

/// Result of a notify registration at the store.
#[derive(Clone, Debug)]
pub struct EventRegistration {
    pub registration_id: u64,

    /// Sequence number from which deliveries will start.
    pub starting_sequence: u64,

    /// Expiration of the registration's lease at the store, when known.
    pub lease_expiration: Option<DateTime<Utc>>,
}

/// The remote tuple-space store.
///
/// `timeout_ms` on the query operations is honored by the store, not by the
/// mirror; blocking forms wait up to the timeout for a match, `*_if_exists`
/// forms wait only for settled transactional state.
pub trait RemoteSpace: Send + Sync {
    fn write(
        &self,
        record: Arc<dyn Record>,
        txn: Option<&dyn Transaction>,
        lease_duration_ms: i64,
    ) -> Result<RemoteLeaseHandle>;

    fn read(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>>;

    fn read_if_exists(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>>;

    fn take(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>>;

    fn take_if_exists(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>>;

    fn notify(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        sink: Arc<dyn EventSink>,
        lease_duration_ms: i64,
        handback: Vec<u8>,
    ) -> Result<EventRegistration>;

    /// Opaque-form optimization hint; the store returns a handle the caller
    /// can pass back in place of `record`. The mirror does not track it.
    fn snapshot(&self, record: &dyn Record) -> Result<Arc<dyn Record>>;
}
