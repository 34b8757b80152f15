//! Small shared types: lease identity and summary reports.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of an instrumented lease.
///
/// Used by the shadow log to remove the exact holder a lease cancellation
/// targets, independent of structural equality of the records involved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct LeaseId(u64);

static NEXT_LEASE_ID: AtomicU64 = AtomicU64::new(1);

impl LeaseId {
    /// Allocate the next process-unique lease id.
    pub fn next() -> Self {
        LeaseId(NEXT_LEASE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LeaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lease-{}", self.0)
    }
}

/// Aggregate over one shadow-log traversal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    /// Holders currently in the log, across all buckets.
    pub total_entries: u64,

    /// Holders with neither uncertainty flag set.
    pub clean_entries: u64,

    /// Holders created by a write whose remote call failed.
    pub writes_in_doubt: u64,

    /// Holders flagged because an indistinguishable duplicate was taken.
    pub ambiguous_removals: u64,

    /// Longest remaining lease duration among clean holders, in
    /// milliseconds. `None` when no clean holder has an observable lease.
    pub longest_lease_ms: Option<i64>,
}

/// Point-in-time copy of the auditor's monotonic counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub write_attempts: u64,
    pub successful_writes: u64,
    pub take_attempts: u64,
    pub successful_takes: u64,

    /// Takes whose remote call failed.
    pub bad_takes: u64,

    /// Takes that succeeded remotely but matched no local bucket.
    pub log_removal_failures: u64,
}
