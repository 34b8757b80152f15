//! Shadow log of the mirrored store's believed contents
//!
//! One bucket per structural key, each holding the entry holders for
//! records that cannot be told apart by identity, FIFO by write order.
//! A single coarse mutex guards the whole map: buckets are short-lived and
//! low-cardinality per run, and no traversal may observe a bucket
//! mid-mutation, so correctness of iteration wins over fine-grained
//! throughput. Do not replace this with per-bucket locks without
//! re-validating the traversal invariant.
//!
//! The log tracks belief, not truth. There is an unavoidable window between
//! a remote call completing on the store and the local update here; the
//! resulting uncertainty is recorded (`write_in_doubt`,
//! `ambiguous_removal`) instead of papered over.

use crate::error::Result;
use crate::observe;
use crate::record::{Record, StructuralKey};
use crate::types::{LeaseId, LogSummary};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Lease view the log needs from a holder: identity for exact removal and
/// the current expiration for threshold queries. An in-doubt holder has no
/// remote lease and reports `None`.
pub trait HolderLease: Send + Sync {
    fn id(&self) -> LeaseId;

    fn expiration(&self) -> Option<DateTime<Utc>>;
}

/// One logged write. The record and lease are fixed at creation; only the
/// two uncertainty flags ever change, and only under the log lock.
pub struct EntryHolder {
    pub record: Arc<dyn Record>,
    pub lease: Arc<dyn HolderLease>,

    /// The remote write call failed, so the write may or may not have
    /// landed. Optimistically logged anyway.
    pub write_in_doubt: bool,

    /// A structurally-equal duplicate was taken from this bucket, so it is
    /// unknown whether the store still holds this particular copy.
    pub ambiguous_removal: bool,
}

impl EntryHolder {
    pub fn new(record: Arc<dyn Record>, lease: Arc<dyn HolderLease>, write_in_doubt: bool) -> Self {
        Self {
            record,
            lease,
            write_in_doubt,
            ambiguous_removal: false,
        }
    }

    /// Neither uncertainty flag set.
    pub fn is_clean(&self) -> bool {
        !self.write_in_doubt && !self.ambiguous_removal
    }
}

/// Outcome of a FIFO removal.
pub enum RemovalOutcome {
    Removed(EntryHolder),

    /// No bucket for the record's key. Benign from the caller's point of
    /// view; the auditor counts it as a log-removal failure.
    NotFound,
}

/// Structural-key → FIFO bucket map behind one coarse lock.
#[derive(Default)]
pub struct ShadowLog {
    buckets: Mutex<HashMap<StructuralKey, VecDeque<EntryHolder>>>,
}

impl ShadowLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a holder to its record's bucket, creating the bucket if
    /// absent.
    pub fn insert(&self, holder: EntryHolder) -> Result<()> {
        let key = StructuralKey::of(holder.record.as_ref())?;
        let mut buckets = self.buckets.lock();
        buckets.entry(key).or_default().push_back(holder);
        observe::set_log_size(buckets.values().map(|b| b.len()).sum());
        Ok(())
    }

    /// Remove the oldest holder from the record's bucket.
    ///
    /// FIFO pop is a documented approximation: the store's own selection
    /// among indistinguishable duplicates is unspecified. When the bucket
    /// stays non-empty after the pop it is no longer knowable which copies
    /// the store still holds, so every remaining holder in the bucket is
    /// flagged `ambiguous_removal`.
    pub fn remove_oldest(&self, record: &dyn Record) -> Result<RemovalOutcome> {
        let key = StructuralKey::of(record)?;
        let mut buckets = self.buckets.lock();
        let Some(bucket) = buckets.get_mut(&key) else {
            return Ok(RemovalOutcome::NotFound);
        };
        // A bucket exists iff it is non-empty.
        let holder = bucket.pop_front().expect("empty bucket left in log");
        if bucket.is_empty() {
            buckets.remove(&key);
        } else {
            tracing::warn!(
                key = %key,
                remaining = bucket.len(),
                "take from bucket with duplicates, remaining holders now ambiguous"
            );
            for remaining in bucket.iter_mut() {
                remaining.ambiguous_removal = true;
            }
        }
        observe::set_log_size(buckets.values().map(|b| b.len()).sum());
        Ok(RemovalOutcome::Removed(holder))
    }

    /// Remove the holder whose lease identity is exactly `lease_id`.
    ///
    /// Used only by lease cancellation, which knows precisely which lease
    /// is being cancelled, so this is exact rather than FIFO and sets no
    /// ambiguity flags. Returns whether a holder was removed.
    pub fn remove_by_lease(&self, key: &StructuralKey, lease_id: LeaseId) -> bool {
        let mut buckets = self.buckets.lock();
        let Some(bucket) = buckets.get_mut(key) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|h| h.lease.id() == lease_id) else {
            return false;
        };
        bucket.remove(pos);
        if bucket.is_empty() {
            buckets.remove(key);
        }
        observe::set_log_size(buckets.values().map(|b| b.len()).sum());
        true
    }

    /// Records of every holder whose lease expiration is at or after
    /// `now - threshold_ms`.
    ///
    /// A negative threshold is the "everything" sentinel and returns every
    /// holder regardless of expiration. Holders with no observable
    /// expiration (in-doubt, lease-less) are always included.
    pub fn logged_records(&self, threshold_ms: i64) -> Vec<Arc<dyn Record>> {
        let cutoff = (threshold_ms >= 0).then(|| Utc::now() - Duration::milliseconds(threshold_ms));
        let buckets = self.buckets.lock();
        buckets
            .values()
            .flatten()
            .filter(|h| match (cutoff, h.lease.expiration()) {
                (Some(cutoff), Some(expiration)) => expiration >= cutoff,
                _ => true,
            })
            .map(|h| Arc::clone(&h.record))
            .collect()
    }

    /// Single traversal computing totals, the clean/flagged partition, and
    /// the longest remaining lease among clean holders.
    pub fn summarize(&self) -> LogSummary {
        let now = Utc::now();
        let mut summary = LogSummary::default();
        let buckets = self.buckets.lock();
        for holder in buckets.values().flatten() {
            summary.total_entries += 1;
            if holder.write_in_doubt {
                summary.writes_in_doubt += 1;
            }
            if holder.ambiguous_removal {
                summary.ambiguous_removals += 1;
            }
            if holder.is_clean() {
                summary.clean_entries += 1;
                if let Some(expiration) = holder.lease.expiration() {
                    let remaining = (expiration - now).num_milliseconds();
                    summary.longest_lease_ms = Some(match summary.longest_lease_ms {
                        Some(best) => best.max(remaining),
                        None => remaining,
                    });
                }
            }
        }
        summary
    }

    /// Diagnostic traversal logging every held record with its flags.
    pub fn dump(&self) {
        let buckets = self.buckets.lock();
        let total: usize = buckets.values().map(|b| b.len()).sum();
        tracing::info!(total, buckets = buckets.len(), "shadow log dump");
        for (key, bucket) in buckets.iter() {
            for holder in bucket {
                tracing::info!(
                    key = %key,
                    lease = %holder.lease.id(),
                    write_in_doubt = holder.write_in_doubt,
                    ambiguous_removal = holder.ambiguous_removal,
                    record = ?holder.record,
                    "logged entry"
                );
            }
        }
    }

    /// Total holders across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.lock().values().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
