//! Audit summaries
//!
//! A summary is a point-in-time report combining the auditor's monotonic
//! counters, one shadow-log traversal, and each listener's discrepancy
//! report. It is the only place ambiguity is surfaced: duplicates and
//! in-doubt writes never error, they show up here.

use crate::listener::EventDiscrepancy;
use serde::Serialize;
use speculum_core::types::{CounterSnapshot, LogSummary};
use std::fmt;

#[derive(Clone, Debug, Serialize)]
pub struct AuditSummary {
    pub write_attempts: u64,
    pub successful_writes: u64,
    pub take_attempts: u64,
    pub successful_takes: u64,

    /// Takes whose remote call failed.
    pub failed_takes: u64,

    /// Takes that succeeded remotely but matched no local bucket.
    pub log_removal_failures: u64,

    /// Holders currently in the shadow log.
    pub total_entries: u64,

    /// Holders with neither uncertainty flag set.
    pub clean_entries: u64,

    /// Holders whose creating write failed remotely.
    pub writes_in_doubt: u64,

    /// Holders flagged because an indistinguishable duplicate was taken.
    pub ambiguous_entry_takes: u64,

    /// Longest remaining lease among clean holders, in milliseconds.
    pub longest_lease_ms: Option<i64>,

    /// Per-listener expected-vs-received mismatches.
    pub event_failures: Vec<EventDiscrepancy>,
}

impl AuditSummary {
    pub fn assemble(
        counters: CounterSnapshot,
        log: LogSummary,
        event_failures: Vec<EventDiscrepancy>,
    ) -> Self {
        Self {
            write_attempts: counters.write_attempts,
            successful_writes: counters.successful_writes,
            take_attempts: counters.take_attempts,
            successful_takes: counters.successful_takes,
            failed_takes: counters.bad_takes,
            log_removal_failures: counters.log_removal_failures,
            total_entries: log.total_entries,
            clean_entries: log.clean_entries,
            writes_in_doubt: log.writes_in_doubt,
            ambiguous_entry_takes: log.ambiguous_removals,
            longest_lease_ms: log.longest_lease_ms,
            event_failures,
        }
    }

    /// No uncertainty anywhere: every write landed, no take failed or
    /// missed its bucket, no duplicates were taken, every listener
    /// balanced. Takes that found no match are fine.
    pub fn is_clean(&self) -> bool {
        self.write_attempts == self.successful_writes
            && self.failed_takes == 0
            && self.log_removal_failures == 0
            && self.writes_in_doubt == 0
            && self.ambiguous_entry_takes == 0
            && self.event_failures.is_empty()
    }
}

impl fmt::Display for AuditSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "writes: {}/{} ok, takes: {}/{} ok ({} failed, {} unmatched locally)",
            self.successful_writes,
            self.write_attempts,
            self.successful_takes,
            self.take_attempts,
            self.failed_takes,
            self.log_removal_failures
        )?;
        writeln!(
            f,
            "log: {} entries ({} clean, {} in doubt, {} ambiguous)",
            self.total_entries, self.clean_entries, self.writes_in_doubt, self.ambiguous_entry_takes
        )?;
        match self.longest_lease_ms {
            Some(ms) => writeln!(f, "longest clean lease: {}ms", ms)?,
            None => writeln!(f, "longest clean lease: n/a")?,
        }
        if self.event_failures.is_empty() {
            write!(f, "events: balanced")
        } else {
            write!(f, "events: {} listener(s) unbalanced", self.event_failures.len())?;
            for failure in &self.event_failures {
                write!(f, "\n  {}", failure)?;
            }
            Ok(())
        }
    }
}
