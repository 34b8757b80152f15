//! The auditor: an audited mirror over a remote tuple-space store
//!
//! Every public operation is a single blocking pass on the calling thread:
//! bump the attempt counter, delegate to the remote store (which may block
//! for arbitrary latency), then reconcile the shadow log and event list
//! with whatever could be observed. Remote failures are never retried and
//! never swallowed; after bookkeeping they propagate to the caller
//! unchanged.
//!
//! There is no ordering guarantee between a remote call completing on the
//! store and the local update here, so the mirror is only accurate under a
//! single-client-at-a-time discipline. Concurrent external clients do not
//! corrupt the log; they surface as elevated removal-failure and ambiguity
//! counters.

use crate::config::AuditorConfig;
use crate::lease::InstrumentedLease;
use crate::listener::PassThroughListener;
use crate::summary::AuditSummary;
use parking_lot::Mutex;
use speculum_core::error::Result;
use speculum_core::observe::{self, TakeOutcome};
use speculum_core::record::{Record, StructuralKey};
use speculum_core::remote::{EventRegistration, EventSink, RemoteSpace, Transaction};
use speculum_core::shadow_log::{EntryHolder, RemovalOutcome, ShadowLog};
use speculum_core::types::CounterSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-lifetime monotonic operation counters.
#[derive(Default)]
struct Counters {
    write_attempts: AtomicU64,
    successful_writes: AtomicU64,
    take_attempts: AtomicU64,
    successful_takes: AtomicU64,
    bad_takes: AtomicU64,
    log_removal_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            write_attempts: self.write_attempts.load(Ordering::Relaxed),
            successful_writes: self.successful_writes.load(Ordering::Relaxed),
            take_attempts: self.take_attempts.load(Ordering::Relaxed),
            successful_takes: self.successful_takes.load(Ordering::Relaxed),
            bad_takes: self.bad_takes.load(Ordering::Relaxed),
            log_removal_failures: self.log_removal_failures.load(Ordering::Relaxed),
        }
    }
}

/// Audited mirror in front of a remote tuple-space store.
///
/// Exposes the store's own operation set; around each call it maintains a
/// shadow log of what it believes the store contains and an event list of
/// registered listeners. [`summarize`](Auditor::summarize) reports the
/// divergence bookkeeping.
pub struct Auditor {
    remote: Arc<dyn RemoteSpace>,
    log: Arc<ShadowLog>,
    // Coarse lock, independent of the shadow log's.
    listeners: Mutex<Vec<PassThroughListener>>,
    counters: Counters,
    config: AuditorConfig,
}

impl Auditor {
    pub fn new(remote: Arc<dyn RemoteSpace>) -> Self {
        Self::with_config(remote, AuditorConfig::default())
    }

    pub fn with_config(remote: Arc<dyn RemoteSpace>, config: AuditorConfig) -> Self {
        Self {
            remote,
            log: Arc::new(ShadowLog::new()),
            listeners: Mutex::new(Vec::new()),
            counters: Counters::default(),
            config,
        }
    }

    /// Write `record` to the store with the requested lease duration.
    ///
    /// On success the returned lease is instrumented: cancelling it also
    /// drops the entry from the shadow log. On remote failure the write's
    /// actual effect is unknown, so the record is still logged — flagged
    /// in-doubt, with a lease-less handle — and the failure then propagates
    /// unchanged.
    pub fn write(
        &self,
        record: Arc<dyn Record>,
        txn: Option<&dyn Transaction>,
        lease_duration_ms: i64,
    ) -> Result<InstrumentedLease> {
        // Malformed records fail here, before anything is attempted.
        let key = StructuralKey::of(record.as_ref())?;

        self.counters.write_attempts.fetch_add(1, Ordering::Relaxed);
        match self.remote.write(Arc::clone(&record), txn, lease_duration_ms) {
            Ok(handle) => {
                self.counters
                    .successful_writes
                    .fetch_add(1, Ordering::Relaxed);
                observe::record_write(true);
                let lease = InstrumentedLease::wrap(handle, key, Arc::clone(&self.log));
                self.log.insert(EntryHolder::new(
                    Arc::clone(&record),
                    Arc::new(lease.clone()),
                    false,
                ))?;
                self.expect_all(record.as_ref(), false);
                Ok(lease)
            }
            Err(e) => {
                observe::record_write(false);
                tracing::warn!(
                    auditor = %self.config.name,
                    record = ?record,
                    error = %e,
                    "remote write failed, logging entry in doubt"
                );
                // The write may still have landed; log it optimistically.
                let lease = InstrumentedLease::in_doubt(key, Arc::clone(&self.log));
                self.log
                    .insert(EntryHolder::new(record.clone(), Arc::new(lease), true))?;
                self.expect_all(record.as_ref(), true);
                Err(e)
            }
        }
    }

    /// Blocking take: waits up to `timeout_ms` at the store for a match.
    pub fn take(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>> {
        self.counters.take_attempts.fetch_add(1, Ordering::Relaxed);
        let result = self.remote.take(template, txn, timeout_ms);
        self.account_take(result)
    }

    /// Take that waits only for settled transactional state.
    pub fn take_if_exists(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>> {
        self.counters.take_attempts.fetch_add(1, Ordering::Relaxed);
        let result = self.remote.take_if_exists(template, txn, timeout_ms);
        self.account_take(result)
    }

    fn account_take(
        &self,
        result: Result<Option<Arc<dyn Record>>>,
    ) -> Result<Option<Arc<dyn Record>>> {
        match result {
            Err(e) => {
                // The take may still have removed an entry remotely; that is
                // not reconciled here and will surface later as a removal
                // failure. See the module docs on uncertainty.
                self.counters.bad_takes.fetch_add(1, Ordering::Relaxed);
                observe::record_take(TakeOutcome::RemoteFailure);
                tracing::warn!(auditor = %self.config.name, error = %e, "remote take failed");
                Err(e)
            }
            Ok(None) => {
                observe::record_take(TakeOutcome::NoMatch);
                Ok(None)
            }
            Ok(Some(record)) => {
                self.counters
                    .successful_takes
                    .fetch_add(1, Ordering::Relaxed);
                observe::record_take(TakeOutcome::Taken);
                match self.log.remove_oldest(record.as_ref()) {
                    Ok(RemovalOutcome::Removed(_)) => {}
                    Ok(RemovalOutcome::NotFound) | Err(_) => {
                        // Benign: a concurrent external client, or an
                        // in-doubt write that never actually landed. The
                        // caller still gets the record.
                        self.counters
                            .log_removal_failures
                            .fetch_add(1, Ordering::Relaxed);
                        observe::record_removal_failure();
                        tracing::warn!(
                            auditor = %self.config.name,
                            record = ?record,
                            "take result matched no logged bucket"
                        );
                    }
                }
                Ok(Some(record))
            }
        }
    }

    /// Pure pass-through; reads do not change store state, so the log is
    /// untouched.
    pub fn read(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>> {
        self.remote.read(template, txn, timeout_ms)
    }

    pub fn read_if_exists(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>> {
        self.remote.read_if_exists(template, txn, timeout_ms)
    }

    /// Register `sink` for events matching `template`.
    ///
    /// The sink is wrapped in a pass-through listener that is registered at
    /// the store and retained in the event list, so each later write can
    /// record the deliveries it implies.
    pub fn notify(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        sink: Arc<dyn EventSink>,
        lease_duration_ms: i64,
        handback: Vec<u8>,
    ) -> Result<EventRegistration> {
        let listener = PassThroughListener::new(template, sink)?;
        let registration = self.remote.notify(
            template,
            txn,
            Arc::new(listener.clone()),
            lease_duration_ms,
            handback,
        )?;
        tracing::debug!(
            auditor = %self.config.name,
            template = %listener.template_type(),
            registration = registration.registration_id,
            "registered pass-through listener"
        );
        self.listeners.lock().push(listener);
        Ok(registration)
    }

    /// Opaque-form hint pass-through; the mirror does not track snapshots.
    pub fn snapshot(&self, record: &dyn Record) -> Result<Arc<dyn Record>> {
        self.remote.snapshot(record)
    }

    /// Drain the store through a caller-supplied take strategy, then
    /// summarize.
    ///
    /// `take_next` is invoked against this auditor (so every removal is
    /// audited) until it yields no record.
    pub fn empty_space<F>(&self, template: &dyn Record, mut take_next: F) -> Result<AuditSummary>
    where
        F: FnMut(&Auditor, &dyn Record) -> Result<Option<Arc<dyn Record>>>,
    {
        while take_next(self, template)?.is_some() {}
        Ok(self.summarize())
    }

    /// Records of every logged holder whose lease expiration is at or
    /// after `now - threshold_ms`; negative threshold returns everything.
    pub fn logged_records(&self, threshold_ms: i64) -> Vec<Arc<dyn Record>> {
        self.log.logged_records(threshold_ms)
    }

    /// Read-only divergence report. Never touches the remote store.
    pub fn summarize(&self) -> AuditSummary {
        let counters = self.counters.snapshot();
        let log = self.log.summarize();
        let event_failures = {
            let listeners = self.listeners.lock();
            listeners
                .iter()
                .filter_map(|l| l.errors(self.config.clear_event_errors_on_summarize))
                .collect()
        };
        AuditSummary::assemble(counters, log, event_failures)
    }

    /// Point-in-time copy of the operation counters.
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Diagnostic traversal logging every held record.
    pub fn dump_log(&self) {
        let counters = self.counters.snapshot();
        tracing::info!(
            auditor = %self.config.name,
            writes = counters.successful_writes,
            takes = counters.successful_takes,
            bad_takes = counters.bad_takes,
            removal_failures = counters.log_removal_failures,
            "audit counters"
        );
        self.log.dump();
    }

    fn expect_all(&self, record: &dyn Record, write_in_doubt: bool) {
        let listeners = self.listeners.lock();
        for listener in listeners.iter() {
            listener.expect(record, write_in_doubt);
        }
    }
}
