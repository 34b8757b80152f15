//! Event pass-through listeners
//!
//! A notify registration wraps the caller's sink in a
//! [`PassThroughListener`]. Deliveries from the store are forwarded
//! unchanged while being counted; every audited write additionally tells
//! each registered listener to *expect* a delivery when the written record
//! matches its template. Comparing the two counts later surfaces dropped
//! or spurious deliveries.
//!
//! Expectation is advisory only. Deliveries race with local bookkeeping,
//! so a report produced mid-traffic can show a transient mismatch; the
//! in-doubt slop bounds how many deliveries a write with unknown outcome
//! may legitimately add.
//!
//! Known limitation: listeners stay registered until the auditor is
//! dropped even though the store-side notify lease may have expired; an
//! expired registration simply stops receiving and will read as a
//! discrepancy, not get pruned.

use serde::Serialize;
use speculum_core::error::{Result, SpeculumError};
use speculum_core::record::{fields_match_template, Field, Record};
use speculum_core::remote::{EventSink, SpaceEvent};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Expected-vs-received mismatch for one listener.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EventDiscrepancy {
    pub template_type: String,

    /// Deliveries implied by successful audited writes.
    pub expected: u64,

    /// Additional deliveries an in-doubt write may or may not produce.
    pub expected_in_doubt: u64,

    /// Deliveries actually received from the store.
    pub received: u64,

    /// Deliveries the wrapped sink rejected.
    pub delivery_failures: u64,
}

impl fmt::Display for EventDiscrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {} (+{} in doubt), received {}, {} delivery failures",
            self.template_type,
            self.expected,
            self.expected_in_doubt,
            self.received,
            self.delivery_failures
        )
    }
}

struct ListenerInner {
    sink: Arc<dyn EventSink>,
    template_type: String,
    template_fields: Vec<(String, Field)>,
    expected: AtomicU64,
    expected_in_doubt: AtomicU64,
    received: AtomicU64,
    delivery_failures: AtomicU64,
}

/// Caller sink plus the template it was registered with and the event
/// counters. Clones share state; the auditor keeps one clone in its event
/// list and registers another with the remote store.
#[derive(Clone)]
pub struct PassThroughListener {
    inner: Arc<ListenerInner>,
}

impl std::fmt::Debug for PassThroughListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassThroughListener")
            .field("template_type", &self.inner.template_type)
            .field("template_fields", &self.inner.template_fields)
            .finish_non_exhaustive()
    }
}

impl PassThroughListener {
    /// Introspects the template once, up front, so that [`expect`] can
    /// never fail later. A malformed template surfaces here as
    /// `InvalidTemplate`.
    ///
    /// [`expect`]: PassThroughListener::expect
    pub fn new(template: &dyn Record, sink: Arc<dyn EventSink>) -> Result<Self> {
        let template_fields = template
            .matchable_fields()
            .map_err(|e| SpeculumError::InvalidTemplate(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(ListenerInner {
                sink,
                template_type: template.type_name().to_string(),
                template_fields,
                expected: AtomicU64::new(0),
                expected_in_doubt: AtomicU64::new(0),
                received: AtomicU64::new(0),
                delivery_failures: AtomicU64::new(0),
            }),
        })
    }

    /// Advisory bookkeeping for an audited write: if the record matches
    /// this listener's template, one more delivery is expected (or may
    /// arrive, for an in-doubt write). Never fails; a record that cannot
    /// be introspected is skipped.
    pub fn expect(&self, record: &dyn Record, write_in_doubt: bool) {
        if record.type_name() != self.inner.template_type {
            return;
        }
        let fields = match record.matchable_fields() {
            Ok(fields) => fields,
            Err(e) => {
                tracing::debug!(error = %e, "skipping expectation for uninspectable record");
                return;
            }
        };
        if !fields_match_template(&self.inner.template_fields, &fields) {
            return;
        }
        if write_in_doubt {
            self.inner.expected_in_doubt.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.expected.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Accumulated discrepancy report, or `None` when the received count
    /// sits inside `[expected, expected + in-doubt]` and every delivery
    /// reached the sink. With `clear` set the counters reset after the
    /// report is taken.
    pub fn errors(&self, clear: bool) -> Option<EventDiscrepancy> {
        let expected = self.inner.expected.load(Ordering::Relaxed);
        let in_doubt = self.inner.expected_in_doubt.load(Ordering::Relaxed);
        let received = self.inner.received.load(Ordering::Relaxed);
        let delivery_failures = self.inner.delivery_failures.load(Ordering::Relaxed);

        if clear {
            self.inner.expected.store(0, Ordering::Relaxed);
            self.inner.expected_in_doubt.store(0, Ordering::Relaxed);
            self.inner.received.store(0, Ordering::Relaxed);
            self.inner.delivery_failures.store(0, Ordering::Relaxed);
        }

        let in_range = received >= expected && received <= expected + in_doubt;
        if in_range && delivery_failures == 0 {
            return None;
        }
        Some(EventDiscrepancy {
            template_type: self.inner.template_type.clone(),
            expected,
            expected_in_doubt: in_doubt,
            received,
            delivery_failures,
        })
    }

    pub fn template_type(&self) -> &str {
        &self.inner.template_type
    }
}

impl EventSink for PassThroughListener {
    fn notify(&self, event: &SpaceEvent) -> Result<()> {
        self.inner.received.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.inner.sink.notify(event) {
            self.inner.delivery_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                template = %self.inner.template_type,
                sequence = event.sequence,
                error = %e,
                "wrapped sink rejected event delivery"
            );
            return Err(e);
        }
        Ok(())
    }
}
