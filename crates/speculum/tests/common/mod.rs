//! Shared test fixtures: an in-memory tuple space with failure injection.
#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use speculum::{
    fields_match_template, template_matches, EventRegistration, EventSink, Field, Record,
    RemoteLease, RemoteLeaseHandle, RemoteSpace, Result, SerialFormat, SpaceEvent, SpeculumError,
    Transaction,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// The record type driven through the auditor in these tests. `None`
/// fields are wildcards, so the same type doubles as its own template.
#[derive(Debug, Clone)]
pub struct Stock {
    pub symbol: Option<String>,
    pub shares: Option<i64>,
}

impl Record for Stock {
    fn type_name(&self) -> &str {
        "Stock"
    }

    fn matchable_fields(&self) -> Result<Vec<(String, Field)>> {
        Ok(vec![
            (
                "symbol".to_string(),
                self.symbol
                    .clone()
                    .map_or(Field::Wildcard, |v| Field::Value(v.into())),
            ),
            (
                "shares".to_string(),
                self.shares
                    .map_or(Field::Wildcard, |v| Field::Value(v.into())),
            ),
        ])
    }
}

pub fn stock(symbol: &str, shares: i64) -> Arc<dyn Record> {
    Arc::new(Stock {
        symbol: Some(symbol.to_string()),
        shares: Some(shares),
    })
}

pub fn by_symbol(symbol: &str) -> Stock {
    Stock {
        symbol: Some(symbol.to_string()),
        shares: None,
    }
}

pub fn any_stock() -> Stock {
    Stock {
        symbol: None,
        shares: None,
    }
}

pub struct MockLease {
    expiration: Mutex<DateTime<Utc>>,
    format: Mutex<SerialFormat>,
    cancelled: AtomicBool,
}

impl MockLease {
    fn granted(duration_ms: i64) -> Self {
        Self {
            expiration: Mutex::new(Utc::now() + Duration::milliseconds(duration_ms)),
            format: Mutex::new(SerialFormat::Duration),
            cancelled: AtomicBool::new(false),
        }
    }
}

impl RemoteLease for MockLease {
    fn expiration(&self) -> DateTime<Utc> {
        *self.expiration.lock()
    }

    fn renew(&self, duration_ms: i64) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(SpeculumError::Remote("lease already cancelled".into()));
        }
        *self.expiration.lock() = Utc::now() + Duration::milliseconds(duration_ms);
        Ok(())
    }

    fn cancel(&self) -> Result<()> {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return Err(SpeculumError::Remote("lease already cancelled".into()));
        }
        Ok(())
    }

    fn serial_format(&self) -> SerialFormat {
        *self.format.lock()
    }

    fn set_serial_format(&self, format: SerialFormat) {
        *self.format.lock() = format;
    }

    fn can_batch(&self, _other: &dyn RemoteLease) -> bool {
        true
    }
}

struct SinkRegistration {
    id: u64,
    template_type: String,
    template_fields: Vec<(String, Field)>,
    sink: Arc<dyn EventSink>,
    handback: Vec<u8>,
    sequence: AtomicU64,
}

/// In-memory tuple space. Matching is wildcard-aware template matching
/// over the stored records; events are delivered synchronously from
/// `write`. One-shot failure injection for write and take.
#[derive(Default)]
pub struct MockSpace {
    entries: Mutex<Vec<Arc<dyn Record>>>,
    sinks: Mutex<Vec<SinkRegistration>>,
    fail_next_write: AtomicBool,
    fail_next_take: AtomicBool,
    fabricated_take: Mutex<Option<Arc<dyn Record>>>,
    next_registration_id: AtomicU64,
}

impl MockSpace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Next write fails after (not) storing anything.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Next take fails without removing anything.
    pub fn fail_next_take(&self) {
        self.fail_next_take.store(true, Ordering::SeqCst);
    }

    /// Next take returns `record` without consulting the stored entries,
    /// simulating a concurrent external client's entry.
    pub fn fabricate_take(&self, record: Arc<dyn Record>) {
        *self.fabricated_take.lock() = Some(record);
    }

    pub fn remaining(&self) -> usize {
        self.entries.lock().len()
    }

    fn find(&self, template: &dyn Record, remove: bool) -> Result<Option<Arc<dyn Record>>> {
        let mut entries = self.entries.lock();
        for (i, entry) in entries.iter().enumerate() {
            if template_matches(template, entry.as_ref())? {
                let found = Arc::clone(entry);
                if remove {
                    entries.remove(i);
                }
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn deliver(&self, record: &dyn Record) {
        let record_fields = match record.matchable_fields() {
            Ok(fields) => fields,
            Err(_) => return,
        };
        let sinks = self.sinks.lock();
        for reg in sinks.iter() {
            if reg.template_type == record.type_name()
                && fields_match_template(&reg.template_fields, &record_fields)
            {
                let sequence = reg.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = reg.sink.notify(&SpaceEvent {
                    registration_id: reg.id,
                    sequence,
                    handback: reg.handback.clone(),
                });
            }
        }
    }
}

/// Snapshot handle the mock returns: an opaque structural copy.
#[derive(Debug)]
struct SnapshotRecord {
    type_name: String,
    fields: Vec<(String, Field)>,
}

impl Record for SnapshotRecord {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn matchable_fields(&self) -> Result<Vec<(String, Field)>> {
        Ok(self.fields.clone())
    }
}

impl RemoteSpace for MockSpace {
    fn write(
        &self,
        record: Arc<dyn Record>,
        _txn: Option<&dyn Transaction>,
        lease_duration_ms: i64,
    ) -> Result<RemoteLeaseHandle> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(SpeculumError::Remote("injected write failure".into()));
        }
        self.entries.lock().push(Arc::clone(&record));
        self.deliver(record.as_ref());
        Ok(RemoteLeaseHandle::Plain(Box::new(MockLease::granted(
            lease_duration_ms,
        ))))
    }

    fn read(
        &self,
        template: &dyn Record,
        _txn: Option<&dyn Transaction>,
        _timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>> {
        self.find(template, false)
    }

    fn read_if_exists(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>> {
        self.read(template, txn, timeout_ms)
    }

    fn take(
        &self,
        template: &dyn Record,
        _txn: Option<&dyn Transaction>,
        _timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>> {
        if self.fail_next_take.swap(false, Ordering::SeqCst) {
            return Err(SpeculumError::Remote("injected take failure".into()));
        }
        if let Some(fabricated) = self.fabricated_take.lock().take() {
            return Ok(Some(fabricated));
        }
        self.find(template, true)
    }

    fn take_if_exists(
        &self,
        template: &dyn Record,
        txn: Option<&dyn Transaction>,
        timeout_ms: i64,
    ) -> Result<Option<Arc<dyn Record>>> {
        self.take(template, txn, timeout_ms)
    }

    fn notify(
        &self,
        template: &dyn Record,
        _txn: Option<&dyn Transaction>,
        sink: Arc<dyn EventSink>,
        _lease_duration_ms: i64,
        handback: Vec<u8>,
    ) -> Result<EventRegistration> {
        let id = self.next_registration_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sinks.lock().push(SinkRegistration {
            id,
            template_type: template.type_name().to_string(),
            template_fields: template.matchable_fields()?,
            sink,
            handback,
            sequence: AtomicU64::new(0),
        });
        Ok(EventRegistration {
            registration_id: id,
            starting_sequence: 0,
            lease_expiration: None,
        })
    }

    fn snapshot(&self, record: &dyn Record) -> Result<Arc<dyn Record>> {
        Ok(Arc::new(SnapshotRecord {
            type_name: record.type_name().to_string(),
            fields: record.matchable_fields()?,
        }))
    }
}

/// Sink collecting delivered events for assertions.
#[derive(Default)]
pub struct CollectingSink {
    pub events: Mutex<Vec<SpaceEvent>>,
}

impl EventSink for CollectingSink {
    fn notify(&self, event: &SpaceEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
