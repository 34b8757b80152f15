//! Instrumented lease handles
//!
//! Every logged write holds an [`InstrumentedLease`], a 1:1 wrapper over
//! the lease the remote store granted. Accessors pass through unchanged;
//! `cancel` additionally removes the corresponding holder from the shadow
//! log, by exact lease identity, once the remote cancellation succeeds.
//!
//! The constrained-capability split is decided once at wrap time from the
//! [`RemoteLeaseHandle`] variant the store returned, not re-probed per
//! call. A write whose remote call failed gets the lease-less
//! [`LeaseKind::InDoubt`] variant: there is nothing to renew or cancel, and
//! its expiration is unobservable.

use chrono::{DateTime, Utc};
use speculum_core::error::{Result, SpeculumError};
use speculum_core::record::StructuralKey;
use speculum_core::remote::{ConstrainedRemoteLease, RemoteLease, RemoteLeaseHandle, SerialFormat};
use speculum_core::shadow_log::{HolderLease, ShadowLog};
use speculum_core::types::LeaseId;
use std::sync::Arc;

/// Capability variant, fixed at construction.
pub enum LeaseKind {
    Plain(Box<dyn RemoteLease>),
    Constrained(Box<dyn ConstrainedRemoteLease>),

    /// No remote lease exists: the write that created the holder failed and
    /// its effect on the store is unknown.
    InDoubt,
}

struct LeaseInner {
    id: LeaseId,
    kind: LeaseKind,
    key: StructuralKey,
    log: Arc<ShadowLog>,
}

/// Lease handle returned to auditor callers. Cheap to clone; clones share
/// the underlying remote lease.
#[derive(Clone)]
pub struct InstrumentedLease {
    inner: Arc<LeaseInner>,
}

impl std::fmt::Debug for InstrumentedLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedLease")
            .field("id", &self.inner.id)
            .field("key", &self.inner.key)
            .finish_non_exhaustive()
    }
}

impl InstrumentedLease {
    /// Wrap the lease a successful remote write returned.
    pub fn wrap(handle: RemoteLeaseHandle, key: StructuralKey, log: Arc<ShadowLog>) -> Self {
        let kind = match handle {
            RemoteLeaseHandle::Plain(l) => LeaseKind::Plain(l),
            RemoteLeaseHandle::Constrained(l) => LeaseKind::Constrained(l),
        };
        Self {
            inner: Arc::new(LeaseInner {
                id: LeaseId::next(),
                kind,
                key,
                log,
            }),
        }
    }

    /// Lease-less handle for a write whose remote call failed.
    pub fn in_doubt(key: StructuralKey, log: Arc<ShadowLog>) -> Self {
        Self {
            inner: Arc::new(LeaseInner {
                id: LeaseId::next(),
                kind: LeaseKind::InDoubt,
                key,
                log,
            }),
        }
    }

    pub fn id(&self) -> LeaseId {
        self.inner.id
    }

    pub fn is_in_doubt(&self) -> bool {
        matches!(self.inner.kind, LeaseKind::InDoubt)
    }

    pub fn is_constrained(&self) -> bool {
        matches!(self.inner.kind, LeaseKind::Constrained(_))
    }

    fn remote(&self) -> Option<&dyn RemoteLease> {
        match &self.inner.kind {
            LeaseKind::Plain(l) => Some(l.as_ref()),
            LeaseKind::Constrained(l) => Some(l.as_ref() as &dyn RemoteLease),
            LeaseKind::InDoubt => None,
        }
    }

    fn remote_or_err(&self, op: &str) -> Result<&dyn RemoteLease> {
        self.remote().ok_or_else(|| {
            SpeculumError::Lease(format!("cannot {op} an in-doubt lease-less holder"))
        })
    }

    /// Current expiration at the store, unobservable for in-doubt holders.
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.remote().map(|l| l.expiration())
    }

    /// Pass-through renewal.
    pub fn renew(&self, duration_ms: i64) -> Result<()> {
        self.remote_or_err("renew")?.renew(duration_ms)
    }

    /// Cancel the remote lease, then drop the matching holder from the
    /// shadow log.
    ///
    /// Remote failure propagates as-is with no log mutation: the entry may
    /// well still be held by the store. Removal targets this lease's exact
    /// identity, so structurally-equal duplicates are untouched and no
    /// ambiguity flags are set.
    pub fn cancel(&self) -> Result<()> {
        self.remote_or_err("cancel")?.cancel()?;
        let removed = self
            .inner
            .log
            .remove_by_lease(&self.inner.key, self.inner.id);
        if !removed {
            // Already taken or cancelled; nothing left to reconcile.
            tracing::debug!(lease = %self.inner.id, key = %self.inner.key,
                "cancelled lease had no logged holder");
        }
        Ok(())
    }

    pub fn serial_format(&self) -> Result<SerialFormat> {
        Ok(self.remote_or_err("inspect")?.serial_format())
    }

    pub fn set_serial_format(&self, format: SerialFormat) -> Result<()> {
        self.remote_or_err("reformat")?.set_serial_format(format);
        Ok(())
    }

    /// Whether the two underlying remote leases can be batch-renewed
    /// together. In-doubt handles never batch.
    pub fn can_batch(&self, other: &InstrumentedLease) -> bool {
        match (self.remote(), other.remote()) {
            (Some(a), Some(b)) => a.can_batch(b),
            _ => false,
        }
    }

    /// Constraint descriptors, present only for the constrained variant.
    pub fn constraints(&self) -> Option<Vec<String>> {
        match &self.inner.kind {
            LeaseKind::Constrained(l) => Some(l.constraints()),
            _ => None,
        }
    }
}

impl HolderLease for InstrumentedLease {
    fn id(&self) -> LeaseId {
        self.inner.id
    }

    fn expiration(&self) -> Option<DateTime<Utc>> {
        InstrumentedLease::expiration(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use speculum_core::record::{Field, Record};
    use speculum_core::shadow_log::EntryHolder;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug)]
    struct Item(&'static str);

    impl Record for Item {
        fn type_name(&self) -> &str {
            "Item"
        }

        fn matchable_fields(&self) -> Result<Vec<(String, Field)>> {
            Ok(vec![("name".to_string(), Field::Value(self.0.into()))])
        }
    }

    struct FakeRemoteLease {
        expiration: DateTime<Utc>,
        cancelled: Arc<AtomicBool>,
        fail_cancel: bool,
    }

    impl RemoteLease for FakeRemoteLease {
        fn expiration(&self) -> DateTime<Utc> {
            self.expiration
        }

        fn renew(&self, _duration_ms: i64) -> Result<()> {
            Ok(())
        }

        fn cancel(&self) -> Result<()> {
            if self.fail_cancel {
                return Err(SpeculumError::Remote("cancel refused".into()));
            }
            self.cancelled.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn serial_format(&self) -> SerialFormat {
            SerialFormat::Duration
        }

        fn set_serial_format(&self, _format: SerialFormat) {}

        fn can_batch(&self, _other: &dyn RemoteLease) -> bool {
            true
        }
    }

    struct FakeConstrainedLease(FakeRemoteLease);

    impl RemoteLease for FakeConstrainedLease {
        fn expiration(&self) -> DateTime<Utc> {
            self.0.expiration()
        }
        fn renew(&self, duration_ms: i64) -> Result<()> {
            self.0.renew(duration_ms)
        }
        fn cancel(&self) -> Result<()> {
            self.0.cancel()
        }
        fn serial_format(&self) -> SerialFormat {
            self.0.serial_format()
        }
        fn set_serial_format(&self, format: SerialFormat) {
            self.0.set_serial_format(format)
        }
        fn can_batch(&self, other: &dyn RemoteLease) -> bool {
            self.0.can_batch(other)
        }
    }

    impl ConstrainedRemoteLease for FakeConstrainedLease {
        fn constraints(&self) -> Vec<String> {
            vec!["integrity".to_string()]
        }
    }

    fn wrapped(fail_cancel: bool) -> (InstrumentedLease, Arc<ShadowLog>, Arc<AtomicBool>) {
        let log = Arc::new(ShadowLog::new());
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = RemoteLeaseHandle::Plain(Box::new(FakeRemoteLease {
            expiration: Utc::now() + Duration::milliseconds(10_000),
            cancelled: Arc::clone(&cancelled),
            fail_cancel,
        }));
        let key = StructuralKey::of(&Item("a")).unwrap();
        let lease = InstrumentedLease::wrap(handle, key, Arc::clone(&log));
        log.insert(EntryHolder::new(
            Arc::new(Item("a")),
            Arc::new(lease.clone()),
            false,
        ))
        .unwrap();
        (lease, log, cancelled)
    }

    #[test]
    fn cancel_removes_exactly_this_holder() {
        let (lease, log, cancelled) = wrapped(false);
        assert_eq!(log.len(), 1);
        lease.cancel().unwrap();
        assert!(cancelled.load(Ordering::SeqCst));
        assert!(log.is_empty());
    }

    #[test]
    fn failed_remote_cancel_leaves_log_untouched() {
        let (lease, log, cancelled) = wrapped(true);
        let err = lease.cancel().unwrap_err();
        assert!(err.is_remote());
        assert!(!cancelled.load(Ordering::SeqCst));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn in_doubt_lease_has_no_remote_surface() {
        let log = Arc::new(ShadowLog::new());
        let key = StructuralKey::of(&Item("a")).unwrap();
        let lease = InstrumentedLease::in_doubt(key, log);

        assert!(lease.is_in_doubt());
        assert_eq!(lease.expiration(), None);
        assert!(matches!(
            lease.renew(1_000),
            Err(SpeculumError::Lease(_))
        ));
        assert!(matches!(lease.cancel(), Err(SpeculumError::Lease(_))));
        assert_eq!(lease.constraints(), None);
    }

    #[test]
    fn constrained_variant_selected_at_wrap_time() {
        let log = Arc::new(ShadowLog::new());
        let key = StructuralKey::of(&Item("a")).unwrap();
        let handle = RemoteLeaseHandle::Constrained(Box::new(FakeConstrainedLease(
            FakeRemoteLease {
                expiration: Utc::now(),
                cancelled: Arc::new(AtomicBool::new(false)),
                fail_cancel: false,
            },
        )));
        let lease = InstrumentedLease::wrap(handle, key, log);

        assert!(lease.is_constrained());
        assert_eq!(lease.constraints(), Some(vec!["integrity".to_string()]));
        assert_eq!(lease.serial_format().unwrap(), SerialFormat::Duration);
    }

    #[test]
    fn in_doubt_never_batches() {
        let (plain, _log, _) = wrapped(false);
        let log = Arc::new(ShadowLog::new());
        let key = StructuralKey::of(&Item("b")).unwrap();
        let in_doubt = InstrumentedLease::in_doubt(key, log);

        assert!(!plain.can_batch(&in_doubt));
        assert!(!in_doubt.can_batch(&plain));
        assert!(plain.can_batch(&plain.clone()));
    }
}
