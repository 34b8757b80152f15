//! Optional metrics instrumentation.
//!
//! When the `observe` feature is enabled, audited operations emit counters
//! and gauges via the [`metrics`] crate; a downstream application must
//! install a recorder to collect them. Without the feature every function
//! here is a zero-cost no-op.

/// Record a write attempt.
///
/// - `speculum.write.total` – counter with `outcome` label (`ok` / `in_doubt`)
#[inline]
pub fn record_write(success: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if success { "ok" } else { "in_doubt" };
        metrics::counter!("speculum.write.total", "outcome" => outcome).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = success;
    }
}

/// Outcome of a take attempt, for [`record_take`].
#[derive(Clone, Copy, Debug)]
pub enum TakeOutcome {
    Taken,
    NoMatch,
    RemoteFailure,
}

/// Record a take attempt.
///
/// - `speculum.take.total` – counter with `outcome` label (`ok` / `miss` / `fail`)
#[inline]
pub fn record_take(outcome: TakeOutcome) {
    #[cfg(feature = "observe")]
    {
        let outcome = match outcome {
            TakeOutcome::Taken => "ok",
            TakeOutcome::NoMatch => "miss",
            TakeOutcome::RemoteFailure => "fail",
        };
        metrics::counter!("speculum.take.total", "outcome" => outcome).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = outcome;
    }
}

/// Record a take that succeeded remotely but matched no local bucket.
///
/// - `speculum.log.removal_failures_total` – counter
#[inline]
pub fn record_removal_failure() {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("speculum.log.removal_failures_total").increment(1);
    }
}

/// Set the current shadow-log size gauge.
///
/// - `speculum.log.entries` – gauge
#[inline]
pub fn set_log_size(size: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::gauge!("speculum.log.entries").set(size as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = size;
    }
}
