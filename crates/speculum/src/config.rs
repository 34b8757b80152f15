//! Auditor configuration.

/// Knobs for an [`Auditor`](crate::auditor::Auditor).
#[derive(Clone, Debug)]
pub struct AuditorConfig {
    /// Name used in log output, useful when several mirrors run in one
    /// process.
    pub name: String,

    /// Reset each listener's event counters when `summarize` collects its
    /// discrepancy report. Off by default: summaries are reads.
    pub clear_event_errors_on_summarize: bool,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            name: "speculum".to_string(),
            clear_event_errors_on_summarize: false,
        }
    }
}

impl AuditorConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
