//! Run metrics for translation requests.
//!
//! One `TranslationMetrics` is created per run and shared by `Arc` between
//! the documents being translated.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Number of requests sent to the backend
    api_calls: AtomicUsize,

    /// Number of requests that failed at the transport or API level
    api_failures: AtomicUsize,

    /// Number of replies rejected by validation
    rejected_replies: AtomicUsize,

    /// Number of entries whose translation was applied
    entries_translated: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_failure(&self) {
        self.api_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_reply(&self) {
        self.rejected_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entries_translated(&self, count: usize) {
        self.entries_translated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::Relaxed)
    }

    pub fn api_failures(&self) -> usize {
        self.api_failures.load(Ordering::Relaxed)
    }

    pub fn rejected_replies(&self) -> usize {
        self.rejected_replies.load(Ordering::Relaxed)
    }

    pub fn entries_translated(&self) -> usize {
        self.entries_translated.load(Ordering::Relaxed)
    }

    /// Snapshot of the counters.
    pub fn report(&self) -> MetricsReport {
        let calls = self.api_calls();
        let failures = self.api_failures();
        let rejected = self.rejected_replies();
        let successful = calls.saturating_sub(failures + rejected);
        let success_rate = if calls > 0 {
            (successful as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            api_calls: calls,
            api_failures: failures,
            rejected_replies: rejected,
            entries_translated: self.entries_translated(),
            success_rate,
        }
    }
}

/// Translation metrics report.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub api_calls: usize,
    pub api_failures: usize,
    pub rejected_replies: usize,
    pub entries_translated: usize,
    /// Share of backend calls whose reply was applied (0-100)
    pub success_rate: f64,
}

impl MetricsReport {
    /// One-line summary for the end-of-run log.
    pub fn summary(&self) -> String {
        format!(
            "{} requests ({} failed, {} rejected replies, {:.1}% applied), {} entries translated",
            self.api_calls,
            self.api_failures,
            self.rejected_replies,
            self.success_rate,
            self.entries_translated
        )
    }
}
