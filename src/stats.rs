//! Conversion statistics for monitoring and logging.
//!
//! [`ConversionCounters`] is updated by the
//! [`Converter`](crate::Converter) as conversions finish;
//! [`ConversionStats`] is a point-in-time snapshot of it.
//!
//! # Example
//!
//! ```rust,ignore
//! let stats = converter.stats();
//! println!("{} of {} conversions came back empty", stats.empty, stats.conversions);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of conversion statistics at a point in time.
///
/// # Fields
///
/// | Field | Description |
/// |-------|-------------|
/// | `conversions` | Conversions started |
/// | `completed` | First attempt printed a full PDF |
/// | `partial` | First attempt failed after capturing bytes, which were returned |
/// | `retried` | First attempt failed with nothing captured |
/// | `empty` | No bytes returned, after a retry or an unrecoverable error |
///
/// # Example
///
/// ```rust
/// use html2pdf_service::ConversionStats;
///
/// let stats = ConversionStats {
///     conversions: 10,
///     completed: 7,
///     partial: 1,
///     retried: 2,
///     empty: 1,
/// };
///
/// assert_eq!(stats.recovered_by_retry(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ConversionStats {
    pub conversions: u64,
    pub completed: u64,
    pub partial: u64,
    pub retried: u64,
    pub empty: u64,
}

impl ConversionStats {
    /// Retries that produced bytes.
    #[inline]
    pub fn recovered_by_retry(&self) -> u64 {
        self.retried.saturating_sub(self.empty)
    }

    /// Conversions that returned no bytes, as a fraction of all started.
    pub fn empty_ratio(&self) -> f64 {
        if self.conversions == 0 {
            return 0.0;
        }
        self.empty as f64 / self.conversions as f64
    }
}

/// Live counters behind [`ConversionStats`].
#[derive(Debug, Default)]
pub(crate) struct ConversionCounters {
    conversions: AtomicU64,
    completed: AtomicU64,
    partial: AtomicU64,
    retried: AtomicU64,
    empty: AtomicU64,
}

impl ConversionCounters {
    pub(crate) fn started(&self) {
        self.conversions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn partial(&self) {
        self.partial.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn empty(&self) {
        self.empty.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ConversionStats {
        ConversionStats {
            conversions: self.conversions.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            partial: self.partial.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
        }
    }
}
