//! Page I/O counters for an index file.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts page reads, writes and appends issued against one file.
///
/// All fields are atomic so the counters can be bumped through `&self`.
/// `Ordering::Relaxed` is enough: each counter is independent and only
/// needs atomicity.
///
/// # Example
/// ```
/// use ixdb::storage::IoStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = IoStats::new();
/// stats.pages_read.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().pages_read, 1);
/// ```
#[derive(Debug)]
pub struct IoStats {
    /// Number of pages read from the file.
    pub pages_read: AtomicU64,

    /// Number of existing pages overwritten.
    pub pages_written: AtomicU64,

    /// Number of pages appended to the end of the file.
    pub pages_appended: AtomicU64,
}

impl IoStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self {
            pages_read: AtomicU64::new(0),
            pages_written: AtomicU64::new(0),
            pages_appended: AtomicU64::new(0),
        }
    }

    /// Get a snapshot of current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            pages_appended: self.pages_appended.load(Ordering::Relaxed),
        }
    }
}

impl Default for IoStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time copy of [`IoStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub pages_read: u64,
    pub pages_written: u64,
    pub pages_appended: u64,
}

impl StatsSnapshot {
    /// Total page operations of any kind.
    pub fn total(&self) -> u64 {
        self.pages_read + self.pages_written + self.pages_appended
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IoStats {{ reads: {}, writes: {}, appends: {} }}",
            self.pages_read, self.pages_written, self.pages_appended
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = IoStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = IoStats::new();
        stats.pages_read.fetch_add(7, Ordering::Relaxed);
        stats.pages_written.fetch_add(3, Ordering::Relaxed);
        stats.pages_appended.fetch_add(2, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.pages_read, 7);
        assert_eq!(snapshot.pages_written, 3);
        assert_eq!(snapshot.pages_appended, 2);
        assert_eq!(snapshot.total(), 12);
    }

    #[test]
    fn test_stats_display() {
        let snapshot = StatsSnapshot {
            pages_read: 80,
            pages_written: 20,
            pages_appended: 5,
        };

        let display = format!("{}", snapshot);

        assert!(display.contains("reads: 80"));
        assert!(display.contains("writes: 20"));
        assert!(display.contains("appends: 5"));
    }
}
