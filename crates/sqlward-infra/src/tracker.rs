use std::sync::atomic::{AtomicU64, Ordering};

/// Counts connections opened by the pool and returned to it.
///
/// Wired into the pool's `after_connect` / `after_release` hooks, so it sees
/// every physical connection and every check-in. Used by tests and
/// diagnostics to spot leaked sessions.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    connects: AtomicU64,
    releases: AtomicU64,
}

impl ConnectionTracker {
    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    /// Physical connections opened so far.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Times a checked-out connection went back to the pool.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.connects.store(0, Ordering::Relaxed);
        self.releases.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_clear() {
        let tracker = ConnectionTracker::default();
        tracker.record_connect();
        tracker.record_release();
        tracker.record_release();
        assert_eq!(tracker.connects(), 1);
        assert_eq!(tracker.releases(), 2);

        tracker.clear();
        assert_eq!(tracker.connects(), 0);
        assert_eq!(tracker.releases(), 0);
    }
}
