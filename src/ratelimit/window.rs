//! Per-client record of admitted request timestamps.

use std::collections::VecDeque;
use std::time::Duration;

/// Timestamps (milliseconds) of the requests a single client has had admitted.
///
/// Entries are appended in call order. Under concurrent callers whose `now`
/// values were read before taking the registry lock, that order may not be
/// sorted, so pruning scans the whole window instead of popping from the front.
#[derive(Debug, Clone, Default)]
pub struct ClientWindow {
    timestamps: VecDeque<u64>,
}

impl ClientWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every timestamp that is no longer inside the trailing window.
    ///
    /// A timestamp `t` survives iff `now - t < window_ms`. Timestamps ahead of
    /// `now` count as age zero.
    pub fn prune(&mut self, now_ms: u64, window_ms: u64) {
        self.timestamps.retain(|&t| is_live(t, now_ms, window_ms));
    }

    /// Number of timestamps that would survive a prune at `now_ms`, without
    /// modifying the window.
    pub fn live_count(&self, now_ms: u64, window_ms: u64) -> usize {
        self.timestamps
            .iter()
            .filter(|&&t| is_live(t, now_ms, window_ms))
            .count()
    }

    /// Record an admitted request.
    pub fn record(&mut self, now_ms: u64) {
        self.timestamps.push_back(now_ms);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Time until the oldest live timestamp leaves the window.
    ///
    /// Returns zero for an empty (or fully stale) window.
    pub fn reset_after(&self, now_ms: u64, window_ms: u64) -> Duration {
        self.timestamps
            .iter()
            .copied()
            .filter(|&t| is_live(t, now_ms, window_ms))
            .min()
            .map(|oldest| {
                Duration::from_millis(oldest.saturating_add(window_ms).saturating_sub(now_ms))
            })
            .unwrap_or(Duration::ZERO)
    }
}

fn is_live(t: u64, now_ms: u64, window_ms: u64) -> bool {
    now_ms.saturating_sub(t) < window_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_boundary_is_exclusive() {
        let mut window = ClientWindow::new();
        window.record(0);
        window.record(1);

        // now - 0 == window -> stale; now - 1 < window -> live
        window.prune(60_000, 60_000);
        assert_eq!(window.len(), 1);

        window.prune(60_001, 60_000);
        assert!(window.is_empty());
    }

    #[test]
    fn test_live_count_does_not_mutate() {
        let mut window = ClientWindow::new();
        window.record(0);
        window.record(50_000);

        assert_eq!(window.live_count(70_000, 60_000), 1);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_prune_handles_unsorted_entries() {
        let mut window = ClientWindow::new();
        window.record(50_000);
        window.record(1_000);
        window.record(55_000);

        // The stale entry sits between two live ones.
        window.prune(65_000, 60_000);
        assert_eq!(window.len(), 2);
        assert_eq!(window.live_count(65_000, 60_000), 2);
    }

    #[test]
    fn test_reset_after_near_clock_limit() {
        let mut window = ClientWindow::new();
        window.record(u64::MAX - 1);

        assert_eq!(window.reset_after(u64::MAX - 1, 60_000), Duration::from_millis(1));
    }

    #[test]
    fn test_future_timestamp_counts_as_live() {
        let mut window = ClientWindow::new();
        window.record(2_000);

        window.prune(1_000, 60_000);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_reset_after_uses_oldest_live_entry() {
        let mut window = ClientWindow::new();
        assert_eq!(window.reset_after(0, 60_000), Duration::ZERO);

        window.record(1_000);
        window.record(20_000);
        assert_eq!(window.reset_after(30_000, 60_000), Duration::from_millis(31_000));

        // Once 1_000 is stale the next oldest drives the reset.
        assert_eq!(window.reset_after(61_000, 60_000), Duration::from_millis(19_000));
    }
}
