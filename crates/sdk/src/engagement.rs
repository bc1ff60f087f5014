//! Engagement accumulation
//!
//! Collects scroll and activity signals between heartbeats. Time
//! between two activity signals counts as engaged only when they are
//! close together; long gaps mean the visitor wandered off.

use std::time::Instant;

use beacon_core::context::EngagementMetrics;

/// Reporting interval, in milliseconds.
pub const HEARTBEAT_INTERVAL_MS: u64 = 30_000;

/// Two activity signals within this window count as engaged time, in
/// seconds.
const ENGAGED_WINDOW_SECS: u64 = 3;

/// Accumulates engagement between heartbeats.
#[derive(Debug)]
pub struct EngagementTracker {
    engaged_time: u64,
    max_scroll_depth: f64,
    current_scroll_position: f64,
    did_scroll_up: bool,
    last_event: Option<Instant>,
    interval_start: Instant,
}

impl EngagementTracker {
    /// Start a tracker at the given scroll position.
    #[must_use]
    pub fn new(initial_scroll: f64) -> Self {
        let scroll = initial_scroll.max(0.0);
        Self {
            engaged_time: 0,
            max_scroll_depth: scroll,
            current_scroll_position: scroll,
            did_scroll_up: false,
            last_event: None,
            interval_start: Instant::now(),
        }
    }

    /// Record one activity signal (scroll, pointer, key).
    pub fn record_activity(&mut self, scroll_position: f64, document_height: f64) {
        self.record_activity_at(scroll_position, document_height, Instant::now());
    }

    fn record_activity_at(&mut self, scroll_position: f64, document_height: f64, now: Instant) {
        let current = scroll_position.max(0.0);

        if current > self.current_scroll_position {
            self.max_scroll_depth = current.min(document_height.max(0.0));
        }
        if current < self.current_scroll_position {
            self.did_scroll_up = true;
        }
        self.current_scroll_position = current;

        if let Some(last) = self.last_event {
            let gap = now.saturating_duration_since(last).as_secs();
            if gap <= ENGAGED_WINDOW_SECS {
                self.engaged_time += gap;
            }
        }
        self.last_event = Some(now);
    }

    /// The metrics for the interval so far.
    #[must_use]
    pub fn snapshot(&self) -> EngagementMetrics {
        EngagementMetrics {
            total_time: Some(self.interval_start.elapsed().as_secs()),
            engaged_time: self.engaged_time,
            interval: HEARTBEAT_INTERVAL_MS / 1000,
            max_scroll_depth: self.max_scroll_depth,
            current_scroll_position: self.current_scroll_position,
            did_scroll_up_during_interval: self.did_scroll_up,
        }
    }

    /// Start a new interval at the given scroll position.
    pub fn reset(&mut self, scroll_position: f64) {
        *self = Self::new(scroll_position);
        self.last_event = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_initial_snapshot() {
        let tracker = EngagementTracker::new(120.0);
        let metrics = tracker.snapshot();
        assert_eq!(metrics.engaged_time, 0);
        assert_eq!(metrics.interval, 30);
        assert_eq!(metrics.max_scroll_depth, 120.0);
        assert_eq!(metrics.current_scroll_position, 120.0);
        assert!(!metrics.did_scroll_up_during_interval);
    }

    #[test]
    fn test_negative_scroll_clamped() {
        let tracker = EngagementTracker::new(-40.0);
        assert_eq!(tracker.snapshot().current_scroll_position, 0.0);
    }

    #[test]
    fn test_close_signals_count_as_engaged() {
        let mut tracker = EngagementTracker::new(0.0);
        let start = Instant::now();
        tracker.record_activity_at(10.0, 5000.0, start);
        tracker.record_activity_at(20.0, 5000.0, start + Duration::from_secs(2));
        tracker.record_activity_at(30.0, 5000.0, start + Duration::from_secs(4));
        assert_eq!(tracker.snapshot().engaged_time, 4);
    }

    #[test]
    fn test_long_gap_not_engaged() {
        let mut tracker = EngagementTracker::new(0.0);
        let start = Instant::now();
        tracker.record_activity_at(10.0, 5000.0, start);
        tracker.record_activity_at(20.0, 5000.0, start + Duration::from_secs(10));
        assert_eq!(tracker.snapshot().engaged_time, 0);
    }

    #[test]
    fn test_scroll_depth_capped_at_document_height() {
        let mut tracker = EngagementTracker::new(0.0);
        tracker.record_activity(9000.0, 5000.0);
        assert_eq!(tracker.snapshot().max_scroll_depth, 5000.0);
    }

    #[test]
    fn test_scroll_up_flagged() {
        let mut tracker = EngagementTracker::new(100.0);
        tracker.record_activity(50.0, 5000.0);
        let metrics = tracker.snapshot();
        assert!(metrics.did_scroll_up_during_interval);
        assert_eq!(metrics.current_scroll_position, 50.0);
        // scrolling up never raises the max depth
        assert_eq!(metrics.max_scroll_depth, 100.0);
    }

    #[test]
    fn test_reset_clears_interval() {
        let mut tracker = EngagementTracker::new(0.0);
        let start = Instant::now();
        tracker.record_activity_at(10.0, 5000.0, start);
        tracker.record_activity_at(400.0, 5000.0, start + Duration::from_secs(1));
        tracker.reset(200.0);

        let metrics = tracker.snapshot();
        assert_eq!(metrics.engaged_time, 0);
        assert_eq!(metrics.max_scroll_depth, 200.0);
        assert!(!metrics.did_scroll_up_during_interval);
    }
}
