//! Shared scroll sampling.
//!
//! One underlying listener is shared by every subscriber: it is installed
//! when the first subscription arrives and removed when the last one goes
//! away, so nothing keeps firing across page teardown. Raw scroll inputs
//! recorded between frames coalesce to a single sample published at the
//! next tick.

use std::collections::BTreeSet;

use crate::core::{ScrollDirection, ScrollOffset, ScrollSample, TimeMs};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScrollSubId(pub(crate) u64);

#[derive(Debug)]
pub struct ScrollTracker {
    subscribers: BTreeSet<ScrollSubId>,
    next_id: u64,
    listener_installed: bool,
    degraded: bool,
    last: Option<ScrollSample>,
    // Latest raw input since the previous tick, if any.
    pending: Option<(ScrollOffset, TimeMs)>,
}

impl ScrollTracker {
    pub fn new() -> Self {
        Self::with_mode(false)
    }

    /// Degraded mode: no scroll primitive available. The offset is pinned
    /// to zero and no samples are ever published.
    pub fn degraded() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(degraded: bool) -> Self {
        Self {
            subscribers: BTreeSet::new(),
            next_id: 0,
            listener_installed: false,
            degraded,
            last: None,
            pending: None,
        }
    }

    pub fn subscribe(&mut self) -> ScrollSubId {
        let id = ScrollSubId(self.next_id);
        self.next_id += 1;
        self.subscribers.insert(id);
        if !self.degraded && !self.listener_installed {
            self.listener_installed = true;
            tracing::debug!("scroll listener installed");
        }
        id
    }

    /// Idempotent: unknown ids are ignored. Removing the last subscriber
    /// tears down the shared listener and drops any pending sample.
    pub fn unsubscribe(&mut self, id: ScrollSubId) {
        if !self.subscribers.remove(&id) {
            return;
        }
        if self.subscribers.is_empty() && self.listener_installed {
            self.listener_installed = false;
            self.pending = None;
            tracing::debug!("scroll listener removed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn listener_installed(&self) -> bool {
        self.listener_installed
    }

    /// Latest published offset; zero before the first sample (and always,
    /// in degraded mode).
    pub fn current_offset(&self) -> ScrollOffset {
        self.last.map_or(ScrollOffset::ZERO, |s| s.offset)
    }

    /// Record a raw scroll input. Multiple calls within one frame collapse
    /// to the latest one; without a listener the input is dropped.
    pub fn record(&mut self, offset: ScrollOffset, at: TimeMs) {
        if !self.listener_installed {
            return;
        }
        self.pending = Some((offset, at));
    }

    /// Publish the coalesced sample for this frame, if a raw input arrived.
    pub fn publish(&mut self) -> Option<ScrollSample> {
        let (offset, at) = self.pending.take()?;
        let direction = match self.last {
            Some(prev) if offset > prev.offset => ScrollDirection::Down,
            Some(prev) if offset < prev.offset => ScrollDirection::Up,
            Some(_) => ScrollDirection::None,
            // First sample has nothing to compare against.
            None => ScrollDirection::None,
        };
        let sample = ScrollSample {
            offset,
            at,
            direction,
        };
        self.last = Some(sample);
        Some(sample)
    }
}

impl Default for ScrollTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(v: f64) -> ScrollOffset {
        ScrollOffset::new(v)
    }

    #[test]
    fn listener_shared_and_refcounted() {
        let mut tracker = ScrollTracker::new();
        assert!(!tracker.listener_installed());

        let a = tracker.subscribe();
        assert!(tracker.listener_installed());
        let b = tracker.subscribe();
        assert_eq!(tracker.subscriber_count(), 2);

        tracker.unsubscribe(a);
        assert!(tracker.listener_installed(), "one subscriber remains");
        tracker.unsubscribe(b);
        assert!(!tracker.listener_installed(), "last unsubscribe tears down");

        // Idempotent teardown.
        tracker.unsubscribe(b);
        assert_eq!(tracker.subscriber_count(), 0);
    }

    #[test]
    fn raw_inputs_coalesce_to_one_sample_per_frame() {
        let mut tracker = ScrollTracker::new();
        let _sub = tracker.subscribe();

        tracker.record(px(10.0), TimeMs(1.0));
        tracker.record(px(20.0), TimeMs(2.0));
        tracker.record(px(30.0), TimeMs(3.0));

        let sample = tracker.publish().unwrap();
        assert_eq!(sample.offset, px(30.0));
        assert!(tracker.publish().is_none(), "coalesced, nothing left");
    }

    #[test]
    fn direction_tracks_sign_of_delta() {
        let mut tracker = ScrollTracker::new();
        let _sub = tracker.subscribe();

        tracker.record(px(100.0), TimeMs(0.0));
        assert_eq!(tracker.publish().unwrap().direction, ScrollDirection::None);

        tracker.record(px(250.0), TimeMs(16.0));
        assert_eq!(tracker.publish().unwrap().direction, ScrollDirection::Down);

        tracker.record(px(50.0), TimeMs(32.0));
        assert_eq!(tracker.publish().unwrap().direction, ScrollDirection::Up);

        tracker.record(px(50.0), TimeMs(48.0));
        assert_eq!(tracker.publish().unwrap().direction, ScrollDirection::None);
    }

    #[test]
    fn current_offset_follows_published_samples() {
        let mut tracker = ScrollTracker::new();
        assert_eq!(tracker.current_offset(), ScrollOffset::ZERO);

        let _sub = tracker.subscribe();
        tracker.record(px(42.0), TimeMs(0.0));
        assert_eq!(
            tracker.current_offset(),
            ScrollOffset::ZERO,
            "unpublished input is not observable"
        );
        tracker.publish();
        assert_eq!(tracker.current_offset(), px(42.0));
    }

    #[test]
    fn inputs_without_listener_are_dropped() {
        let mut tracker = ScrollTracker::new();
        tracker.record(px(10.0), TimeMs(0.0));
        assert!(tracker.publish().is_none());
    }

    #[test]
    fn degraded_mode_pins_offset_to_zero() {
        let mut tracker = ScrollTracker::degraded();
        let _sub = tracker.subscribe();
        assert!(!tracker.listener_installed());

        tracker.record(px(500.0), TimeMs(0.0));
        assert!(tracker.publish().is_none());
        assert_eq!(tracker.current_offset(), ScrollOffset::ZERO);
    }

    #[test]
    fn unsubscribe_drops_pending_sample() {
        let mut tracker = ScrollTracker::new();
        let sub = tracker.subscribe();
        tracker.record(px(10.0), TimeMs(0.0));
        tracker.unsubscribe(sub);
        assert!(tracker.publish().is_none());
    }
}
