//! Visibility detection over host-supplied geometry.
//!
//! The observer is headless: the host pushes the viewport rectangle and
//! per-target rectangles whenever layout changes (scroll, resize, content
//! shift), and the observer emits a transition event whenever a target's
//! visible fraction crosses its threshold. No polling happens and nothing
//! runs while no targets are registered.

use std::collections::BTreeMap;

use kurbo::Rect;

use crate::core::{ElementHandle, Threshold};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct ObserveId(pub(crate) u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Unseen,
    Visible,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct VisibilityEvent {
    /// The observation that emitted this transition. One handle can carry
    /// several observations with different thresholds.
    pub id: ObserveId,
    pub handle: ElementHandle,
    pub visible: bool,
}

#[derive(Debug)]
struct Observed {
    handle: ElementHandle,
    threshold: Threshold,
    rect: Option<Rect>,
    state: Visibility,
}

/// Reports enter/exit transitions for registered targets.
///
/// In degraded mode (no visibility primitive in the host environment) every
/// registration immediately reports visible, so trigger-once consumers still
/// fire instead of hanging unstarted.
#[derive(Debug)]
pub struct ViewportObserver {
    viewport: Option<Rect>,
    targets: BTreeMap<ObserveId, Observed>,
    next_id: u64,
    degraded: bool,
    pending: Vec<VisibilityEvent>,
}

impl ViewportObserver {
    pub fn new() -> Self {
        Self::with_mode(false)
    }

    pub fn degraded() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(degraded: bool) -> Self {
        Self {
            viewport: None,
            targets: BTreeMap::new(),
            next_id: 0,
            degraded,
            pending: Vec::new(),
        }
    }

    /// Register a target. The threshold has already been validated by the
    /// caller; evaluation happens as soon as both rectangles are known.
    pub fn register(&mut self, handle: ElementHandle, threshold: Threshold) -> ObserveId {
        let id = ObserveId(self.next_id);
        self.next_id += 1;

        let mut observed = Observed {
            handle,
            threshold,
            rect: None,
            state: Visibility::Unseen,
        };

        if self.degraded {
            observed.state = Visibility::Visible;
            self.pending.push(VisibilityEvent {
                id,
                handle,
                visible: true,
            });
        }

        tracing::debug!(?id, handle = handle.0, "target registered");
        self.targets.insert(id, observed);
        self.evaluate_one(id);
        id
    }

    /// Idempotent: unregistering an unknown id is a no-op.
    pub fn unregister(&mut self, id: ObserveId) {
        if self.targets.remove(&id).is_some() {
            tracing::debug!(?id, "target unregistered");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn set_viewport(&mut self, rect: Rect) {
        self.viewport = Some(rect);
        self.evaluate_all();
    }

    /// Update the layout rectangle of every registration for `handle`.
    pub fn update_target(&mut self, handle: ElementHandle, rect: Rect) {
        let ids: Vec<ObserveId> = self
            .targets
            .iter()
            .filter(|(_, t)| t.handle == handle)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            if let Some(t) = self.targets.get_mut(&id) {
                t.rect = Some(rect);
            }
            self.evaluate_one(id);
        }
    }

    /// Drain transition events accumulated since the last call, in
    /// registration order within each geometry update.
    pub fn take_events(&mut self) -> Vec<VisibilityEvent> {
        std::mem::take(&mut self.pending)
    }

    fn evaluate_all(&mut self) {
        let ids: Vec<ObserveId> = self.targets.keys().copied().collect();
        for id in ids {
            self.evaluate_one(id);
        }
    }

    fn evaluate_one(&mut self, id: ObserveId) {
        if self.degraded {
            return;
        }
        let Some(viewport) = self.viewport else {
            return;
        };
        let Some(target) = self.targets.get_mut(&id) else {
            return;
        };
        let Some(rect) = target.rect else {
            return;
        };

        let visible = is_visible(rect, viewport, target.threshold);
        let state = if visible {
            Visibility::Visible
        } else {
            Visibility::Unseen
        };
        if state != target.state {
            target.state = state;
            self.pending.push(VisibilityEvent {
                id,
                handle: target.handle,
                visible,
            });
        }
    }
}

impl Default for ViewportObserver {
    fn default() -> Self {
        Self::new()
    }
}

/// Fraction of `target`'s area inside `viewport`, in [0, 1].
/// Zero-area targets have no meaningful fraction and report 0.
pub fn visible_fraction(target: Rect, viewport: Rect) -> f64 {
    let area = target.area().abs();
    if area == 0.0 {
        return 0.0;
    }
    let w = (target.x1.min(viewport.x1) - target.x0.max(viewport.x0)).max(0.0);
    let h = (target.y1.min(viewport.y1) - target.y0.max(viewport.y0)).max(0.0);
    ((w * h) / area).clamp(0.0, 1.0)
}

fn is_visible(target: Rect, viewport: Rect, threshold: Threshold) -> bool {
    // Note the degenerate case: threshold 0 is satisfied by any fraction,
    // so such targets are visible everywhere.
    visible_fraction(target, viewport) >= threshold.fraction()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Threshold;

    fn viewport() -> Rect {
        Rect::new(0.0, 0.0, 100.0, 100.0)
    }

    fn target_with_visible_height(h: f64) -> Rect {
        // A 100x100 target whose top `h` pixels overlap the viewport.
        Rect::new(0.0, 100.0 - h, 100.0, 200.0 - h)
    }

    #[test]
    fn fraction_matches_overlap() {
        assert_eq!(visible_fraction(target_with_visible_height(50.0), viewport()), 0.5);
        assert_eq!(visible_fraction(target_with_visible_height(0.0), viewport()), 0.0);
        assert_eq!(visible_fraction(viewport(), viewport()), 1.0);
    }

    #[test]
    fn visible_iff_fraction_reaches_threshold() {
        for (theta, frac, expect) in [
            (0.5, 0.5, true),
            (0.5, 0.49, false),
            (0.25, 0.3, true),
            (1.0, 1.0, true),
            (1.0, 0.99, false),
            (0.0, 0.01, true),
            (0.0, 0.0, true),
        ] {
            let t = Threshold::new(theta).unwrap();
            let rect = target_with_visible_height(frac * 100.0);
            assert_eq!(
                is_visible(rect, viewport(), t),
                expect,
                "theta={theta} frac={frac}"
            );
        }
    }

    #[test]
    fn emits_only_on_transition() {
        let mut obs = ViewportObserver::new();
        obs.set_viewport(viewport());
        let handle = ElementHandle(1);
        let id = obs.register(handle, Threshold::new(0.5).unwrap());

        obs.update_target(handle, target_with_visible_height(10.0));
        assert!(obs.take_events().is_empty(), "below threshold, still unseen");

        obs.update_target(handle, target_with_visible_height(60.0));
        assert_eq!(
            obs.take_events(),
            vec![VisibilityEvent {
                id,
                handle,
                visible: true
            }]
        );

        // Same state again: no event.
        obs.update_target(handle, target_with_visible_height(80.0));
        assert!(obs.take_events().is_empty());

        // Scrolled out: exit transition.
        obs.update_target(handle, target_with_visible_height(0.0));
        assert_eq!(
            obs.take_events(),
            vec![VisibilityEvent {
                id,
                handle,
                visible: false
            }]
        );
    }

    #[test]
    fn viewport_change_reevaluates() {
        let mut obs = ViewportObserver::new();
        obs.set_viewport(viewport());
        let handle = ElementHandle(7);
        obs.register(handle, Threshold::new(0.5).unwrap());
        obs.update_target(handle, Rect::new(0.0, 150.0, 100.0, 250.0));
        assert!(obs.take_events().is_empty());

        // Taller viewport now covers the target.
        obs.set_viewport(Rect::new(0.0, 0.0, 100.0, 300.0));
        assert_eq!(obs.take_events().len(), 1);
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut obs = ViewportObserver::new();
        let id = obs.register(ElementHandle(1), Threshold::new(0.5).unwrap());
        obs.unregister(id);
        obs.unregister(id);
        assert!(obs.is_empty());
    }

    #[test]
    fn degraded_mode_reports_visible_immediately() {
        let mut obs = ViewportObserver::degraded();
        let handle = ElementHandle(3);
        let id = obs.register(handle, Threshold::new(0.5).unwrap());
        assert_eq!(
            obs.take_events(),
            vec![VisibilityEvent {
                id,
                handle,
                visible: true
            }]
        );
        // No repeat reporting afterwards.
        obs.update_target(handle, Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(obs.take_events().is_empty());
    }

    #[test]
    fn observations_on_one_handle_keep_their_own_thresholds() {
        let mut obs = ViewportObserver::new();
        obs.set_viewport(viewport());
        let handle = ElementHandle(4);
        let low = obs.register(handle, Threshold::new(0.15).unwrap());
        let high = obs.register(handle, Threshold::new(0.5).unwrap());

        // 20% visible crosses only the low gate.
        obs.update_target(handle, target_with_visible_height(20.0));
        let events = obs.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, low);
        assert!(events[0].visible);

        // 70% visible crosses the high gate; the low one stays visible.
        obs.update_target(handle, target_with_visible_height(70.0));
        let events = obs.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, high);
    }

    #[test]
    fn zero_area_target_needs_zero_threshold() {
        let mut obs = ViewportObserver::new();
        obs.set_viewport(viewport());
        let inside = ElementHandle(1);
        obs.register(inside, Threshold::new(0.0).unwrap());
        obs.update_target(inside, Rect::new(50.0, 50.0, 50.0, 50.0));
        assert_eq!(obs.take_events().len(), 1);

        let gated = ElementHandle(2);
        obs.register(gated, Threshold::new(0.5).unwrap());
        obs.update_target(gated, Rect::new(50.0, 50.0, 50.0, 50.0));
        assert!(obs.take_events().is_empty());
    }
}
