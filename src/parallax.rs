//! Continuous, bounded layer translation.
//!
//! A binding maps the latest scroll or pointer sample to a translation for
//! one visual layer: `clamp(delta * sensitivity, min, max)` per axis,
//! always computed from the absolute sample so repeated samples are
//! idempotent and nothing drifts. The binder holds no layer state; it only
//! reports what the transform should be.

use std::collections::BTreeMap;

use kurbo::{Point, Rect, Vec2};

use crate::core::{Bounds, ElementHandle, ScrollSample};
use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(pub(crate) u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallaxSource {
    Scroll,
    Pointer,
}

#[derive(Clone, Copy, Debug)]
struct Binding {
    handle: ElementHandle,
    source: ParallaxSource,
    sensitivity: Vec2,
    bounds: Bounds,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct ParallaxEvent {
    pub handle: ElementHandle,
    pub translation: Vec2,
}

#[derive(Debug, Default)]
pub struct ParallaxBinder {
    bindings: BTreeMap<BindingId, Binding>,
    next_id: u64,
}

impl ParallaxBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(
        &mut self,
        handle: ElementHandle,
        source: ParallaxSource,
        sensitivity: Vec2,
        bounds: Bounds,
    ) -> EngineResult<BindingId> {
        if !sensitivity.x.is_finite() || !sensitivity.y.is_finite() {
            return Err(EngineError::config("parallax sensitivity must be finite"));
        }
        let id = BindingId(self.next_id);
        self.next_id += 1;
        self.bindings.insert(
            id,
            Binding {
                handle,
                source,
                sensitivity,
                bounds,
            },
        );
        Ok(id)
    }

    /// Idempotent: unknown ids are ignored.
    pub fn unbind(&mut self, id: BindingId) {
        self.bindings.remove(&id);
    }

    pub fn has_scroll_bindings(&self) -> bool {
        self.bindings
            .values()
            .any(|b| b.source == ParallaxSource::Scroll)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Translations for every scroll-driven binding at this sample.
    pub fn on_scroll(&self, sample: ScrollSample) -> Vec<ParallaxEvent> {
        self.apply(ParallaxSource::Scroll, Vec2::new(sample.offset.px(), sample.offset.px()))
    }

    /// Translations for every pointer-driven binding. The pointer position
    /// is normalized to an offset from the viewport center in [-0.5, 0.5]
    /// per axis, so sensitivity reads as "pixels of travel across the full
    /// viewport".
    pub fn on_pointer(&self, pointer: Point, viewport: Rect) -> Vec<ParallaxEvent> {
        let (w, h) = (viewport.width(), viewport.height());
        if w <= 0.0 || h <= 0.0 {
            return Vec::new();
        }
        let delta = Vec2::new(
            ((pointer.x - viewport.x0) / w - 0.5).clamp(-0.5, 0.5),
            ((pointer.y - viewport.y0) / h - 0.5).clamp(-0.5, 0.5),
        );
        self.apply(ParallaxSource::Pointer, delta)
    }

    fn apply(&self, source: ParallaxSource, delta: Vec2) -> Vec<ParallaxEvent> {
        self.bindings
            .values()
            .filter(|b| b.source == source)
            .map(|b| ParallaxEvent {
                handle: b.handle,
                translation: Vec2::new(
                    b.bounds.clamp(delta.x * b.sensitivity.x),
                    b.bounds.clamp(delta.y * b.sensitivity.y),
                ),
            })
            .collect()
    }
}
