use crate::error::{EngineError, EngineResult};

/// Opaque identity for an element the host wants observed or animated.
///
/// Handles are allocated by [`crate::engine::Engine::alloc_handle`]; the
/// engine never inspects what the host attaches them to.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct ElementHandle(pub u64);

/// Monotonic timestamp in milliseconds, supplied by the host per frame.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct TimeMs(pub f64);

impl TimeMs {
    /// Milliseconds elapsed since `earlier`, clamped to zero for
    /// non-monotonic input.
    pub fn since(self, earlier: TimeMs) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

/// Vertical scroll offset in pixels. Never negative.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct ScrollOffset(f64);

impl ScrollOffset {
    pub const ZERO: Self = Self(0.0);

    pub fn new(px: f64) -> Self {
        if px.is_finite() {
            Self(px.max(0.0))
        } else {
            Self(0.0)
        }
    }

    pub fn px(self) -> f64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScrollDirection {
    Up,
    Down,
    None,
}

/// One published scroll sample: offset, timestamp, and the direction
/// derived from the previously published sample.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScrollSample {
    pub offset: ScrollOffset,
    pub at: TimeMs,
    pub direction: ScrollDirection,
}

/// Fraction of a target's area that must be inside the viewport for it to
/// count as visible. Valid range is [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(fraction: f64) -> EngineResult<Self> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(EngineError::config(format!(
                "visibility threshold must be in [0, 1], got {fraction}"
            )));
        }
        Ok(Self(fraction))
    }

    pub fn fraction(self) -> f64 {
        self.0
    }
}

/// Per-axis clamp range for parallax translations.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    min: f64,
    max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> EngineResult<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(EngineError::config(format!(
                "bounds must satisfy min <= max with finite values, got [{min}, {max}]"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(self) -> f64 {
        self.min
    }

    pub fn max(self) -> f64 {
        self.max
    }

    pub fn clamp(self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }
}
