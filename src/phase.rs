//! Scroll phase resolution.
//!
//! A long-scrolling narrative page is divided into ordered phases, each
//! covering a half-open `[start, end)` scroll region. At any offset at most
//! one phase is active; dependent UI (accent colors, sidebar markers) reacts
//! to the change event rather than to every scroll sample.

use crate::core::ScrollOffset;
use crate::error::{EngineError, EngineResult};

/// 1-based position of a phase in its track.
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
pub struct PhaseIndex(pub usize);

/// Presentation metadata carried by the phase-changed event so styling
/// never has to reach into shared mutable state.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PhaseMeta {
    pub label: String,
    /// Accent color token, e.g. `"#c0392b"`.
    pub accent: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhaseSpec {
    pub start: f64,
    /// `None` marks an unbounded final phase.
    pub end: Option<f64>,
    pub meta: PhaseMeta,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PhaseEvent {
    pub index: PhaseIndex,
    pub meta: PhaseMeta,
}

/// Ordered phase regions plus the currently resolved phase.
///
/// Resolution is a pure function of offset (see [`PhaseTrack::resolve`]);
/// the mutable part only exists to suppress duplicate emissions.
#[derive(Debug)]
pub struct PhaseTrack {
    phases: Vec<PhaseSpec>,
    current: Option<PhaseIndex>,
}

impl PhaseTrack {
    pub fn new(phases: Vec<PhaseSpec>) -> EngineResult<Self> {
        validate(&phases)?;
        Ok(Self {
            phases,
            current: None,
        })
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn meta(&self, index: PhaseIndex) -> Option<&PhaseMeta> {
        self.phases.get(index.0.checked_sub(1)?).map(|p| &p.meta)
    }

    /// Currently active phase; `None` until scrolling first reaches the
    /// first phase's start bound.
    pub fn current(&self) -> Option<PhaseIndex> {
        self.current
    }

    /// Resolve `offset` to a phase, independent of any prior state.
    ///
    /// Start bounds are inclusive and end bounds exclusive, so an offset
    /// sitting exactly on a shared boundary belongs to the later phase.
    /// Offsets beyond the last end bound stay on the last phase
    /// (terminal-sticky); offsets in an interior gap stay on the most
    /// recently passed phase, which keeps resolution total and
    /// deterministic.
    pub fn resolve(&self, offset: ScrollOffset) -> Option<PhaseIndex> {
        let o = offset.px();
        let passed = self.phases.partition_point(|p| p.start <= o);
        if passed == 0 {
            return None;
        }
        Some(PhaseIndex(passed))
    }

    /// Feed one scroll sample; returns a change event only when the
    /// resolved phase differs from the previous resolution.
    pub fn observe(&mut self, offset: ScrollOffset) -> Option<PhaseEvent> {
        let resolved = self.resolve(offset);
        if resolved == self.current {
            return None;
        }
        self.current = resolved;
        let index = resolved?;
        let meta = self.meta(index)?.clone();
        tracing::debug!(index = index.0, accent = %meta.accent, "phase changed");
        Some(PhaseEvent { index, meta })
    }
}

fn validate(phases: &[PhaseSpec]) -> EngineResult<()> {
    if phases.is_empty() {
        return Err(EngineError::config("phase list must not be empty"));
    }
    let last = phases.len() - 1;
    let mut prev_end = f64::NEG_INFINITY;
    for (i, phase) in phases.iter().enumerate() {
        if !phase.start.is_finite() || phase.start < 0.0 {
            return Err(EngineError::config(format!(
                "phase {} start must be a non-negative finite offset",
                i + 1
            )));
        }
        match phase.end {
            Some(end) => {
                if !end.is_finite() || end <= phase.start {
                    return Err(EngineError::config(format!(
                        "phase {} must have start < end",
                        i + 1
                    )));
                }
                if phase.start < prev_end {
                    return Err(EngineError::config(format!(
                        "phase {} overlaps its predecessor",
                        i + 1
                    )));
                }
                prev_end = end;
            }
            None if i == last => {
                if phase.start < prev_end {
                    return Err(EngineError::config(format!(
                        "phase {} overlaps its predecessor",
                        i + 1
                    )));
                }
            }
            None => {
                return Err(EngineError::config(format!(
                    "phase {} is unbounded but not last",
                    i + 1
                )));
            }
        }
    }
    Ok(())
}
