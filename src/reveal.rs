//! One-shot eased reveal animations.
//!
//! The long-scrolling pages fade sections in the first time they become
//! visible: opacity and a small translate animated over a fixed duration
//! with an ease-out curve. A reveal run shares the counter engine's
//! lifecycle (armed, triggered once, stepped per frame, never restarted)
//! but emits eased progress in [0, 1] instead of integers.

use std::collections::BTreeMap;

use crate::core::{ElementHandle, TimeMs};
use crate::counter::CounterState;
use crate::ease::Ease;
use crate::error::{EngineError, EngineResult};

/// Default visibility threshold for section reveals. Sections start fading
/// in as soon as a sliver of them scrolls into view.
pub const REVEAL_THRESHOLD: f64 = 0.15;

#[derive(Debug)]
struct RevealRun {
    duration_ms: f64,
    ease: Ease,
    state: CounterState,
    t0: Option<TimeMs>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct RevealEvent {
    pub handle: ElementHandle,
    /// Eased progress in [0, 1]; consumers map it onto opacity/translate.
    pub progress: f64,
    pub completed: bool,
}

#[derive(Debug, Default)]
pub struct RevealEngine {
    runs: BTreeMap<ElementHandle, RevealRun>,
}

impl RevealEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(
        &mut self,
        handle: ElementHandle,
        duration_ms: f64,
        ease: Ease,
    ) -> EngineResult<()> {
        if !duration_ms.is_finite() || duration_ms <= 0.0 {
            return Err(EngineError::config(format!(
                "reveal duration must be > 0 ms, got {duration_ms}"
            )));
        }
        self.runs.entry(handle).or_insert(RevealRun {
            duration_ms,
            ease,
            state: CounterState::Idle,
            t0: None,
        });
        Ok(())
    }

    pub fn trigger(&mut self, handle: ElementHandle) {
        if let Some(run) = self.runs.get_mut(&handle) {
            if run.state == CounterState::Idle {
                run.state = CounterState::Running;
                tracing::trace!(handle = handle.0, "reveal started");
            }
        }
    }

    pub fn cancel(&mut self, handle: ElementHandle) {
        self.runs.remove(&handle);
    }

    pub fn needs_frames(&self) -> bool {
        self.runs.values().any(|r| r.state == CounterState::Running)
    }

    pub fn step_all(&mut self, now: TimeMs) -> Vec<RevealEvent> {
        let mut events = Vec::new();
        for (handle, run) in self.runs.iter_mut() {
            if run.state != CounterState::Running {
                continue;
            }
            let t0 = *run.t0.get_or_insert(now);
            let t = (now.since(t0) / run.duration_ms).clamp(0.0, 1.0);
            let completed = t >= 1.0;
            if completed {
                run.state = CounterState::Completed;
            }
            events.push(RevealEvent {
                handle: *handle,
                progress: run.ease.apply(t),
                completed,
            });
        }
        events
    }
}
