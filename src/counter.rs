//! One-shot numeric counters synchronized to the frame loop.
//!
//! A run is armed for a target, starts the first time that target is
//! triggered (normally by a visibility event), and steps once per frame
//! until it reaches its end value. Completed runs stop requesting frames;
//! re-triggering a running or completed run is a no-op.

use std::collections::BTreeMap;

use crate::core::{ElementHandle, TimeMs};
use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterState {
    Idle,
    Running,
    Completed,
}

#[derive(Debug)]
pub struct CounterRun {
    pub end_value: u64,
    pub duration_ms: f64,
    pub state: CounterState,
    t0: Option<TimeMs>,
    last_emitted: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct CounterEvent {
    pub handle: ElementHandle,
    pub value: u64,
    pub completed: bool,
}

/// Steps every running counter, emitting `floor(progress * end_value)`
/// per frame. At most one run exists per target handle.
#[derive(Debug, Default)]
pub struct CounterEngine {
    runs: BTreeMap<ElementHandle, CounterRun>,
}

impl CounterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a run for `handle`. Rejects non-positive durations; arming a
    /// handle that already has a run (in any state) is a no-op, which is
    /// what makes the animation fire at most once per target.
    pub fn arm(
        &mut self,
        handle: ElementHandle,
        end_value: u64,
        duration_ms: f64,
    ) -> EngineResult<()> {
        if !duration_ms.is_finite() || duration_ms <= 0.0 {
            return Err(EngineError::config(format!(
                "counter duration must be > 0 ms, got {duration_ms}"
            )));
        }
        self.runs.entry(handle).or_insert(CounterRun {
            end_value,
            duration_ms,
            state: CounterState::Idle,
            t0: None,
            last_emitted: None,
        });
        Ok(())
    }

    /// Start the armed run for `handle`. No-op for unknown handles and for
    /// runs that are already running or completed.
    pub fn trigger(&mut self, handle: ElementHandle) {
        if let Some(run) = self.runs.get_mut(&handle) {
            if run.state == CounterState::Idle {
                run.state = CounterState::Running;
                tracing::trace!(handle = handle.0, end = run.end_value, "counter started");
            }
        }
    }

    /// Drop any run for `handle`, whatever its state. Used when the owning
    /// target unmounts so a detached element is not animated further.
    pub fn cancel(&mut self, handle: ElementHandle) {
        self.runs.remove(&handle);
    }

    pub fn state(&self, handle: ElementHandle) -> Option<CounterState> {
        self.runs.get(&handle).map(|r| r.state)
    }

    /// Most recent value emitted for `handle`, if any step has run.
    pub fn last_value(&self, handle: ElementHandle) -> Option<u64> {
        self.runs.get(&handle).and_then(|r| r.last_emitted)
    }

    /// True while at least one run still needs frames.
    pub fn needs_frames(&self) -> bool {
        self.runs.values().any(|r| r.state == CounterState::Running)
    }

    /// Advance all running counters to `now`. The first step after the
    /// trigger captures `t0` and emits 0; the step that reaches the end
    /// value marks the run completed, after which it never emits again.
    pub fn step_all(&mut self, now: TimeMs) -> Vec<CounterEvent> {
        let mut events = Vec::new();
        for (handle, run) in self.runs.iter_mut() {
            if run.state != CounterState::Running {
                continue;
            }
            let t0 = *run.t0.get_or_insert(now);
            let progress = (now.since(t0) / run.duration_ms).clamp(0.0, 1.0);
            let value = (progress * run.end_value as f64).floor() as u64;
            let completed = progress >= 1.0 || run.end_value == 0;

            // Monotonic by construction, but a duplicate intermediate value
            // is still a frame step worth reporting to the consumer.
            run.last_emitted = Some(value);
            if completed {
                run.state = CounterState::Completed;
                tracing::trace!(handle = handle.0, value, "counter completed");
            }
            events.push(CounterEvent {
                handle: *handle,
                value,
                completed,
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(v: u64) -> ElementHandle {
        ElementHandle(v)
    }

    #[test]
    fn rejects_non_positive_duration() {
        let mut engine = CounterEngine::new();
        assert!(engine.arm(h(1), 10, 0.0).is_err());
        assert!(engine.arm(h(1), 10, -5.0).is_err());
        assert!(engine.arm(h(1), 10, f64::NAN).is_err());
        assert!(engine.arm(h(1), 10, 1.0).is_ok());
    }

    #[test]
    fn stat_counter_scenario() {
        // end=88 over 1400ms, ticked at 0 / 700 / 1400.
        let mut engine = CounterEngine::new();
        engine.arm(h(1), 88, 1400.0).unwrap();
        engine.trigger(h(1));

        let e0 = engine.step_all(TimeMs(0.0));
        assert_eq!(e0[0].value, 0);
        assert!(!e0[0].completed);

        let e1 = engine.step_all(TimeMs(700.0));
        assert_eq!(e1[0].value, 44);
        assert!(!e1[0].completed);

        let e2 = engine.step_all(TimeMs(1400.0));
        assert_eq!(e2[0].value, 88);
        assert!(e2[0].completed);

        assert!(
            engine.step_all(TimeMs(1500.0)).is_empty(),
            "no ticks after completion"
        );
        assert!(!engine.needs_frames());
    }

    #[test]
    fn values_are_non_decreasing_and_end_exact() {
        let mut engine = CounterEngine::new();
        engine.arm(h(1), 37, 1000.0).unwrap();
        engine.trigger(h(1));

        let mut last = 0u64;
        let mut final_value = 0u64;
        for ms in (0..=1200).step_by(16) {
            for e in engine.step_all(TimeMs(ms as f64)) {
                assert!(e.value >= last);
                last = e.value;
                final_value = e.value;
            }
        }
        assert_eq!(final_value, 37);
    }

    #[test]
    fn trigger_is_once_only() {
        let mut engine = CounterEngine::new();
        engine.arm(h(1), 10, 100.0).unwrap();
        engine.trigger(h(1));
        engine.step_all(TimeMs(0.0));
        engine.step_all(TimeMs(100.0));
        assert_eq!(engine.state(h(1)), Some(CounterState::Completed));

        // Re-trigger after completion: nothing restarts.
        engine.trigger(h(1));
        assert_eq!(engine.state(h(1)), Some(CounterState::Completed));
        assert!(engine.step_all(TimeMs(200.0)).is_empty());
        assert_eq!(engine.last_value(h(1)), Some(10));

        // Re-arm for the same handle is also a no-op.
        engine.arm(h(1), 999, 100.0).unwrap();
        assert!(engine.step_all(TimeMs(300.0)).is_empty());
    }

    #[test]
    fn untriggered_run_stays_idle() {
        let mut engine = CounterEngine::new();
        engine.arm(h(1), 10, 100.0).unwrap();
        assert!(engine.step_all(TimeMs(0.0)).is_empty());
        assert_eq!(engine.state(h(1)), Some(CounterState::Idle));
        assert!(!engine.needs_frames());
    }

    #[test]
    fn zero_end_value_completes_immediately() {
        let mut engine = CounterEngine::new();
        engine.arm(h(1), 0, 500.0).unwrap();
        engine.trigger(h(1));
        let events = engine.step_all(TimeMs(0.0));
        assert_eq!(
            events,
            vec![CounterEvent {
                handle: h(1),
                value: 0,
                completed: true
            }]
        );
        assert!(engine.step_all(TimeMs(16.0)).is_empty());
    }

    #[test]
    fn cancel_stops_in_flight_run() {
        let mut engine = CounterEngine::new();
        engine.arm(h(1), 10, 100.0).unwrap();
        engine.trigger(h(1));
        engine.step_all(TimeMs(0.0));
        engine.cancel(h(1));
        assert!(engine.step_all(TimeMs(50.0)).is_empty());
        assert_eq!(engine.state(h(1)), None);
    }

    #[test]
    fn t0_is_first_tick_after_trigger() {
        let mut engine = CounterEngine::new();
        engine.arm(h(1), 100, 1000.0).unwrap();
        engine.trigger(h(1));

        // The run was triggered "earlier" but the first tick arrives at
        // t=5000; progress is measured from there.
        let e = engine.step_all(TimeMs(5000.0));
        assert_eq!(e[0].value, 0);
        let e = engine.step_all(TimeMs(5500.0));
        assert_eq!(e[0].value, 50);
    }
}
