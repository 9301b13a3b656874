//! Scripted engine sessions.
//!
//! A scenario is a JSON description of a page setup (viewport, targets,
//! phases, animations, parallax layers) plus a sequence of host inputs and
//! frame ticks. Replaying one through a fresh engine yields the exact event
//! stream a live page would have produced, which makes scenarios useful
//! both for the diagnostic CLI and for snapshot-style tests.

use std::collections::BTreeMap;

use kurbo::{Rect, Vec2};

use crate::core::{Bounds, ElementHandle, TimeMs};
use crate::ease::Ease;
use crate::engine::{Engine, EngineConfig, EngineEvent};
use crate::error::{EngineError, EngineResult};
use crate::parallax::ParallaxSource;
use crate::phase::PhaseSpec;

#[derive(Debug, serde::Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: EngineConfig,
    pub viewport: Option<Rect>,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    #[serde(default)]
    pub phases: Vec<PhaseSpec>,
    #[serde(default)]
    pub counters: Vec<CounterSpec>,
    #[serde(default)]
    pub reveals: Vec<RevealSpec>,
    #[serde(default)]
    pub parallax: Vec<LayerSpec>,
    pub steps: Vec<Step>,
}

/// A named host element; names are scenario-local and map to handles.
#[derive(Debug, serde::Deserialize)]
pub struct TargetSpec {
    pub name: String,
    #[serde(default)]
    pub rect: Option<Rect>,
}

#[derive(Debug, serde::Deserialize)]
pub struct CounterSpec {
    pub target: String,
    pub end_value: u64,
    pub duration_ms: f64,
}

#[derive(Debug, serde::Deserialize)]
pub struct RevealSpec {
    pub target: String,
    pub duration_ms: f64,
    #[serde(default)]
    pub ease: Ease,
}

#[derive(Debug, serde::Deserialize)]
pub struct LayerSpec {
    pub target: String,
    pub source: ParallaxSource,
    pub sensitivity: [f64; 2],
    pub bounds: [f64; 2],
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Raw scroll input, as the host listener would report it.
    Scroll { offset: f64, at: f64 },
    /// Pointer moved to viewport coordinates.
    Pointer { x: f64, y: f64 },
    /// A target's layout rectangle changed.
    MoveTarget { target: String, rect: Rect },
    /// One rendered frame.
    Tick { at: f64 },
}

/// Build an engine from the scenario and run its steps, returning every
/// emitted event in dispatch order.
pub fn replay(scenario: &Scenario) -> EngineResult<Vec<EngineEvent>> {
    let mut engine = Engine::new(scenario.config);
    let mut handles: BTreeMap<&str, ElementHandle> = BTreeMap::new();

    for target in &scenario.targets {
        let handle = engine.alloc_handle();
        if handles.insert(&target.name, handle).is_some() {
            return Err(EngineError::scenario(format!(
                "duplicate target name '{}'",
                target.name
            )));
        }
    }
    let lookup = |handles: &BTreeMap<&str, ElementHandle>, name: &str| {
        handles.get(name).copied().ok_or_else(|| {
            EngineError::scenario(format!("unknown target name '{name}'"))
        })
    };

    if let Some(viewport) = scenario.viewport {
        engine.set_viewport(viewport);
    }
    if !scenario.phases.is_empty() {
        engine.register_phases(scenario.phases.clone())?;
    }
    for counter in &scenario.counters {
        let handle = lookup(&handles, &counter.target)?;
        engine.animate_count(handle, counter.end_value, counter.duration_ms)?;
    }
    for reveal in &scenario.reveals {
        let handle = lookup(&handles, &reveal.target)?;
        engine.animate_reveal(handle, reveal.duration_ms, reveal.ease)?;
    }
    for layer in &scenario.parallax {
        let handle = lookup(&handles, &layer.target)?;
        let [sx, sy] = layer.sensitivity;
        let [min, max] = layer.bounds;
        engine.bind_parallax(handle, layer.source, Vec2::new(sx, sy), Bounds::new(min, max)?)?;
    }
    // Initial geometry lands after registration so the first tick sees it.
    for target in &scenario.targets {
        if let Some(rect) = target.rect {
            let handle = lookup(&handles, &target.name)?;
            engine.update_target(handle, rect);
        }
    }

    let mut events = Vec::new();
    for step in &scenario.steps {
        match step {
            Step::Scroll { offset, at } => engine.record_scroll(*offset, TimeMs(*at)),
            Step::Pointer { x, y } => engine.record_pointer(*x, *y),
            Step::MoveTarget { target, rect } => {
                let handle = lookup(&handles, target)?;
                engine.update_target(handle, *rect);
            }
            Step::Tick { at } => {
                engine.tick(TimeMs(*at));
                events.append(&mut engine.take_events());
            }
        }
    }
    Ok(events)
}
