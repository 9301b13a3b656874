//! Replays the bundled timeline scenario and checks the full event stream,
//! the same path the `scrollmotion simulate` subcommand exercises.

use scrollmotion::scenario::{Scenario, replay};
use scrollmotion::{EngineEvent, ScrollDirection};

fn load() -> Scenario {
    let s = include_str!("data/timeline_scenario.json");
    serde_json::from_str(s).unwrap()
}

#[test]
fn timeline_scenario_event_stream() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let scenario = load();
    let events = replay(&scenario).unwrap();
    assert_eq!(events.len(), 10);

    let counters: Vec<(u64, bool)> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Counter {
                value, completed, ..
            } => Some((*value, *completed)),
            _ => None,
        })
        .collect();
    assert_eq!(counters, vec![(0, false), (44, false), (88, true)]);

    let phases: Vec<(usize, &str)> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::PhaseChanged { index, meta } => Some((index.0, meta.accent.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(phases, vec![(2, "#2980b9"), (3, "#8e44ad")]);

    let directions: Vec<ScrollDirection> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Scroll { sample } => Some(sample.direction),
            _ => None,
        })
        .collect();
    assert_eq!(directions, vec![ScrollDirection::None, ScrollDirection::Down]);

    for e in &events {
        if let EngineEvent::Parallax { translation, .. } = e {
            assert_eq!(translation.y, -40.0, "clamped to the lower bound");
            assert_eq!(translation.x, 0.0);
        }
    }
}

#[test]
fn replaying_twice_is_deterministic() {
    let scenario = load();
    let a = replay(&scenario).unwrap();
    let b = replay(&load()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn events_serialize_for_the_cli() {
    let events = replay(&load()).unwrap();
    for event in &events {
        let line = serde_json::to_string(event).unwrap();
        assert!(line.starts_with('{'));
    }
}
