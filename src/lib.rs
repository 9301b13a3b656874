//! Scroll-synchronized viewport animation engine.
//!
//! One [`Engine`] per page turns host inputs (viewport/target geometry,
//! raw scroll offsets, pointer position, frame ticks) into an ordered
//! event stream driving decorative animation:
//!
//! - **visibility**: enter/exit transitions for registered targets against
//!   a per-target area threshold,
//! - **counters**: trigger-once integer count-ups synchronized to the
//!   frame loop,
//! - **reveals**: trigger-once eased fade-in progress for sections,
//! - **phases**: which scroll region of a long page is active, emitted
//!   only on change,
//! - **parallax**: bounded layer translations from scroll or pointer.
//!
//! The engine is headless and deterministic: it never measures anything
//! itself, performs no IO, and owns no timers. Hosts that cannot measure
//! visibility or scroll declare that via [`Capabilities`] and get fixed
//! fallbacks instead of errors.
#![forbid(unsafe_code)]

pub mod core;
pub mod counter;
pub mod ease;
pub mod engine;
pub mod error;
pub mod parallax;
pub mod phase;
pub mod reveal;
pub mod scenario;
pub mod scroll;
pub mod viewport;

pub use crate::core::{
    Bounds, ElementHandle, ScrollDirection, ScrollOffset, ScrollSample, Threshold, TimeMs,
};
pub use counter::{CounterEvent, CounterState};
pub use ease::Ease;
pub use engine::{Capabilities, Engine, EngineConfig, EngineEvent};
pub use error::{EngineError, EngineResult};
pub use parallax::{BindingId, ParallaxEvent, ParallaxSource};
pub use phase::{PhaseEvent, PhaseIndex, PhaseMeta, PhaseSpec};
pub use reveal::RevealEvent;
pub use scroll::ScrollSubId;
pub use viewport::{ObserveId, VisibilityEvent, visible_fraction};
