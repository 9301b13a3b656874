//! The engine facade.
//!
//! One `Engine` instance per page, parameterized by content data from the
//! presentation sections. The host feeds inputs (geometry, raw scroll,
//! pointer position) as they happen and calls [`Engine::tick`] once per
//! rendered frame; the engine turns those into ordered [`EngineEvent`]s.
//!
//! # Frame ordering
//!
//! Within one tick:
//!
//! 1. visibility transitions are dispatched and trigger any armed
//!    counter/reveal runs,
//! 2. the coalesced scroll sample is published, then phase resolution and
//!    scroll parallax are derived from that exact sample,
//! 3. pointer parallax is derived from the latest pointer position,
//! 4. counters and reveals step.
//!
//! So a single logical scroll event can never observe a half-updated phase
//! next to an already-updated counter.

use kurbo::{Point, Rect, Vec2};

use crate::core::{Bounds, ElementHandle, ScrollOffset, ScrollSample, Threshold, TimeMs};
use crate::counter::{CounterEngine, CounterState};
use crate::ease::Ease;
use crate::error::EngineResult;
use crate::parallax::{BindingId, ParallaxBinder, ParallaxSource};
use crate::phase::{PhaseIndex, PhaseMeta, PhaseSpec, PhaseTrack};
use crate::reveal::{REVEAL_THRESHOLD, RevealEngine};
use crate::scroll::{ScrollSubId, ScrollTracker};
use crate::viewport::{ObserveId, ViewportObserver};

/// Which measurement primitives the host environment actually provides.
/// Absent capabilities degrade to fixed defaults instead of erroring.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct Capabilities {
    pub viewport: bool,
    pub scroll: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            viewport: true,
            scroll: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub capabilities: Capabilities,
}

/// Everything the engine tells its consumers. Dispatch order within a tick
/// is deterministic; see the module docs.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineEvent {
    Visibility {
        handle: ElementHandle,
        visible: bool,
    },
    Scroll {
        sample: ScrollSample,
    },
    PhaseChanged {
        index: PhaseIndex,
        meta: PhaseMeta,
    },
    Parallax {
        handle: ElementHandle,
        translation: Vec2,
    },
    Counter {
        handle: ElementHandle,
        value: u64,
        completed: bool,
    },
    Reveal {
        handle: ElementHandle,
        progress: f64,
        completed: bool,
    },
}

type EventSink = Box<dyn FnMut(&EngineEvent)>;

pub struct Engine {
    observer: ViewportObserver,
    scroll: ScrollTracker,
    counters: CounterEngine,
    reveals: RevealEngine,
    phases: Option<PhaseTrack>,
    parallax: ParallaxBinder,

    next_handle: u64,
    viewport: Option<Rect>,
    pointer: Option<Point>,
    pointer_dirty: bool,

    // Internally held subscriptions: one per consumer of the shared scroll
    // listener, so the listener's refcount reflects real demand.
    phase_sub: Option<ScrollSubId>,
    binding_subs: Vec<(BindingId, ScrollSubId)>,
    // One-shot trigger observations, one per run kind so each keeps its own
    // visibility gate. Detached as soon as they fire.
    counter_subs: Vec<(ElementHandle, ObserveId)>,
    reveal_subs: Vec<(ElementHandle, ObserveId)>,

    sinks: Vec<EventSink>,
    events: Vec<EngineEvent>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let caps = config.capabilities;
        Self {
            observer: if caps.viewport {
                ViewportObserver::new()
            } else {
                ViewportObserver::degraded()
            },
            scroll: if caps.scroll {
                ScrollTracker::new()
            } else {
                ScrollTracker::degraded()
            },
            counters: CounterEngine::new(),
            reveals: RevealEngine::new(),
            phases: None,
            parallax: ParallaxBinder::new(),
            next_handle: 0,
            viewport: None,
            pointer: None,
            pointer_dirty: false,
            phase_sub: None,
            binding_subs: Vec::new(),
            counter_subs: Vec::new(),
            reveal_subs: Vec::new(),
            sinks: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Allocate a handle for a host element. The engine never inspects
    /// what it refers to.
    pub fn alloc_handle(&mut self) -> ElementHandle {
        let handle = ElementHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Register an event callback. Sinks run during [`Engine::tick`] in
    /// registration order, after the frame's events are fully computed.
    pub fn add_sink(&mut self, sink: impl FnMut(&EngineEvent) + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// Drain the events emitted since the last call, in dispatch order.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- registration API -------------------------------------------------

    /// Watch `handle` and emit visibility transitions against `threshold`
    /// (a fraction in [0, 1]).
    pub fn observe_visibility(
        &mut self,
        handle: ElementHandle,
        threshold: f64,
    ) -> EngineResult<ObserveId> {
        let threshold = Threshold::new(threshold)?;
        Ok(self.observer.register(handle, threshold))
    }

    /// Idempotent teardown of a visibility observation.
    pub fn unobserve(&mut self, id: ObserveId) {
        self.observer.unregister(id);
    }

    /// Subscribe to published scroll samples (delivered as
    /// [`EngineEvent::Scroll`]). The underlying listener is shared and
    /// reference-counted across all subscribers, internal ones included.
    pub fn subscribe_scroll(&mut self) -> ScrollSubId {
        self.scroll.subscribe()
    }

    pub fn unsubscribe_scroll(&mut self, id: ScrollSubId) {
        self.scroll.unsubscribe(id);
    }

    /// Count from 0 to `end_value` over `duration_ms`, starting the first
    /// time `handle` is at least half visible. Fires at most once per
    /// handle, ever.
    pub fn animate_count(
        &mut self,
        handle: ElementHandle,
        end_value: u64,
        duration_ms: f64,
    ) -> EngineResult<()> {
        self.counters.arm(handle, end_value, duration_ms)?;
        Self::register_trigger(&mut self.counter_subs, &mut self.observer, handle, 0.5)?;
        Ok(())
    }

    /// One-shot eased reveal for `handle`, triggered when a sliver of it
    /// becomes visible.
    pub fn animate_reveal(
        &mut self,
        handle: ElementHandle,
        duration_ms: f64,
        ease: Ease,
    ) -> EngineResult<()> {
        self.reveals.arm(handle, duration_ms, ease)?;
        Self::register_trigger(
            &mut self.reveal_subs,
            &mut self.observer,
            handle,
            REVEAL_THRESHOLD,
        )?;
        Ok(())
    }

    /// Replace the page's phase regions. The engine holds its own scroll
    /// subscription on behalf of the phase machine.
    pub fn register_phases(&mut self, specs: Vec<PhaseSpec>) -> EngineResult<()> {
        let track = PhaseTrack::new(specs)?;
        if self.phase_sub.is_none() {
            self.phase_sub = Some(self.scroll.subscribe());
        }
        self.phases = Some(track);
        Ok(())
    }

    /// Drop the phase regions and release their scroll subscription.
    pub fn clear_phases(&mut self) {
        self.phases = None;
        if let Some(sub) = self.phase_sub.take() {
            self.scroll.unsubscribe(sub);
        }
    }

    /// Bind a parallax layer. Scroll-driven bindings each hold a scroll
    /// subscription; pointer-driven ones react to recorded pointer moves.
    pub fn bind_parallax(
        &mut self,
        handle: ElementHandle,
        source: ParallaxSource,
        sensitivity: Vec2,
        bounds: Bounds,
    ) -> EngineResult<BindingId> {
        let id = self.parallax.bind(handle, source, sensitivity, bounds)?;
        if source == ParallaxSource::Scroll {
            self.binding_subs.push((id, self.scroll.subscribe()));
        }
        Ok(id)
    }

    pub fn unbind_parallax(&mut self, id: BindingId) {
        self.parallax.unbind(id);
        if let Some(pos) = self.binding_subs.iter().position(|(b, _)| *b == id) {
            let (_, sub) = self.binding_subs.remove(pos);
            self.scroll.unsubscribe(sub);
        }
    }

    /// Tear down everything tied to `handle`: its trigger observation and
    /// any in-flight counter or reveal run. Detached elements must not
    /// keep animating.
    pub fn remove_target(&mut self, handle: ElementHandle) {
        for subs in [&mut self.counter_subs, &mut self.reveal_subs] {
            while let Some(pos) = subs.iter().position(|(h, _)| *h == handle) {
                let (_, id) = subs.remove(pos);
                self.observer.unregister(id);
            }
        }
        self.counters.cancel(handle);
        self.reveals.cancel(handle);
    }

    fn register_trigger(
        subs: &mut Vec<(ElementHandle, ObserveId)>,
        observer: &mut ViewportObserver,
        handle: ElementHandle,
        threshold: f64,
    ) -> EngineResult<()> {
        // At most one run of each kind exists per handle, so one
        // observation per kind covers it.
        if !subs.iter().any(|(h, _)| *h == handle) {
            let id = observer.register(handle, Threshold::new(threshold)?);
            subs.push((handle, id));
        }
        Ok(())
    }

    // ---- host inputs ------------------------------------------------------

    pub fn set_viewport(&mut self, rect: Rect) {
        self.viewport = Some(rect);
        self.observer.set_viewport(rect);
    }

    pub fn update_target(&mut self, handle: ElementHandle, rect: Rect) {
        self.observer.update_target(handle, rect);
    }

    pub fn record_scroll(&mut self, offset_px: f64, at: TimeMs) {
        self.scroll.record(ScrollOffset::new(offset_px), at);
    }

    pub fn record_pointer(&mut self, x: f64, y: f64) {
        self.pointer = Some(Point::new(x, y));
        self.pointer_dirty = true;
    }

    pub fn current_offset(&self) -> ScrollOffset {
        self.scroll.current_offset()
    }

    pub fn current_phase(&self) -> Option<PhaseIndex> {
        self.phases.as_ref().and_then(PhaseTrack::current)
    }

    pub fn counter_state(&self, handle: ElementHandle) -> Option<CounterState> {
        self.counters.state(handle)
    }

    /// Whether another frame should be scheduled: true while any counter
    /// or reveal run is mid-flight. Completed runs request nothing.
    pub fn needs_frames(&self) -> bool {
        self.counters.needs_frames() || self.reveals.needs_frames()
    }

    // ---- frame loop -------------------------------------------------------

    /// Advance one frame. See the module docs for the ordering contract.
    #[tracing::instrument(skip(self))]
    pub fn tick(&mut self, now: TimeMs) {
        let mut frame: Vec<EngineEvent> = Vec::new();

        // 1. Visibility first, so dependent runs start on this same frame.
        for ev in self.observer.take_events() {
            if ev.visible {
                // Trigger observations fire once per element, then detach.
                if let Some(pos) = self.counter_subs.iter().position(|(_, id)| *id == ev.id) {
                    let (handle, id) = self.counter_subs.remove(pos);
                    self.counters.trigger(handle);
                    self.observer.unregister(id);
                }
                if let Some(pos) = self.reveal_subs.iter().position(|(_, id)| *id == ev.id) {
                    let (handle, id) = self.reveal_subs.remove(pos);
                    self.reveals.trigger(handle);
                    self.observer.unregister(id);
                }
            }
            frame.push(EngineEvent::Visibility {
                handle: ev.handle,
                visible: ev.visible,
            });
        }

        // 2. The frame's scroll sample, then everything derived from it.
        if let Some(sample) = self.scroll.publish() {
            frame.push(EngineEvent::Scroll { sample });
            if let Some(track) = self.phases.as_mut() {
                if let Some(change) = track.observe(sample.offset) {
                    frame.push(EngineEvent::PhaseChanged {
                        index: change.index,
                        meta: change.meta,
                    });
                }
            }
            for ev in self.parallax.on_scroll(sample) {
                frame.push(EngineEvent::Parallax {
                    handle: ev.handle,
                    translation: ev.translation,
                });
            }
        }

        // 3. Pointer parallax from the latest recorded position.
        if self.pointer_dirty {
            self.pointer_dirty = false;
            if let (Some(pointer), Some(viewport)) = (self.pointer, self.viewport) {
                for ev in self.parallax.on_pointer(pointer, viewport) {
                    frame.push(EngineEvent::Parallax {
                        handle: ev.handle,
                        translation: ev.translation,
                    });
                }
            }
        }

        // 4. Step the one-shot runs, including any triggered in step 1.
        for ev in self.counters.step_all(now) {
            frame.push(EngineEvent::Counter {
                handle: ev.handle,
                value: ev.value,
                completed: ev.completed,
            });
        }
        for ev in self.reveals.step_all(now) {
            frame.push(EngineEvent::Reveal {
                handle: ev.handle,
                progress: ev.progress,
                completed: ev.completed,
            });
        }

        for event in &frame {
            for sink in &mut self.sinks {
                sink(event);
            }
        }
        self.events.extend(frame);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("viewport", &self.viewport)
            .field("phases", &self.phases)
            .field("sinks", &self.sinks.len())
            .field("queued_events", &self.events.len())
            .finish_non_exhaustive()
    }
}
