//! Pointer/key event transmission chain and its assembly from feature flags.
//!
//! The chain is an ordered list of [`EventStage`]s.  A stage that returns
//! `false` lets the event continue to the next stage; a stage that wants to
//! inject a different event calls the rest of the chain through its
//! [`Downstream`] handle.  The last stage is always an [`InputSink`] that
//! hands events back to the platform input pipeline.

use std::ops::BitOr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::config::RecognizerConfig;
use crate::event::{KeyEvent, PointerSample};
use crate::recognizer::TouchExploration;
use crate::sink::AccessibilityEventSink;

// -- Features -------------------------------------------------

/// A single accessibility input feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    TouchExploration,
    MouseAutoclick,
    ScreenMagnification,
    WindowMagnification,
    KeyEventFilter,
    TouchInjection,
}

/// Bitmask of enabled [`Feature`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Features(u32);

impl Features {
    pub const TOUCH_EXPLORATION: Features = Features(1 << 0);
    pub const MOUSE_AUTOCLICK: Features = Features(1 << 1);
    pub const SCREEN_MAGNIFICATION: Features = Features(1 << 2);
    pub const WINDOW_MAGNIFICATION: Features = Features(1 << 3);
    pub const KEY_EVENT_FILTER: Features = Features(1 << 4);
    pub const TOUCH_INJECTION: Features = Features(1 << 5);

    pub const fn empty() -> Self {
        Features(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Features) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Features) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Features) {
        self.0 &= !other.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the individual features set in this mask.
    pub fn iter(self) -> impl Iterator<Item = Feature> {
        Feature::iter().filter(move |f| self.contains((*f).into()))
    }
}

impl BitOr for Features {
    type Output = Features;

    fn bitor(self, rhs: Features) -> Features {
        Features(self.0 | rhs.0)
    }
}

impl From<Feature> for Features {
    fn from(feature: Feature) -> Self {
        match feature {
            Feature::TouchExploration => Features::TOUCH_EXPLORATION,
            Feature::MouseAutoclick => Features::MOUSE_AUTOCLICK,
            Feature::ScreenMagnification => Features::SCREEN_MAGNIFICATION,
            Feature::WindowMagnification => Features::WINDOW_MAGNIFICATION,
            Feature::KeyEventFilter => Features::KEY_EVENT_FILTER,
            Feature::TouchInjection => Features::TOUCH_INJECTION,
        }
    }
}

// -- Stages ---------------------------------------------------

/// One processing stage of the transmission chain.
pub trait EventStage: Send {
    fn name(&self) -> &'static str;

    /// Returns `true` if the event was consumed.
    fn on_pointer_event(&mut self, event: &PointerSample, next: &mut Downstream<'_>) -> bool;

    fn on_key_event(&mut self, _event: &KeyEvent, _next: &mut Downstream<'_>) -> bool {
        false
    }

    /// Earliest pending timeout of this stage.
    fn next_deadline(&self) -> Option<Duration> {
        None
    }

    /// Fire the earliest timeout due at or before `now`, if any.
    fn on_timer(&mut self, _now: Duration, _next: &mut Downstream<'_>) {}

    /// Release timers and buffers before the stage is discarded.
    fn destroy_events(&mut self) {}
}

/// The part of the chain after the current stage.
pub struct Downstream<'a> {
    stages: &'a mut [Box<dyn EventStage>],
}

impl<'a> Downstream<'a> {
    pub fn new(stages: &'a mut [Box<dyn EventStage>]) -> Self {
        Self { stages }
    }

    /// Deliver `event` to the next stage (and onward if it is not consumed).
    pub fn send_pointer(&mut self, event: &PointerSample) -> bool {
        dispatch_pointer(self.stages, event)
    }

    pub fn send_key(&mut self, event: &KeyEvent) -> bool {
        dispatch_key(self.stages, event)
    }
}

fn dispatch_pointer(stages: &mut [Box<dyn EventStage>], event: &PointerSample) -> bool {
    let Some((head, tail)) = stages.split_first_mut() else {
        return false;
    };
    if head.on_pointer_event(event, &mut Downstream::new(tail)) {
        return true;
    }
    dispatch_pointer(tail, event)
}

fn dispatch_key(stages: &mut [Box<dyn EventStage>], event: &KeyEvent) -> bool {
    let Some((head, tail)) = stages.split_first_mut() else {
        return false;
    };
    if head.on_key_event(event, &mut Downstream::new(tail)) {
        return true;
    }
    dispatch_key(tail, event)
}

/// The platform's normal input-delivery path.
pub trait PointerOutput: Send + Sync {
    fn deliver_pointer(&self, event: &PointerSample);
    fn deliver_key(&self, event: &KeyEvent);
}

/// Terminal stage: hands every event to a [`PointerOutput`].
pub struct InputSink {
    output: Arc<dyn PointerOutput>,
}

impl InputSink {
    pub fn new(output: Arc<dyn PointerOutput>) -> Self {
        Self { output }
    }
}

impl EventStage for InputSink {
    fn name(&self) -> &'static str {
        "input_sink"
    }

    fn on_pointer_event(&mut self, event: &PointerSample, _next: &mut Downstream<'_>) -> bool {
        self.output.deliver_pointer(event);
        true
    }

    fn on_key_event(&mut self, event: &KeyEvent, _next: &mut Downstream<'_>) -> bool {
        self.output.deliver_key(event);
        true
    }
}

// -- Assembly -------------------------------------------------

/// Owns the transmission chain and rebuilds it when features change.
///
/// All dispatch and timer firing happens on the thread that owns the
/// interceptor; reconfiguration needs `&mut self`, so it can never race the
/// event path.
pub struct InputInterceptor {
    stages: Vec<Box<dyn EventStage>>,
    features: Features,
    recognizer: RecognizerConfig,
    sink: Arc<dyn AccessibilityEventSink>,
    output: Arc<dyn PointerOutput>,
}

impl InputInterceptor {
    pub fn new(
        recognizer: RecognizerConfig,
        sink: Arc<dyn AccessibilityEventSink>,
        output: Arc<dyn PointerOutput>,
    ) -> Self {
        let mut interceptor = Self {
            stages: Vec::new(),
            features: Features::empty(),
            recognizer,
            sink,
            output,
        };
        interceptor.build();
        interceptor
    }

    pub fn features(&self) -> Features {
        self.features
    }

    /// Stage names in dispatch order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Tear down the current chain and assemble one for `features`.
    pub fn set_features(&mut self, features: Features) {
        if !self.stages.is_empty() && features == self.features {
            return;
        }
        self.destroy_events();
        self.features = features;
        self.build();
        info!(
            "Input chain rebuilt (features {:#x}): {}",
            features.bits(),
            self.stage_names().join(" -> ")
        );
    }

    fn build(&mut self) {
        for feature in self.features.iter() {
            match feature {
                Feature::TouchExploration => self.stages.push(Box::new(TouchExploration::new(
                    self.recognizer.clone(),
                    Arc::clone(&self.sink),
                ))),
                other => debug!("Feature '{other}' has no stage in this service – skipping"),
            }
        }
        self.stages
            .push(Box::new(InputSink::new(Arc::clone(&self.output))));
    }

    /// Dispatch a pointer sample, firing any timers due before it first.
    pub fn on_pointer_event(&mut self, event: &PointerSample) -> bool {
        self.advance_to(event.time);
        dispatch_pointer(&mut self.stages, event)
    }

    pub fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        self.advance_to(event.time);
        dispatch_key(&mut self.stages, event)
    }

    /// Earliest pending timeout across all stages.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.stages.iter().filter_map(|s| s.next_deadline()).min()
    }

    /// Fire every timeout due at or before `now`, in deadline order.
    pub fn advance_to(&mut self, now: Duration) {
        loop {
            let due = self
                .stages
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.next_deadline().map(|d| (d, i)))
                .filter(|(d, _)| *d <= now)
                .min();
            let Some((deadline, index)) = due else {
                break;
            };
            let Some((stage, tail)) = self.stages[index..].split_first_mut() else {
                break;
            };
            stage.on_timer(deadline, &mut Downstream::new(tail));
        }
    }

    /// Let every stage release its resources and drop the chain.
    pub fn destroy_events(&mut self) {
        for stage in &mut self.stages {
            stage.destroy_events();
        }
        self.stages.clear();
    }
}

impl Drop for InputInterceptor {
    fn drop(&mut self) {
        self.destroy_events();
    }
}
