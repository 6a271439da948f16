//! Touch exploration: the gesture recognition state machine.
//!
//! [`TouchExploration`] is a transmission-chain stage.  Every pointer sample
//! and every timer fire enters through one [`Input`] and one `dispatch`,
//! which matches on the current [`RecognizerState`].  One-finger handlers
//! live in `one_finger`, the multi-finger families in `multi_finger`.
//!
//! Outputs go two ways: semantic events (touch begin/end, gestures) to the
//! [`AccessibilityEventSink`], synthesized pointer events (hover, drag) to the
//! next chain stage.

mod multi_finger;
mod one_finger;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace};
use strum::{Display, EnumIter};

use crate::chain::{Downstream, EventStage};
use crate::config::RecognizerConfig;
use crate::event::{Point, PointerAction, PointerSample, SourceType};
use crate::gesture::{GestureId, MAX_FINGERS};
use crate::multi_tap::TapRecord;
use crate::sink::{AccessibilityEventSink, TouchLifecycle};
use crate::swipe::{FingerTrajectory, MultiFingerSwipeState};
use crate::timer::DelayedQueue;

/// Most one-finger samples kept for a hover replay.  A swipe that is still
/// going when the buffer fills is treated as exploration.
const MAX_BUFFERED_SAMPLES: usize = 512;

/// States of the recognizer.  Exactly one is live at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum RecognizerState {
    Init,
    PassingThrough,
    Invalid,
    OneFingerDown,
    OneFingerLongPress,
    OneFingerSwipe,
    OneFingerSingleTap,
    OneFingerSingleTapThenDown,
    OneFingerDoubleTapAndLongPress,
    TwoFingersDown,
    TwoFingersDrag,
    TwoFingersTap,
    TwoFingersContinueDown,
    TwoFingersUnknown,
    ThreeFingersDown,
    ThreeFingersSwipe,
    ThreeFingersTap,
    ThreeFingersContinueDown,
    FourFingersDown,
    FourFingersSwipe,
    FourFingersTap,
    FourFingersContinueDown,
}

impl RecognizerState {
    /// Finger count of the multi-finger families, `None` for everything else.
    pub fn finger_count(self) -> Option<usize> {
        use RecognizerState::*;

        match self {
            TwoFingersDown | TwoFingersDrag | TwoFingersTap | TwoFingersContinueDown
            | TwoFingersUnknown => Some(2),
            ThreeFingersDown | ThreeFingersSwipe | ThreeFingersTap | ThreeFingersContinueDown => {
                Some(3)
            }
            FourFingersDown | FourFingersSwipe | FourFingersTap | FourFingersContinueDown => {
                Some(4)
            }
            _ => None,
        }
    }

    fn fingers_down(fingers: usize) -> Self {
        match fingers {
            2 => Self::TwoFingersDown,
            3 => Self::ThreeFingersDown,
            _ => Self::FourFingersDown,
        }
    }

    fn fingers_tap(fingers: usize) -> Self {
        match fingers {
            2 => Self::TwoFingersTap,
            3 => Self::ThreeFingersTap,
            _ => Self::FourFingersTap,
        }
    }

    fn fingers_continue_down(fingers: usize) -> Self {
        match fingers {
            2 => Self::TwoFingersContinueDown,
            3 => Self::ThreeFingersContinueDown,
            _ => Self::FourFingersContinueDown,
        }
    }

    /// Two-finger motion is a drag, so only three and four fingers swipe.
    fn fingers_swipe(fingers: usize) -> Self {
        match fingers {
            3 => Self::ThreeFingersSwipe,
            _ => Self::FourFingersSwipe,
        }
    }
}

/// Named timeouts.  At most one of each is pending at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerTag {
    /// Double-tap window after a one-finger tap; firing confirms a single tap.
    HoverMessage,
    LongPress,
    DoubleTapAndLongPress,
    /// The one-finger swipe stalled.
    SwipeComplete,
    /// Window in which more fingers may join the current contact.
    WaitAnotherFinger,
    /// Window for the next tap after `taps` taps with `fingers` fingers.
    MultiTap { fingers: usize, taps: u8 },
    /// Contact number `taps` with `fingers` fingers held down.
    MultiHold { fingers: usize, taps: u8 },
}

/// Everything the state machine reacts to.
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    Pointer(&'a PointerSample),
    TimerFired(TimerTag),
}

/// The one pointer touch exploration forwards as ordinary touch input.
#[derive(Debug, Clone, PartialEq)]
pub struct DraggingContext {
    pub pointer_id: i32,
    /// Second finger of a two-finger drag.
    pub other_id: Option<i32>,
    /// Sample that started the drag.
    pub down: PointerSample,
    /// Forward the midpoint of both fingers instead of the dragging finger.
    pub centered: bool,
}

/// Tap bookkeeping for one multi-finger group.
#[derive(Debug, Clone, Copy)]
struct TapGroup {
    fingers: usize,
    /// Number of the current contact, 1-based.
    taps: u8,
    /// When the current contact started.
    contact_start: Duration,
    previous: Option<TapRecord>,
    held: bool,
    lifted: bool,
}

impl TapGroup {
    fn new(fingers: usize, contact_start: Duration) -> Self {
        Self {
            fingers,
            taps: 1,
            contact_start,
            previous: None,
            held: false,
            lifted: false,
        }
    }
}

/// Everything that lives for one touch interaction, from the first finger
/// down to the return to `Init`.
#[derive(Debug, Default)]
struct Session {
    begun: bool,
    down_ids: BTreeSet<i32>,
    primary: Option<i32>,
    base_points: BTreeMap<i32, Point>,
    /// One-finger samples buffered until they become hover events.
    received: Vec<PointerSample>,
    last_sample: Option<PointerSample>,
    /// Pointer and location of a tap waiting for a possible second tap.
    single_tap: Option<(i32, Point)>,
    exploring: bool,
    dragging: Option<DraggingContext>,
    group: Option<TapGroup>,
}

struct Ctx<'a, 'b> {
    now: Duration,
    next: &'a mut Downstream<'b>,
}

/// The touch-exploration stage.
pub struct TouchExploration {
    config: RecognizerConfig,
    sink: Arc<dyn AccessibilityEventSink>,
    state: RecognizerState,
    /// Payload is the state a timer was scheduled in.
    timers: DelayedQueue<TimerTag, RecognizerState>,
    session: Session,
    trajectory: FingerTrajectory,
    swipe: MultiFingerSwipeState,
}

impl TouchExploration {
    pub fn new(config: RecognizerConfig, sink: Arc<dyn AccessibilityEventSink>) -> Self {
        Self {
            trajectory: FingerTrajectory::new(config.move_threshold),
            swipe: MultiFingerSwipeState::new(config.move_threshold, config.swipe_axis_cosine),
            config,
            sink,
            state: RecognizerState::Init,
            timers: DelayedQueue::new(),
            session: Session::default(),
        }
    }

    pub fn state(&self) -> RecognizerState {
        self.state
    }

    pub fn is_timer_pending(&self, tag: TimerTag) -> bool {
        self.timers.is_pending(tag)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn dragging(&self) -> Option<&DraggingContext> {
        self.session.dragging.as_ref()
    }

    fn dispatch(&mut self, input: Input<'_>, ctx: &mut Ctx<'_, '_>) -> bool {
        if let Input::Pointer(event) = input {
            self.session.last_sample = Some(event.clone());
            if self.is_tracking() && !self.check_sequence(event, ctx) {
                return true;
            }
        }

        use RecognizerState::*;
        match self.state {
            Init => self.on_init(input, ctx),
            PassingThrough => self.on_passing_through(input),
            Invalid => self.on_invalid(input, ctx),
            OneFingerDown => self.on_one_finger_down(input, ctx),
            OneFingerLongPress => self.on_one_finger_long_press(input, ctx),
            OneFingerSwipe => self.on_one_finger_swipe(input, ctx),
            OneFingerSingleTap => self.on_one_finger_single_tap(input, ctx),
            OneFingerSingleTapThenDown => self.on_single_tap_then_down(input, ctx),
            OneFingerDoubleTapAndLongPress => self.on_double_tap_and_long_press(input, ctx),
            TwoFingersDrag => self.on_two_fingers_drag(input, ctx),
            TwoFingersUnknown => self.on_two_fingers_unknown(input, ctx),
            TwoFingersDown | ThreeFingersDown | FourFingersDown => {
                self.on_fingers_down(input, ctx)
            }
            TwoFingersTap | ThreeFingersTap | FourFingersTap => self.on_fingers_tap(input, ctx),
            TwoFingersContinueDown | ThreeFingersContinueDown | FourFingersContinueDown => {
                self.on_fingers_continue_down(input, ctx)
            }
            ThreeFingersSwipe | FourFingersSwipe => self.on_fingers_swipe(input, ctx),
        }
    }

    /// States that follow an interaction pointer by pointer.
    fn is_tracking(&self) -> bool {
        !matches!(
            self.state,
            RecognizerState::Init | RecognizerState::PassingThrough | RecognizerState::Invalid
        )
    }

    /// Reject cancels, duplicate downs, ups for unknown pointers and a fifth
    /// finger.  Returns `false` after moving to `Invalid`.
    fn check_sequence(&mut self, event: &PointerSample, ctx: &mut Ctx<'_, '_>) -> bool {
        let valid = match event.action {
            PointerAction::Cancel => false,
            PointerAction::Down => {
                self.session.down_ids.insert(event.pointer_id)
                    && event.pressed_count() <= MAX_FINGERS
            }
            PointerAction::Up => self.session.down_ids.remove(&event.pointer_id),
            _ => true,
        };
        if !valid {
            debug!(
                "Unexpected {:?} for pointer {} in {} – invalidating",
                event.action, event.pointer_id, self.state
            );
            self.enter_invalid(ctx);
            self.on_invalid(Input::Pointer(event), ctx);
        }
        valid
    }

    fn on_invalid(&mut self, input: Input<'_>, ctx: &mut Ctx<'_, '_>) -> bool {
        if let Input::Pointer(event) = input
            && matches!(event.action, PointerAction::Up | PointerAction::Cancel)
            && event.pressed_count() == 0
        {
            self.finish_touch();
        }
        true
    }

    fn on_passing_through(&mut self, input: Input<'_>) -> bool {
        if let Input::Pointer(event) = input
            && matches!(event.action, PointerAction::Up | PointerAction::Cancel)
            && event.pressed_count() == 0
        {
            self.set_state(RecognizerState::Init);
        }
        false
    }

    // -- Shared helpers -------------------------------------------

    fn set_state(&mut self, next: RecognizerState) {
        if self.state != next {
            debug!("Touch exploration: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Schedule `tag` on behalf of the current state.
    fn schedule(&mut self, tag: TimerTag, delay: Duration, now: Duration) {
        self.timers.schedule(tag, delay, now, self.state);
    }

    fn cancel(&mut self, tag: TimerTag) {
        self.timers.cancel(tag);
    }

    fn emit_gesture(&self, gesture: GestureId) {
        info!("Gesture recognized: {gesture}");
        self.sink.emit_gesture_completed(gesture);
    }

    fn begin_touch(&mut self) {
        if !self.session.begun {
            self.session.begun = true;
            self.sink.emit_semantic_touch_event(TouchLifecycle::Begin);
        }
    }

    /// End the interaction and return to `Init`.
    fn finish_touch(&mut self) {
        self.timers.cancel_all();
        if self.session.begun {
            self.sink.emit_semantic_touch_event(TouchLifecycle::End);
        }
        self.session = Session::default();
        self.trajectory.clear();
        self.swipe.clear();
        self.set_state(RecognizerState::Init);
    }

    /// Abandon recognition until every finger has lifted.  Open hover or
    /// drag streams downstream are closed first.
    fn enter_invalid(&mut self, ctx: &mut Ctx<'_, '_>) {
        self.timers.cancel_all();
        if self.session.exploring {
            self.session.exploring = false;
            if let Some((id, point)) = self.primary_point() {
                self.send(ctx, PointerAction::HoverExit, id, point);
            }
        }
        if let Some(drag) = self.session.dragging.take() {
            let point = self.drag_point(&drag).unwrap_or_else(|| {
                drag.down.position(drag.pointer_id).unwrap_or_default()
            });
            self.send(ctx, PointerAction::Cancel, drag.pointer_id, point);
        }
        self.session.received.clear();
        self.session.single_tap = None;
        self.session.group = None;
        self.trajectory.clear();
        self.swipe.clear();
        self.set_state(RecognizerState::Invalid);
    }

    /// Send a synthesized single-pointer event to the next stage.
    fn send(&self, ctx: &mut Ctx<'_, '_>, action: PointerAction, id: i32, point: Point) {
        trace!("Forwarding {action:?} for pointer {id} at ({}, {})", point.x, point.y);
        ctx.next
            .send_pointer(&PointerSample::single(ctx.now, action, id, point));
    }

    /// Latest known position of the primary pointer.
    fn primary_point(&self) -> Option<(i32, Point)> {
        let id = self.session.primary?;
        let point = self.session.last_sample.as_ref()?.position(id)?;
        Some((id, point))
    }

    /// Take every pressed pointer of `event` as a fresh starting position.
    fn reset_base_points(&mut self, event: &PointerSample) {
        self.session.base_points = event
            .pointers
            .iter()
            .filter(|(_, p)| p.pressed)
            .map(|(id, p)| (*id, p.point()))
            .collect();
    }

    /// Record a starting position for pressed pointers seen for the first time.
    fn note_base_points(&mut self, event: &PointerSample) {
        for (id, p) in event.pointers.iter().filter(|(_, p)| p.pressed) {
            self.session.base_points.entry(*id).or_insert_with(|| p.point());
        }
    }

    fn base_point(&self) -> Option<Point> {
        self.session
            .base_points
            .get(&self.session.primary?)
            .copied()
    }

    /// Position forwarded for an active drag, from the latest sample.
    fn drag_point(&self, drag: &DraggingContext) -> Option<Point> {
        let sample = self.session.last_sample.as_ref()?;
        let point = sample.position(drag.pointer_id)?;
        match drag.other_id.and_then(|id| sample.position(id)) {
            Some(other) if drag.centered => Some(point.midpoint(&other)),
            _ => Some(point),
        }
    }
}

impl EventStage for TouchExploration {
    fn name(&self) -> &'static str {
        "touch_exploration"
    }

    fn on_pointer_event(&mut self, event: &PointerSample, next: &mut Downstream<'_>) -> bool {
        if event.source != SourceType::Touchscreen {
            return false;
        }
        if matches!(
            event.action,
            PointerAction::HoverEnter | PointerAction::HoverMove | PointerAction::HoverExit
        ) {
            return false;
        }
        let mut ctx = Ctx {
            now: event.time,
            next,
        };
        self.dispatch(Input::Pointer(event), &mut ctx)
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    fn on_timer(&mut self, now: Duration, next: &mut Downstream<'_>) {
        let Some((tag, scheduled_in)) = self.timers.pop_due(now) else {
            return;
        };
        if scheduled_in != self.state {
            trace!("Stale {tag:?} (scheduled in {scheduled_in}, now {})", self.state);
            return;
        }
        let mut ctx = Ctx { now, next };
        self.dispatch(Input::TimerFired(tag), &mut ctx);
    }

    fn destroy_events(&mut self) {
        self.timers.cancel_all();
        self.trajectory.clear();
        self.swipe.clear();
        self.session = Session::default();
        self.state = RecognizerState::Init;
    }
}
