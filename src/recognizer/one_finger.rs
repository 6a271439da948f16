//! One-finger states: exploration, swipes, taps and double taps.
use log::debug;

use super::{
    Ctx, DraggingContext, Input, MAX_BUFFERED_SAMPLES, RecognizerState, TimerTag,
    TouchExploration,
};
use crate::event::{PointerAction, PointerSample};
use crate::gesture::GestureId;
use crate::swipe::classify_path;

impl TouchExploration {
    pub(super) fn on_init(&mut self, input: Input<'_>, ctx: &mut Ctx<'_, '_>) -> bool {
        let Input::Pointer(event) = input else {
            return true;
        };
        match event.action {
            PointerAction::Down if event.pressed_count() == 1 => {
                self.start_touch(event, ctx);
                true
            }
            _ => {
                if event.pressed_count() > 0 {
                    debug!("Contact already in progress – passing it through");
                    self.set_state(RecognizerState::PassingThrough);
                }
                false
            }
        }
    }

    /// First finger of a new interaction.
    pub(super) fn start_touch(&mut self, event: &PointerSample, ctx: &mut Ctx<'_, '_>) {
        self.begin_touch();
        self.session.down_ids = event.pressed_ids().collect();
        self.session.primary = Some(event.pointer_id);
        self.reset_base_points(event);
        self.session.received = vec![event.clone()];
        self.set_state(RecognizerState::OneFingerDown);
        self.schedule(TimerTag::LongPress, self.config.long_press_timeout, ctx.now);
    }

    pub(super) fn on_one_finger_down(&mut self, input: Input<'_>, ctx: &mut Ctx<'_, '_>) -> bool {
        let event = match input {
            Input::TimerFired(TimerTag::LongPress) => {
                self.start_exploring(ctx);
                return true;
            }
            Input::TimerFired(_) => return true,
            Input::Pointer(event) => event,
        };
        match event.action {
            PointerAction::Down => self.start_multi_finger(event, ctx),
            PointerAction::Move => {
                self.session.received.push(event.clone());
                if self.moved_beyond_threshold(event) {
                    self.begin_swipe(event, ctx);
                }
            }
            PointerAction::Up if event.pressed_count() == 0 => {
                self.timers.cancel_all();
                self.session.single_tap = event.acting_position().map(|p| (event.pointer_id, p));
                self.set_state(RecognizerState::OneFingerSingleTap);
                self.schedule(TimerTag::HoverMessage, self.config.double_tap_timeout, ctx.now);
            }
            _ => {}
        }
        true
    }

    pub(super) fn on_one_finger_long_press(
        &mut self,
        input: Input<'_>,
        ctx: &mut Ctx<'_, '_>,
    ) -> bool {
        let Input::Pointer(event) = input else {
            return true;
        };
        match event.action {
            PointerAction::Down => {
                debug!("Second finger during exploration");
                self.enter_invalid(ctx);
            }
            PointerAction::Move => {
                if let Some((id, point)) = self.primary_point() {
                    self.send(ctx, PointerAction::HoverMove, id, point);
                }
            }
            PointerAction::Up if event.pressed_count() == 0 => {
                if let Some(point) = event.acting_position() {
                    self.send(ctx, PointerAction::HoverExit, event.pointer_id, point);
                }
                self.session.exploring = false;
                self.finish_touch();
            }
            _ => {}
        }
        true
    }

    pub(super) fn on_one_finger_swipe(&mut self, input: Input<'_>, ctx: &mut Ctx<'_, '_>) -> bool {
        let event = match input {
            Input::TimerFired(TimerTag::SwipeComplete) => {
                debug!("Swipe stalled – switching to exploration");
                self.start_exploring(ctx);
                return true;
            }
            Input::TimerFired(_) => return true,
            Input::Pointer(event) => event,
        };
        match event.action {
            PointerAction::Down => self.start_multi_finger(event, ctx),
            PointerAction::Move => {
                self.session.received.push(event.clone());
                if self.session.received.len() >= MAX_BUFFERED_SAMPLES {
                    debug!("Swipe path too long – switching to exploration");
                    self.start_exploring(ctx);
                    return true;
                }
                if let Some(point) = event.acting_position()
                    && self.trajectory.record(point, event.time)
                {
                    self.schedule(
                        TimerTag::SwipeComplete,
                        self.config.swipe_complete_timeout,
                        ctx.now,
                    );
                }
            }
            PointerAction::Up if event.pressed_count() == 0 => {
                if let Some(point) = event.acting_position() {
                    self.trajectory.record(point, event.time);
                }
                self.trajectory.finish();
                match classify_path(&self.trajectory, &self.config) {
                    Some(gesture) => self.emit_gesture(gesture),
                    None => {
                        debug!("Path is not a swipe – replaying it as exploration");
                        self.start_exploring(ctx);
                        if let Some(point) = event.acting_position() {
                            self.send(ctx, PointerAction::HoverExit, event.pointer_id, point);
                        }
                        self.session.exploring = false;
                    }
                }
                self.finish_touch();
            }
            _ => {}
        }
        true
    }

    pub(super) fn on_one_finger_single_tap(
        &mut self,
        input: Input<'_>,
        ctx: &mut Ctx<'_, '_>,
    ) -> bool {
        let event = match input {
            Input::TimerFired(TimerTag::HoverMessage) => {
                self.confirm_single_tap(ctx);
                self.finish_touch();
                return true;
            }
            Input::TimerFired(_) => return true,
            Input::Pointer(event) => event,
        };
        if event.action != PointerAction::Down {
            return true;
        }

        let near = match (self.session.single_tap, event.acting_position()) {
            (Some((_, tap)), Some(down)) => tap.distance_to(&down) <= self.config.double_tap_slop,
            _ => false,
        };
        if !near {
            debug!("Second tap too far from the first – starting over");
            self.confirm_single_tap(ctx);
            self.finish_touch();
            self.start_touch(event, ctx);
            return true;
        }

        self.timers.cancel_all();
        self.session.primary = Some(event.pointer_id);
        if let Some(point) = event.acting_position() {
            self.session.base_points.clear();
            self.session.base_points.insert(event.pointer_id, point);
        }
        self.session.received = vec![event.clone()];
        self.set_state(RecognizerState::OneFingerSingleTapThenDown);
        self.schedule(
            TimerTag::DoubleTapAndLongPress,
            self.config.long_press_timeout,
            ctx.now,
        );
        true
    }

    pub(super) fn on_single_tap_then_down(
        &mut self,
        input: Input<'_>,
        ctx: &mut Ctx<'_, '_>,
    ) -> bool {
        let event = match input {
            Input::TimerFired(TimerTag::DoubleTapAndLongPress) => {
                self.start_double_tap_drag(ctx);
                return true;
            }
            Input::TimerFired(_) => return true,
            Input::Pointer(event) => event,
        };
        match event.action {
            PointerAction::Down => {
                self.confirm_single_tap(ctx);
                self.start_multi_finger(event, ctx);
            }
            PointerAction::Move => {
                self.session.received.push(event.clone());
                if self.moved_beyond_threshold(event) {
                    self.confirm_single_tap(ctx);
                    self.begin_swipe(event, ctx);
                }
            }
            PointerAction::Up if event.pressed_count() == 0 => {
                self.session.single_tap = None;
                self.emit_gesture(GestureId::DoubleTap);
                self.finish_touch();
            }
            _ => {}
        }
        true
    }

    pub(super) fn on_double_tap_and_long_press(
        &mut self,
        input: Input<'_>,
        ctx: &mut Ctx<'_, '_>,
    ) -> bool {
        let Input::Pointer(event) = input else {
            return true;
        };
        match event.action {
            PointerAction::Down => self.enter_invalid(ctx),
            PointerAction::Move => {
                if let Some((id, point)) = self.primary_point() {
                    self.send(ctx, PointerAction::Move, id, point);
                }
            }
            PointerAction::Up if event.pressed_count() == 0 => {
                if let Some(point) = event.acting_position() {
                    self.send(ctx, PointerAction::Up, event.pointer_id, point);
                }
                self.session.dragging = None;
                self.finish_touch();
            }
            _ => {}
        }
        true
    }

    // -- Transitions --------------------------------------------

    fn moved_beyond_threshold(&self, event: &PointerSample) -> bool {
        match (self.base_point(), event.acting_position()) {
            (Some(base), Some(point)) => base.distance_to(&point) > self.config.move_threshold,
            _ => false,
        }
    }

    /// Start tracking a one-finger swipe from the buffered samples.
    fn begin_swipe(&mut self, event: &PointerSample, ctx: &mut Ctx<'_, '_>) {
        self.timers.cancel_all();
        self.set_state(RecognizerState::OneFingerSwipe);

        let id = event.pointer_id;
        let mut positions = self
            .session
            .received
            .iter()
            .filter_map(|s| Some((s.position(id)?, s.time)));
        if let Some((start, time)) = positions.next() {
            self.trajectory.begin(start, time);
        }
        for (point, time) in positions {
            self.trajectory.record(point, time);
        }
        self.schedule(
            TimerTag::SwipeComplete,
            self.config.swipe_complete_timeout,
            ctx.now,
        );
    }

    /// Enter exploration, replaying what was buffered so far as hover events.
    fn start_exploring(&mut self, ctx: &mut Ctx<'_, '_>) {
        self.timers.cancel_all();
        self.trajectory.clear();
        self.set_state(RecognizerState::OneFingerLongPress);

        let received = std::mem::take(&mut self.session.received);
        let (Some(id), Some(base)) = (self.session.primary, self.base_point()) else {
            return;
        };
        self.session.exploring = true;
        self.send(ctx, PointerAction::HoverEnter, id, base);
        for point in received.iter().skip(1).filter_map(|s| s.position(id)) {
            self.send(ctx, PointerAction::HoverMove, id, point);
        }
    }

    /// Deliver a pending single tap as a hover enter/exit pair.
    fn confirm_single_tap(&mut self, ctx: &mut Ctx<'_, '_>) {
        if let Some((id, point)) = self.session.single_tap.take() {
            self.send(ctx, PointerAction::HoverEnter, id, point);
            self.send(ctx, PointerAction::HoverExit, id, point);
        }
    }

    fn start_double_tap_drag(&mut self, ctx: &mut Ctx<'_, '_>) {
        self.session.single_tap = None;
        self.emit_gesture(GestureId::DoubleTapAndHold);
        self.set_state(RecognizerState::OneFingerDoubleTapAndLongPress);

        let (Some((id, point)), Some(down)) =
            (self.primary_point(), self.session.last_sample.clone())
        else {
            return;
        };
        self.session.dragging = Some(DraggingContext {
            pointer_id: id,
            other_id: None,
            down,
            centered: false,
        });
        self.send(ctx, PointerAction::Down, id, point);
    }
}
