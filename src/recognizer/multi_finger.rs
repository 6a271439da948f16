//! Two- to four-finger states: multi-taps, holds, drags and swipes.
use log::debug;

use super::{Ctx, DraggingContext, Input, RecognizerState, TapGroup, TimerTag, TouchExploration};
use crate::event::{PointerAction, PointerSample};
use crate::gesture::{MAX_FINGERS, MAX_TAP_COUNT, multi_finger_swipe, tap_gesture};
use crate::multi_tap::{TapRecord, classify_hold, classify_multi_tap};
use crate::swipe::classify_swipe;

impl TouchExploration {
    /// A second finger joined a one-finger interaction.
    pub(super) fn start_multi_finger(&mut self, event: &PointerSample, ctx: &mut Ctx<'_, '_>) {
        self.timers.cancel_all();
        self.trajectory.clear();
        self.session.received.clear();
        self.session.single_tap = None;
        self.session.group = Some(TapGroup::new(event.pressed_count(), ctx.now));
        self.enter_fingers_down(event, ctx);
    }

    /// All fingers of a contact are down: arm the join window and the hold
    /// timer for the current tap.
    fn enter_fingers_down(&mut self, event: &PointerSample, ctx: &mut Ctx<'_, '_>) {
        let fingers = event.pressed_count().clamp(2, MAX_FINGERS);
        let group = self
            .session
            .group
            .get_or_insert_with(|| TapGroup::new(fingers, ctx.now));
        if group.taps == 1 {
            group.contact_start = ctx.now;
        }
        group.fingers = fingers;
        group.held = false;
        group.lifted = false;
        let taps = group.taps;

        self.reset_base_points(event);
        self.swipe.start(event);

        self.cancel_group_timers();
        self.set_state(RecognizerState::fingers_down(fingers));
        self.schedule(
            TimerTag::WaitAnotherFinger,
            self.config.finger_join_interval,
            ctx.now,
        );
        self.schedule(
            TimerTag::MultiHold { fingers, taps },
            self.config.long_press_timeout,
            ctx.now,
        );
    }

    fn cancel_group_timers(&mut self) {
        self.cancel(TimerTag::WaitAnotherFinger);
        for fingers in 2..=MAX_FINGERS {
            for taps in 1..=MAX_TAP_COUNT {
                self.cancel(TimerTag::MultiTap { fingers, taps });
                self.cancel(TimerTag::MultiHold { fingers, taps });
            }
        }
    }

    pub(super) fn on_fingers_down(&mut self, input: Input<'_>, ctx: &mut Ctx<'_, '_>) -> bool {
        let event = match input {
            Input::TimerFired(TimerTag::MultiHold { fingers, taps }) => {
                self.on_hold(fingers, taps, ctx);
                return true;
            }
            Input::TimerFired(_) => return true,
            Input::Pointer(event) => event,
        };
        let Some(group) = self.session.group else {
            self.enter_invalid(ctx);
            return true;
        };

        match event.action {
            PointerAction::Down => {
                let in_window =
                    !group.lifted && self.is_timer_pending(TimerTag::WaitAnotherFinger);
                if !in_window {
                    debug!("Finger joined too late");
                    self.enter_invalid(ctx);
                } else if group.taps == 1 {
                    self.enter_fingers_down(event, ctx);
                } else {
                    debug!("Finger count changed after {} taps", group.taps);
                    self.restart_group(event, ctx);
                }
            }
            PointerAction::Move => {
                self.swipe.record(event);
                if self.swipe.max_displacement(event) <= self.config.move_threshold {
                    return true;
                }
                if group.lifted {
                    self.enter_invalid(ctx);
                } else if group.fingers == 2 {
                    if self.is_drag_accepted(event) {
                        self.begin_drag(event, ctx);
                    } else {
                        self.timers.cancel_all();
                        self.session.group = None;
                        self.set_state(RecognizerState::TwoFingersUnknown);
                    }
                } else {
                    self.timers.cancel_all();
                    self.set_state(RecognizerState::fingers_swipe(group.fingers));
                }
            }
            PointerAction::Up => {
                if let Some(g) = self.session.group.as_mut() {
                    g.lifted = true;
                }
                if event.pressed_count() == 0 {
                    self.complete_tap(ctx);
                }
            }
            _ => {}
        }
        true
    }

    fn on_hold(&mut self, fingers: usize, taps: u8, ctx: &mut Ctx<'_, '_>) {
        let Some(group) = self.session.group.as_mut() else {
            return;
        };
        if group.fingers != fingers || group.taps != taps || group.lifted {
            return;
        }
        let hold = ctx.now.saturating_sub(group.contact_start);
        match classify_hold(fingers, taps - 1, hold, self.config.long_press_timeout) {
            Some(gesture) => {
                self.emit_gesture(gesture);
                self.enter_invalid(ctx);
            }
            None => {
                debug!("{fingers}-finger contact held – no tap on release");
                group.held = true;
            }
        }
    }

    /// Every finger of the contact lifted without moving.
    fn complete_tap(&mut self, ctx: &mut Ctx<'_, '_>) {
        self.cancel_group_timers();
        let Some(group) = self.session.group.as_mut() else {
            self.finish_touch();
            return;
        };
        if group.held {
            self.finish_touch();
            return;
        }

        let (fingers, taps) = (group.fingers, group.taps);
        group.previous = Some(TapRecord {
            end: ctx.now,
            fingers,
            taps,
        });
        if taps >= MAX_TAP_COUNT {
            if let Some(gesture) = tap_gesture(fingers, taps) {
                self.emit_gesture(gesture);
            }
            self.finish_touch();
            return;
        }
        self.set_state(RecognizerState::fingers_tap(fingers));
        self.schedule(
            TimerTag::MultiTap { fingers, taps },
            self.config.multi_tap_interval,
            ctx.now,
        );
    }

    pub(super) fn on_fingers_tap(&mut self, input: Input<'_>, ctx: &mut Ctx<'_, '_>) -> bool {
        let event = match input {
            Input::TimerFired(TimerTag::MultiTap { fingers, taps }) => {
                if let Some(gesture) = tap_gesture(fingers, taps) {
                    self.emit_gesture(gesture);
                }
                self.finish_touch();
                return true;
            }
            Input::TimerFired(_) => return true,
            Input::Pointer(event) => event,
        };
        if event.action != PointerAction::Down {
            return true;
        }
        let Some(group) = self.session.group.as_mut() else {
            self.enter_invalid(ctx);
            return true;
        };

        group.taps = classify_multi_tap(
            group.previous,
            ctx.now,
            group.fingers,
            self.config.multi_tap_interval,
        );
        group.contact_start = ctx.now;
        group.lifted = false;
        group.held = false;
        let fingers = group.fingers;

        self.cancel_group_timers();
        // Slot ids are reused between contacts: positions from the previous
        // tap say nothing about this one.
        self.reset_base_points(event);
        if event.pressed_count() >= fingers {
            self.on_contact_reached(event, ctx);
            return true;
        }
        self.set_state(RecognizerState::fingers_continue_down(fingers));
        self.schedule(
            TimerTag::WaitAnotherFinger,
            self.config.finger_join_interval,
            ctx.now,
        );
        true
    }

    pub(super) fn on_fingers_continue_down(
        &mut self,
        input: Input<'_>,
        ctx: &mut Ctx<'_, '_>,
    ) -> bool {
        let event = match input {
            Input::TimerFired(TimerTag::WaitAnotherFinger) => {
                debug!("Not every finger of the next tap arrived in time");
                if let Some(last) = self.session.last_sample.clone() {
                    self.restart_group(&last, ctx);
                }
                return true;
            }
            Input::TimerFired(_) => return true,
            Input::Pointer(event) => event,
        };
        match event.action {
            PointerAction::Down => self.on_contact_reached(event, ctx),
            PointerAction::Move => {
                self.note_base_points(event);
                if self.moved_beyond_base(event) {
                    self.enter_invalid(ctx);
                }
            }
            PointerAction::Up => {
                self.enter_invalid(ctx);
                if event.pressed_count() == 0 {
                    self.finish_touch();
                }
            }
            _ => {}
        }
        true
    }

    /// A finger arrived for the next tap of the group.
    fn on_contact_reached(&mut self, event: &PointerSample, ctx: &mut Ctx<'_, '_>) {
        let Some(group) = self.session.group else {
            return;
        };
        let count = event.pressed_count();
        if count == group.fingers {
            self.enter_fingers_down(event, ctx);
        } else if count > group.fingers {
            self.restart_group(event, ctx);
        } else {
            self.note_base_points(event);
        }
    }

    /// Finger count changed mid-group: drop earlier taps and count again
    /// from the current contact.
    fn restart_group(&mut self, event: &PointerSample, ctx: &mut Ctx<'_, '_>) {
        self.cancel_group_timers();
        let fingers = event.pressed_count();
        if (2..=MAX_FINGERS).contains(&fingers) {
            self.session.group = Some(TapGroup::new(fingers, ctx.now));
            self.enter_fingers_down(event, ctx);
        } else {
            self.enter_invalid(ctx);
        }
    }

    fn moved_beyond_base(&self, event: &PointerSample) -> bool {
        event.pressed_ids().any(|id| {
            match (self.session.base_points.get(&id), event.position(id)) {
                (Some(base), Some(point)) => base.distance_to(&point) > self.config.move_threshold,
                _ => false,
            }
        })
    }

    // -- Two-finger drag ----------------------------------------

    /// Two fingers moving together, or one of them resting, is a drag.
    fn is_drag_accepted(&self, event: &PointerSample) -> bool {
        let vectors: Vec<(f64, f64)> = event
            .pressed_ids()
            .filter_map(|id| {
                let base = self.session.base_points.get(&id)?;
                Some(event.position(id)?.offset_from(base))
            })
            .collect();
        let [(ax, ay), (bx, by)] = vectors.as_slice() else {
            return false;
        };
        let (la, lb) = (ax.hypot(*ay), bx.hypot(*by));
        if la <= self.config.move_threshold || lb <= self.config.move_threshold {
            return true;
        }
        (ax * bx + ay * by) / (la * lb) >= self.config.drag_cosine
    }

    fn begin_drag(&mut self, event: &PointerSample, ctx: &mut Ctx<'_, '_>) {
        let mut moved: Vec<(f64, i32)> = event
            .pressed_ids()
            .filter_map(|id| {
                let base = self.session.base_points.get(&id)?;
                Some((base.distance_to(&event.position(id)?), id))
            })
            .collect();
        moved.sort_by(|a, b| b.0.total_cmp(&a.0));
        let Some(&(_, pointer_id)) = moved.first() else {
            self.enter_invalid(ctx);
            return;
        };
        let other_id = moved.get(1).map(|(_, id)| *id);
        let centered = match other_id.and_then(|id| event.position(id)) {
            Some(other) => event
                .position(pointer_id)
                .is_some_and(|p| p.distance_to(&other) > self.config.min_pointer_separation),
            None => false,
        };

        self.timers.cancel_all();
        self.session.group = None;
        self.set_state(RecognizerState::TwoFingersDrag);
        let drag = DraggingContext {
            pointer_id,
            other_id,
            down: event.clone(),
            centered,
        };
        let point = self.drag_point(&drag);
        self.session.dragging = Some(drag);
        if let Some(point) = point {
            self.send(ctx, PointerAction::Down, pointer_id, point);
        }
    }

    pub(super) fn on_two_fingers_drag(&mut self, input: Input<'_>, ctx: &mut Ctx<'_, '_>) -> bool {
        let Input::Pointer(event) = input else {
            return true;
        };
        let Some(drag) = self.session.dragging.clone() else {
            self.enter_invalid(ctx);
            return true;
        };
        match event.action {
            PointerAction::Down => self.enter_invalid(ctx),
            PointerAction::Move => {
                if !self.is_drag_accepted(event) {
                    debug!("Fingers diverged – ending drag");
                    self.end_drag(&drag, ctx);
                    self.set_state(RecognizerState::TwoFingersUnknown);
                } else if let Some(point) = self.drag_point(&drag) {
                    self.send(ctx, PointerAction::Move, drag.pointer_id, point);
                }
            }
            PointerAction::Up => {
                self.end_drag(&drag, ctx);
                if event.pressed_count() == 0 {
                    self.finish_touch();
                } else {
                    self.set_state(RecognizerState::TwoFingersUnknown);
                }
            }
            _ => {}
        }
        true
    }

    fn end_drag(&mut self, drag: &DraggingContext, ctx: &mut Ctx<'_, '_>) {
        if let Some(point) = self.drag_point(drag) {
            self.send(ctx, PointerAction::Up, drag.pointer_id, point);
        }
        self.session.dragging = None;
    }

    /// Swallows the contact until every finger lifted.
    pub(super) fn on_two_fingers_unknown(&mut self, input: Input<'_>, _ctx: &mut Ctx<'_, '_>) -> bool {
        if let Input::Pointer(event) = input
            && event.action == PointerAction::Up
            && event.pressed_count() == 0
        {
            self.finish_touch();
        }
        true
    }

    // -- Multi-finger swipe -------------------------------------

    pub(super) fn on_fingers_swipe(&mut self, input: Input<'_>, ctx: &mut Ctx<'_, '_>) -> bool {
        let Input::Pointer(event) = input else {
            return true;
        };
        let fingers = self.state.finger_count().unwrap_or(MAX_FINGERS);
        match event.action {
            PointerAction::Down => self.enter_invalid(ctx),
            PointerAction::Move => {
                self.swipe.record(event);
                if self.swipe.is_invalid() {
                    debug!("Fingers swiped in different directions");
                    self.enter_invalid(ctx);
                }
            }
            PointerAction::Up => {
                self.swipe.record(event);
                let direction = classify_swipe(self.swipe.paths(), &self.config)
                    .filter(|d| !self.swipe.is_invalid() && self.swipe.direction().is_none_or(|l| l == *d));
                match direction.and_then(|d| multi_finger_swipe(fingers, d)) {
                    Some(gesture) => self.emit_gesture(gesture),
                    None => debug!("{fingers}-finger motion is not a swipe"),
                }
                self.enter_invalid(ctx);
                if event.pressed_count() == 0 {
                    self.finish_touch();
                }
            }
            _ => {}
        }
        true
    }
}
