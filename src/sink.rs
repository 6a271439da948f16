//! One-way notification sinks towards the accessibility event pipeline.
use std::sync::mpsc::Sender;

use log::trace;

use crate::gesture::GestureId;

/// Semantic touch lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchLifecycle {
    Begin,
    End,
}

/// Everything touch exploration reports to assistive clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessibilityEvent {
    Touch(TouchLifecycle),
    Gesture(GestureId),
}

/// Receiver of semantic outputs.  Calls must not block; delivery failures are
/// the sink's problem and never reach the recognizer.
pub trait AccessibilityEventSink: Send + Sync {
    fn emit_semantic_touch_event(&self, lifecycle: TouchLifecycle);
    fn emit_gesture_completed(&self, gesture: GestureId);
}

/// Forwards events over an mpsc channel.  A hung-up receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<AccessibilityEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<AccessibilityEvent>) -> Self {
        Self { tx }
    }
}

impl AccessibilityEventSink for ChannelSink {
    fn emit_semantic_touch_event(&self, lifecycle: TouchLifecycle) {
        if self.tx.send(AccessibilityEvent::Touch(lifecycle)).is_err() {
            trace!("No subscriber for touch {lifecycle:?}");
        }
    }

    fn emit_gesture_completed(&self, gesture: GestureId) {
        if self.tx.send(AccessibilityEvent::Gesture(gesture)).is_err() {
            trace!("No subscriber for gesture {gesture}");
        }
    }
}

/// Drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AccessibilityEventSink for NullSink {
    fn emit_semantic_touch_event(&self, _lifecycle: TouchLifecycle) {}

    fn emit_gesture_completed(&self, _gesture: GestureId) {}
}
