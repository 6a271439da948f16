//! Tap counting and hold classification for multi-finger contacts.
use std::time::Duration;

use crate::gesture::{GestureId, MAX_TAP_COUNT, hold_gesture};

/// A completed tap of a multi-finger group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapRecord {
    /// When the last finger of the tap lifted.
    pub end: Duration,
    pub fingers: usize,
    /// Tap count reached by this tap.
    pub taps: u8,
}

/// Tap count of a new contact that started at `start` with `fingers` fingers.
///
/// The count escalates only when the previous tap used the same number of
/// fingers and ended no more than `interval` before `start`; it is capped at
/// [`MAX_TAP_COUNT`].  Anything else starts counting again at 1.
pub fn classify_multi_tap(
    previous: Option<TapRecord>,
    start: Duration,
    fingers: usize,
    interval: Duration,
) -> u8 {
    match previous {
        Some(prev)
            if prev.fingers == fingers
                && start >= prev.end
                && start - prev.end <= interval =>
        {
            (prev.taps + 1).min(MAX_TAP_COUNT)
        }
        _ => 1,
    }
}

/// Gesture for a contact held for `hold` after `prior_taps` completed taps.
///
/// Holds shorter than `long_press` are not holds at all.
pub fn classify_hold(
    fingers: usize,
    prior_taps: u8,
    hold: Duration,
    long_press: Duration,
) -> Option<GestureId> {
    if hold < long_press {
        return None;
    }
    hold_gesture(fingers, prior_taps.saturating_add(1))
}
