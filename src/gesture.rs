//! Gesture identifiers and the static lookup tables that map recognized
//! shapes (direction legs, tap counts, finger counts) onto them.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Primary swipe direction.  Screen coordinates grow downwards, so a
/// negative `dy` is [`Direction::Up`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Classify a vector by its dominant axis.  Ties go to the horizontal axis.
    pub fn of_vector(dx: f64, dy: f64) -> Direction {
        if dx.abs() >= dy.abs() {
            if dx < 0.0 { Direction::Left } else { Direction::Right }
        } else if dy < 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    /// Cosine of the angle between `(dx, dy)` and the nearest axis.
    ///
    /// Returns 0 for a zero vector so it never passes an alignment test.
    pub fn axis_cosine(dx: f64, dy: f64) -> f64 {
        let len = dx.hypot(dy);
        if len == 0.0 {
            return 0.0;
        }
        dx.abs().max(dy.abs()) / len
    }
}

/// Every gesture the recognizer can report to assistive clients.
///
/// The string form is the key used in the `[*.gestures.<name>]` config tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum GestureId {
    SwipeUp,
    SwipeDown,
    SwipeLeft,
    SwipeRight,

    SwipeUpThenDown,
    SwipeUpThenLeft,
    SwipeUpThenRight,
    SwipeDownThenUp,
    SwipeDownThenLeft,
    SwipeDownThenRight,
    SwipeLeftThenUp,
    SwipeLeftThenDown,
    SwipeLeftThenRight,
    SwipeRightThenUp,
    SwipeRightThenDown,
    SwipeRightThenLeft,

    DoubleTap,
    DoubleTapAndHold,

    TwoFingerSingleTap,
    TwoFingerDoubleTap,
    TwoFingerDoubleTapAndHold,
    TwoFingerTripleTap,
    TwoFingerTripleTapAndHold,

    ThreeFingerSingleTap,
    ThreeFingerDoubleTap,
    ThreeFingerDoubleTapAndHold,
    ThreeFingerTripleTap,
    ThreeFingerTripleTapAndHold,
    ThreeFingerSwipeUp,
    ThreeFingerSwipeDown,
    ThreeFingerSwipeLeft,
    ThreeFingerSwipeRight,

    FourFingerSingleTap,
    FourFingerDoubleTap,
    FourFingerDoubleTapAndHold,
    FourFingerTripleTap,
    FourFingerTripleTapAndHold,
    FourFingerSwipeUp,
    FourFingerSwipeDown,
    FourFingerSwipeLeft,
    FourFingerSwipeRight,
}

/// Highest tap count that is tracked; a third tap is reported immediately.
pub const MAX_TAP_COUNT: u8 = 3;

/// Maximum number of concurrently tracked fingers.
pub const MAX_FINGERS: usize = 4;

/// One-finger swipe along a single direction.
pub fn primary_swipe(direction: Direction) -> GestureId {
    match direction {
        Direction::Up => GestureId::SwipeUp,
        Direction::Down => GestureId::SwipeDown,
        Direction::Left => GestureId::SwipeLeft,
        Direction::Right => GestureId::SwipeRight,
    }
}

/// One-finger swipe made of two legs.  `None` when both legs share a direction.
pub fn compound_swipe(first: Direction, second: Direction) -> Option<GestureId> {
    use Direction::*;

    let gesture = match (first, second) {
        (Up, Down) => GestureId::SwipeUpThenDown,
        (Up, Left) => GestureId::SwipeUpThenLeft,
        (Up, Right) => GestureId::SwipeUpThenRight,
        (Down, Up) => GestureId::SwipeDownThenUp,
        (Down, Left) => GestureId::SwipeDownThenLeft,
        (Down, Right) => GestureId::SwipeDownThenRight,
        (Left, Up) => GestureId::SwipeLeftThenUp,
        (Left, Down) => GestureId::SwipeLeftThenDown,
        (Left, Right) => GestureId::SwipeLeftThenRight,
        (Right, Up) => GestureId::SwipeRightThenUp,
        (Right, Down) => GestureId::SwipeRightThenDown,
        (Right, Left) => GestureId::SwipeRightThenLeft,
        (Up, Up) | (Down, Down) | (Left, Left) | (Right, Right) => return None,
    };
    Some(gesture)
}

/// Completed `taps`-fold tap with `fingers` fingers.
pub fn tap_gesture(fingers: usize, taps: u8) -> Option<GestureId> {
    match (fingers, taps) {
        (2, 1) => Some(GestureId::TwoFingerSingleTap),
        (2, 2) => Some(GestureId::TwoFingerDoubleTap),
        (2, 3) => Some(GestureId::TwoFingerTripleTap),
        (3, 1) => Some(GestureId::ThreeFingerSingleTap),
        (3, 2) => Some(GestureId::ThreeFingerDoubleTap),
        (3, 3) => Some(GestureId::ThreeFingerTripleTap),
        (4, 1) => Some(GestureId::FourFingerSingleTap),
        (4, 2) => Some(GestureId::FourFingerDoubleTap),
        (4, 3) => Some(GestureId::FourFingerTripleTap),
        _ => None,
    }
}

/// Contact number `taps` held past the long-press timeout.
///
/// The first contact of a group has no hold gesture of its own.
pub fn hold_gesture(fingers: usize, taps: u8) -> Option<GestureId> {
    match (fingers, taps) {
        (2, 2) => Some(GestureId::TwoFingerDoubleTapAndHold),
        (2, 3) => Some(GestureId::TwoFingerTripleTapAndHold),
        (3, 2) => Some(GestureId::ThreeFingerDoubleTapAndHold),
        (3, 3) => Some(GestureId::ThreeFingerTripleTapAndHold),
        (4, 2) => Some(GestureId::FourFingerDoubleTapAndHold),
        (4, 3) => Some(GestureId::FourFingerTripleTapAndHold),
        _ => None,
    }
}

/// Multi-finger swipe; two-finger motion is a drag, never a swipe.
pub fn multi_finger_swipe(fingers: usize, direction: Direction) -> Option<GestureId> {
    use Direction::*;

    match (fingers, direction) {
        (3, Up) => Some(GestureId::ThreeFingerSwipeUp),
        (3, Down) => Some(GestureId::ThreeFingerSwipeDown),
        (3, Left) => Some(GestureId::ThreeFingerSwipeLeft),
        (3, Right) => Some(GestureId::ThreeFingerSwipeRight),
        (4, Up) => Some(GestureId::FourFingerSwipeUp),
        (4, Down) => Some(GestureId::FourFingerSwipeDown),
        (4, Left) => Some(GestureId::FourFingerSwipeLeft),
        (4, Right) => Some(GestureId::FourFingerSwipeRight),
        _ => None,
    }
}
