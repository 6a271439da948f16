//! Tests for path segmentation and swipe classification in `swipe`.
mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use common::{Fingers, ms};
use touchguide::config::RecognizerConfig;
use touchguide::event::Point;
use touchguide::gesture::{Direction, GestureId};
use touchguide::swipe::{
    FingerTrajectory, MultiFingerSwipeState, TrackPoint, classify_path, classify_swipe,
    segment_legs,
};

// -- Helpers --------------------------------------------------

/// Build a track from `(t_ms, x, y)` triples.
fn track(points: &[(u64, f64, f64)]) -> Vec<TrackPoint> {
    points
        .iter()
        .map(|(t, x, y)| TrackPoint {
            point: Point::new(*x, *y),
            time: ms(*t),
        })
        .collect()
}

/// Build a trajectory that keeps every sample.
fn trajectory(points: &[(u64, f64, f64)]) -> FingerTrajectory {
    let mut tr = FingerTrajectory::new(0.0);
    let mut iter = points.iter();
    if let Some((t, x, y)) = iter.next() {
        tr.begin(Point::new(*x, *y), ms(*t));
    }
    for (t, x, y) in iter {
        tr.record(Point::new(*x, *y), ms(*t));
    }
    tr.finish();
    tr
}

fn paths(entries: &[(i32, &[(f64, f64)])]) -> BTreeMap<i32, Vec<Point>> {
    entries
        .iter()
        .map(|(id, pts)| (*id, pts.iter().map(|(x, y)| Point::new(*x, *y)).collect()))
        .collect()
}

// -- FingerTrajectory -----------------------------------------

#[test]
fn test_trajectory_spacing_filters_jitter() {
    let mut tr = FingerTrajectory::new(10.0);
    tr.begin(Point::new(0.0, 0.0), ms(0));
    assert!(!tr.record(Point::new(5.0, 0.0), ms(10)));
    assert!(tr.record(Point::new(12.0, 0.0), ms(20)));
    assert!(!tr.record(Point::new(15.0, 0.0), ms(30)));
    assert_eq!(tr.samples().len(), 2);

    // The last raw position always ends the path.
    tr.finish();
    assert_eq!(tr.samples().len(), 3);
    assert_eq!(tr.samples()[2].point, Point::new(15.0, 0.0));
    assert_eq!(tr.duration(), ms(30));
}

#[test]
fn test_trajectory_finish_does_not_duplicate() {
    let mut tr = FingerTrajectory::new(10.0);
    tr.begin(Point::new(0.0, 0.0), ms(0));
    tr.record(Point::new(20.0, 0.0), ms(10));
    tr.finish();
    assert_eq!(tr.samples().len(), 2);
}

#[test]
fn test_trajectory_clear() {
    let mut tr = trajectory(&[(0, 0.0, 0.0), (10, 50.0, 0.0)]);
    tr.clear();
    assert!(tr.is_empty());
    assert_eq!(tr.duration(), Duration::ZERO);
}

// -- segment_legs ---------------------------------------------

#[test]
fn test_segment_single_leg() {
    let legs = segment_legs(
        &track(&[(0, 0.0, 0.0), (10, 40.0, 0.0), (20, 90.0, 2.0)]),
        50.0,
    );
    assert_eq!(legs.len(), 1);
    assert_eq!(legs[0].direction, Direction::Right);
    assert_eq!(legs[0].start, Point::new(0.0, 0.0));
    assert_eq!(legs[0].end, Point::new(90.0, 2.0));
}

#[test]
fn test_segment_two_legs() {
    let legs = segment_legs(
        &track(&[
            (0, 0.0, 0.0),
            (10, 60.0, 0.0),
            (20, 120.0, 0.0),
            (30, 120.0, -60.0),
            (40, 120.0, -120.0),
        ]),
        50.0,
    );
    let dirs: Vec<_> = legs.iter().map(|l| l.direction).collect();
    assert_eq!(dirs, vec![Direction::Right, Direction::Up]);
    assert_eq!(legs[1].length(), 120.0);
}

#[test]
fn test_segment_drops_short_wobble_and_merges() {
    let legs = segment_legs(
        &track(&[
            (0, 0.0, 0.0),
            (10, 60.0, 0.0),
            (20, 60.0, 5.0),
            (30, 120.0, 5.0),
        ]),
        50.0,
    );
    assert_eq!(legs.len(), 1);
    assert_eq!(legs[0].direction, Direction::Right);
    assert_eq!(legs[0].end, Point::new(120.0, 5.0));
}

#[test]
fn test_segment_ignores_stationary_steps() {
    let legs = segment_legs(
        &track(&[(0, 0.0, 0.0), (10, 0.0, 0.0), (20, 0.0, 80.0)]),
        50.0,
    );
    assert_eq!(legs.len(), 1);
    assert_eq!(legs[0].direction, Direction::Down);
}

// -- classify_path --------------------------------------------

#[test]
fn test_classify_primary_swipes() {
    let config = RecognizerConfig::default();
    let cases = [
        ((-200.0, 0.0), GestureId::SwipeLeft),
        ((200.0, 10.0), GestureId::SwipeRight),
        ((0.0, -200.0), GestureId::SwipeUp),
        ((-10.0, 200.0), GestureId::SwipeDown),
    ];
    for ((dx, dy), expected) in cases {
        let tr = trajectory(&[(0, 300.0, 300.0), (50, 300.0 + dx, 300.0 + dy)]);
        assert_eq!(classify_path(&tr, &config), Some(expected), "({dx}, {dy})");
    }
}

#[test]
fn test_classify_too_short() {
    let config = RecognizerConfig::default();
    let tr = trajectory(&[(0, 0.0, 0.0), (50, 30.0, 0.0)]);
    assert_eq!(classify_path(&tr, &config), None);
}

#[test]
fn test_classify_diagonal_rejected() {
    let config = RecognizerConfig::default();
    let tr = trajectory(&[(0, 0.0, 0.0), (50, 150.0, 150.0)]);
    assert_eq!(classify_path(&tr, &config), None);
}

#[test]
fn test_classify_compound_swipe() {
    let config = RecognizerConfig::default();
    let tr = trajectory(&[
        (0, 0.0, 0.0),
        (50, 100.0, 0.0),
        (100, 100.0, -100.0),
    ]);
    assert_eq!(classify_path(&tr, &config), Some(GestureId::SwipeRightThenUp));
}

#[test]
fn test_classify_reversal_is_compound() {
    let config = RecognizerConfig::default();
    let tr = trajectory(&[(0, 100.0, 100.0), (50, 200.0, 100.0), (100, 100.0, 100.0)]);
    assert_eq!(
        classify_path(&tr, &config),
        Some(GestureId::SwipeRightThenLeft)
    );
}

#[test]
fn test_slow_compound_falls_back_to_net_displacement() {
    let config = RecognizerConfig::default();
    // 400ms exceeds the completion timeout; the net vector is diagonal.
    let tr = trajectory(&[
        (0, 0.0, 0.0),
        (200, 100.0, 0.0),
        (400, 100.0, -100.0),
    ]);
    assert_eq!(classify_path(&tr, &config), None);
}

#[test]
fn test_three_legs_judged_by_net_displacement() {
    let config = RecognizerConfig::default();
    let tr = trajectory(&[
        (0, 0.0, 0.0),
        (30, 100.0, 0.0),
        (60, 100.0, 100.0),
        (90, 300.0, 100.0),
    ]);
    // Net (300, 100) is close enough to horizontal.
    assert_eq!(classify_path(&tr, &config), Some(GestureId::SwipeRight));
}

/// Right for 150 px, then 150 px at `degrees` off vertical towards up-right.
fn right_then_tilted(degrees: f64) -> FingerTrajectory {
    let (sin, cos) = degrees.to_radians().sin_cos();
    trajectory(&[
        (0, 100.0, 500.0),
        (20, 175.0, 500.0),
        (40, 250.0, 500.0),
        (60, 250.0 + 75.0 * sin, 500.0 - 75.0 * cos),
        (80, 250.0 + 150.0 * sin, 500.0 - 150.0 * cos),
    ])
}

#[test]
fn test_tilted_second_leg_is_not_compound() {
    let config = RecognizerConfig::default();
    // 40 degrees: the leg reads as up but is off axis.
    assert_eq!(
        classify_path(&right_then_tilted(40.0), &config),
        Some(GestureId::SwipeRight)
    );
    // 50 degrees: the leg reads as right and merges with the first.
    assert_eq!(
        classify_path(&right_then_tilted(50.0), &config),
        Some(GestureId::SwipeRight)
    );
}

#[test]
fn test_second_leg_within_axis_tolerance_is_compound() {
    let config = RecognizerConfig::default();
    assert_eq!(
        classify_path(&right_then_tilted(20.0), &config),
        Some(GestureId::SwipeRightThenUp)
    );
}

#[test]
fn test_classify_empty_trajectory() {
    let config = RecognizerConfig::default();
    assert_eq!(classify_path(&FingerTrajectory::new(1.0), &config), None);
}

// -- Multi-finger ---------------------------------------------

#[test]
fn test_multi_finger_direction_locks() {
    let config = RecognizerConfig::default();
    let mut f = Fingers::new();
    f.down(0, 0, 100.0, 500.0);
    f.down(0, 1, 200.0, 500.0);
    let start = f.down(0, 2, 300.0, 500.0);

    let mut state = MultiFingerSwipeState::new(10.0, config.swipe_axis_cosine);
    state.start(&start);
    assert_eq!(state.paths().len(), 3);
    assert_eq!(state.direction(), None);

    state.record(&f.shift_all(20, 0.0, -30.0));
    assert_eq!(state.direction(), Some(Direction::Up));
    assert!(!state.is_invalid());
    assert_eq!(state.paths()[&1].len(), 2);

    let latest = f.shift_all(40, 0.0, -30.0);
    state.record(&latest);
    assert_eq!(state.max_displacement(&latest), 60.0);
    assert_eq!(state.previous(), Some(&latest));
}

#[test]
fn test_multi_finger_direction_change_invalid() {
    let config = RecognizerConfig::default();
    let mut f = Fingers::new();
    f.down(0, 0, 100.0, 500.0);
    let start = f.down(0, 1, 200.0, 500.0);

    let mut state = MultiFingerSwipeState::new(10.0, config.swipe_axis_cosine);
    state.start(&start);
    state.record(&f.shift_all(20, 0.0, -30.0));
    state.record(&f.shift_all(40, 30.0, 0.0));
    assert!(state.is_invalid());
}

#[test]
fn test_multi_finger_spacing_and_diagonal_steps() {
    let mut state = MultiFingerSwipeState::new(10.0, 30f64.to_radians().cos());
    state.record_swipe_sample(0, Point::new(0.0, 0.0));
    state.record_swipe_sample(0, Point::new(3.0, 0.0));
    assert_eq!(state.paths()[&0].len(), 1);

    // A diagonal step is kept but does not lock a direction.
    state.record_swipe_sample(0, Point::new(20.0, 20.0));
    assert_eq!(state.paths()[&0].len(), 2);
    assert_eq!(state.direction(), None);
}

#[test]
fn test_multi_finger_clear() {
    let mut state = MultiFingerSwipeState::new(10.0, 0.9);
    state.record_swipe_sample(0, Point::new(0.0, 0.0));
    state.record_swipe_sample(0, Point::new(0.0, 50.0));
    state.clear();
    assert!(state.paths().is_empty());
    assert_eq!(state.direction(), None);
    assert!(state.previous().is_none());
}

#[test]
fn test_classify_swipe_agreeing_paths() {
    let config = RecognizerConfig::default();
    let p = paths(&[
        (0, &[(100.0, 500.0), (100.0, 300.0)]),
        (1, &[(200.0, 500.0), (205.0, 310.0)]),
        (2, &[(300.0, 500.0), (300.0, 250.0)]),
    ]);
    assert_eq!(classify_swipe(&p, &config), Some(Direction::Up));
}

#[test]
fn test_classify_swipe_one_finger_too_short() {
    let config = RecognizerConfig::default();
    let p = paths(&[
        (0, &[(100.0, 500.0), (100.0, 300.0)]),
        (1, &[(200.0, 500.0), (200.0, 480.0)]),
    ]);
    assert_eq!(classify_swipe(&p, &config), None);
}

#[test]
fn test_classify_swipe_disagreeing_paths() {
    let config = RecognizerConfig::default();
    let p = paths(&[
        (0, &[(100.0, 500.0), (100.0, 300.0)]),
        (1, &[(200.0, 500.0), (400.0, 500.0)]),
    ]);
    assert_eq!(classify_swipe(&p, &config), None);
}

#[test]
fn test_classify_swipe_empty_path() {
    let config = RecognizerConfig::default();
    let p = paths(&[(0, &[])]);
    assert_eq!(classify_swipe(&p, &config), None);
}
