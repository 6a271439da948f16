//! Finger trajectories and the swipe classifiers that run on them.
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::RecognizerConfig;
use crate::event::{Point, PointerSample};
use crate::gesture::{Direction, GestureId, compound_swipe, primary_swipe};

/// A recorded sample of a one-finger swipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub point: Point,
    pub time: Duration,
}

/// Path of a one-finger swipe.
///
/// Samples are only kept once the finger has moved at least `spacing` from
/// the previously kept sample, which filters sensor jitter out of the leg
/// segmentation.  `previous` is the latest raw position whether kept or not.
#[derive(Debug, Clone, Default)]
pub struct FingerTrajectory {
    samples: Vec<TrackPoint>,
    previous: Option<TrackPoint>,
    spacing: f64,
}

impl FingerTrajectory {
    pub fn new(spacing: f64) -> Self {
        Self {
            spacing,
            ..Default::default()
        }
    }

    /// Start a new path at `point`.
    pub fn begin(&mut self, point: Point, time: Duration) {
        self.clear();
        let start = TrackPoint { point, time };
        self.samples.push(start);
        self.previous = Some(start);
    }

    /// Record a raw position.  Returns whether it was kept as a sample.
    pub fn record(&mut self, point: Point, time: Duration) -> bool {
        let current = TrackPoint { point, time };
        self.previous = Some(current);
        let far_enough = self
            .samples
            .last()
            .is_none_or(|last| last.point.distance_to(&point) >= self.spacing);
        if far_enough {
            self.samples.push(current);
        }
        far_enough
    }

    /// Make sure the latest raw position ends the path.
    pub fn finish(&mut self) {
        if let Some(previous) = self.previous
            && self.samples.last() != Some(&previous)
        {
            self.samples.push(previous);
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.previous = None;
    }

    pub fn samples(&self) -> &[TrackPoint] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.time.saturating_sub(first.time),
            _ => Duration::ZERO,
        }
    }
}

/// A straight run of a path along one direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub start: Point,
    pub end: Point,
    pub direction: Direction,
}

impl Leg {
    pub fn vector(&self) -> (f64, f64) {
        self.end.offset_from(&self.start)
    }

    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    fn is_axis_aligned(&self, min_cosine: f64) -> bool {
        let (dx, dy) = self.vector();
        Direction::axis_cosine(dx, dy) >= min_cosine
    }
}

/// Split a path into legs: consecutive steps with the same dominant
/// direction are grouped, legs shorter than `min_length` are dropped and the
/// neighbours left behind are merged when they share a direction.
pub fn segment_legs(samples: &[TrackPoint], min_length: f64) -> Vec<Leg> {
    let mut raw: Vec<Leg> = Vec::new();
    for step in samples.windows(2) {
        let (from, to) = (step[0].point, step[1].point);
        let (dx, dy) = to.offset_from(&from);
        if dx == 0.0 && dy == 0.0 {
            continue;
        }
        let direction = Direction::of_vector(dx, dy);
        match raw.last_mut() {
            Some(leg) if leg.direction == direction => leg.end = to,
            _ => raw.push(Leg {
                start: from,
                end: to,
                direction,
            }),
        }
    }

    let mut legs: Vec<Leg> = Vec::new();
    for leg in raw.into_iter().filter(|l| l.length() >= min_length) {
        match legs.last_mut() {
            Some(prev) if prev.direction == leg.direction => prev.end = leg.end,
            _ => legs.push(leg),
        }
    }
    legs
}

/// Classify a one-finger path.
///
/// Two axis-aligned legs completed within the swipe-completion timeout make
/// a compound swipe.  Anything else is judged on its net displacement, which
/// must be long enough and close enough to an axis to count as a primary
/// swipe.
pub fn classify_path(trajectory: &FingerTrajectory, config: &RecognizerConfig) -> Option<GestureId> {
    let samples = trajectory.samples();
    let (first, last) = (samples.first()?, samples.last()?);

    let legs = segment_legs(samples, config.swipe_min_distance);
    if let [a, b] = legs.as_slice()
        && trajectory.duration() <= config.swipe_complete_timeout
        && a.is_axis_aligned(config.swipe_axis_cosine)
        && b.is_axis_aligned(config.swipe_axis_cosine)
        && let Some(gesture) = compound_swipe(a.direction, b.direction)
    {
        return Some(gesture);
    }

    let (dx, dy) = last.point.offset_from(&first.point);
    if dx.hypot(dy) < config.swipe_min_distance
        || Direction::axis_cosine(dx, dy) < config.swipe_axis_cosine
    {
        return None;
    }
    Some(primary_swipe(Direction::of_vector(dx, dy)))
}

// -- Multi-finger ---------------------------------------------

/// Per-pointer paths of a multi-finger contact.
///
/// The first clearly axis-aligned step of any finger locks the shared
/// `direction`; a later step clearly along another direction marks the
/// whole swipe invalid.
#[derive(Debug, Clone, Default)]
pub struct MultiFingerSwipeState {
    paths: BTreeMap<i32, Vec<Point>>,
    previous: Option<PointerSample>,
    direction: Option<Direction>,
    invalid: bool,
    spacing: f64,
    axis_cosine: f64,
}

impl MultiFingerSwipeState {
    pub fn new(spacing: f64, axis_cosine: f64) -> Self {
        Self {
            spacing,
            axis_cosine,
            ..Default::default()
        }
    }

    /// Restart tracking from every pressed pointer of `sample`.
    pub fn start(&mut self, sample: &PointerSample) {
        self.paths.clear();
        self.direction = None;
        self.invalid = false;
        for (id, item) in sample.pointers.iter().filter(|(_, p)| p.pressed) {
            self.paths.insert(*id, vec![item.point()]);
        }
        self.previous = Some(sample.clone());
    }

    pub fn clear(&mut self) {
        self.paths.clear();
        self.previous = None;
        self.direction = None;
        self.invalid = false;
    }

    /// Append a position to one finger's path.
    pub fn record_swipe_sample(&mut self, id: i32, point: Point) {
        let path = self.paths.entry(id).or_default();
        let Some(last) = path.last().copied() else {
            path.push(point);
            return;
        };
        if last.distance_to(&point) < self.spacing {
            return;
        }
        path.push(point);

        let (dx, dy) = point.offset_from(&last);
        if Direction::axis_cosine(dx, dy) < self.axis_cosine {
            return;
        }
        let step = Direction::of_vector(dx, dy);
        match self.direction {
            None => self.direction = Some(step),
            Some(locked) if locked != step => self.invalid = true,
            Some(_) => {}
        }
    }

    /// Record every tracked pointer of `sample`, pressed or just released.
    pub fn record(&mut self, sample: &PointerSample) {
        for (id, item) in &sample.pointers {
            if self.paths.contains_key(id) {
                self.record_swipe_sample(*id, item.point());
            }
        }
        self.previous = Some(sample.clone());
    }

    pub fn paths(&self) -> &BTreeMap<i32, Vec<Point>> {
        &self.paths
    }

    pub fn previous(&self) -> Option<&PointerSample> {
        self.previous.as_ref()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Largest distance any finger has travelled from its first position.
    pub fn max_displacement(&self, sample: &PointerSample) -> f64 {
        self.paths
            .iter()
            .filter_map(|(id, path)| Some(path.first()?.distance_to(&sample.position(*id)?)))
            .fold(0.0, f64::max)
    }
}

/// Direction shared by every finger's net displacement, if they agree.
pub fn classify_swipe(
    paths: &BTreeMap<i32, Vec<Point>>,
    config: &RecognizerConfig,
) -> Option<Direction> {
    let mut agreed: Option<Direction> = None;
    for path in paths.values() {
        let (first, last) = (path.first()?, path.last()?);
        let (dx, dy) = last.offset_from(first);
        if dx.hypot(dy) < config.swipe_min_distance
            || Direction::axis_cosine(dx, dy) < config.swipe_axis_cosine
        {
            return None;
        }
        let direction = Direction::of_vector(dx, dy);
        match agreed {
            Some(d) if d != direction => return None,
            _ => agreed = Some(direction),
        }
    }
    agreed
}
