//! Pointer and key event model, plus the evdev adaptation layer.
//!
//! The recognizer only ever sees [`PointerSample`]s: immutable snapshots of
//! one pointer action together with the state of every pointer on the
//! surface.  Raw evdev multi-touch frames are folded into samples by
//! [`SampleAssembler`], which keeps this module free of I/O and fully
//! testable with synthetic events.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use log::trace;

use crate::config::GestureConfig;
use crate::gesture::GestureId;

// -- Geometry -------------------------------------------------

/// A position in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Vector from `origin` to `self`.
    pub fn offset_from(&self, origin: &Point) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

// -- Pointer samples ------------------------------------------

/// What a pointer sample reports.
///
/// Input devices only produce `Down`, `Move`, `Up` and `Cancel`; the hover
/// actions are synthesized by touch exploration for the downstream stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerAction {
    Down,
    Move,
    Up,
    Cancel,
    HoverEnter,
    HoverMove,
    HoverExit,
}

/// Where a pointer sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceType {
    #[default]
    Touchscreen,
    Touchpad,
    Mouse,
    Unknown,
}

/// State of a single pointer inside a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerItem {
    pub x: f64,
    pub y: f64,
    pub pressed: bool,
}

impl PointerItem {
    pub const fn pressed(x: f64, y: f64) -> Self {
        Self { x, y, pressed: true }
    }

    pub const fn released(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            pressed: false,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Immutable snapshot of one pointer event.
///
/// `pointer_id` names the pointer the action applies to.  For `Up` the acting
/// pointer is still listed in `pointers` with `pressed == false`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerSample {
    /// Monotonic time since an arbitrary epoch shared with the timer queue.
    pub time: Duration,
    pub action: PointerAction,
    pub source: SourceType,
    pub pointer_id: i32,
    pub pointers: BTreeMap<i32, PointerItem>,
}

impl PointerSample {
    /// Number of pointers currently pressed.
    pub fn pressed_count(&self) -> usize {
        self.pointers.values().filter(|p| p.pressed).count()
    }

    /// Ids of the pointers currently pressed, in ascending order.
    pub fn pressed_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.pointers
            .iter()
            .filter(|(_, p)| p.pressed)
            .map(|(id, _)| *id)
    }

    pub fn position(&self, id: i32) -> Option<Point> {
        self.pointers.get(&id).map(PointerItem::point)
    }

    /// Position of the pointer this sample is about.
    pub fn acting_position(&self) -> Option<Point> {
        self.position(self.pointer_id)
    }

    /// Build a single-pointer sample, used for synthesized events.
    pub fn single(
        time: Duration,
        action: PointerAction,
        pointer_id: i32,
        position: Point,
    ) -> Self {
        let pressed = matches!(action, PointerAction::Down | PointerAction::Move);
        Self {
            time,
            action,
            source: SourceType::Touchscreen,
            pointer_id,
            pointers: BTreeMap::from([(
                pointer_id,
                PointerItem {
                    x: position.x,
                    y: position.y,
                    pressed,
                },
            )]),
        }
    }
}

/// A key event travelling through the transmission chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub time: Duration,
    pub code: u16,
    pub pressed: bool,
}

// -- TouchEvent -----------------------------------------------

/// Intermediate representation of a relevant evdev multi-touch event,
/// decoupled from `evdev` types for testability.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchEvent {
    Slot(i32),
    PositionX(f64),
    PositionY(f64),
    TrackingId(i32),
    FingerUp,
    SynReport,
}

/// Classify a single `evdev::InputEvent` into one of the multi-touch
/// categories the assembler cares about.  Returns `None` for irrelevant events.
pub fn classify_event(event: &evdev::InputEvent) -> Option<TouchEvent> {
    use evdev::{AbsoluteAxisType, InputEventKind};

    match event.kind() {
        InputEventKind::AbsAxis(axis) => match axis {
            AbsoluteAxisType::ABS_MT_SLOT => Some(TouchEvent::Slot(event.value())),
            AbsoluteAxisType::ABS_MT_POSITION_X => {
                Some(TouchEvent::PositionX(event.value() as f64))
            }
            AbsoluteAxisType::ABS_MT_POSITION_Y => {
                Some(TouchEvent::PositionY(event.value() as f64))
            }
            AbsoluteAxisType::ABS_MT_TRACKING_ID => {
                if event.value() == -1 {
                    Some(TouchEvent::FingerUp)
                } else {
                    Some(TouchEvent::TrackingId(event.value()))
                }
            }
            _ => None,
        },
        InputEventKind::Synchronization(evdev::Synchronization::SYN_REPORT) => {
            Some(TouchEvent::SynReport)
        }
        _ => None,
    }
}

// -- SampleAssembler ------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    x: f64,
    y: f64,
    tracking_id: i32,
    pressed: bool,
    began: bool,
    ended: bool,
    moved: bool,
    /// Where the reported contact lifted when a new one took over the slot
    /// in the same frame.
    released_at: Option<(f64, f64)>,
}

/// Folds the evdev multi-touch slot protocol into [`PointerSample`]s.
///
/// Slot numbers double as pointer ids.  Every `SYN_REPORT` commits a frame:
/// one `Up` per lifted contact, then one `Down` per new contact, then a
/// single `Move` if any pre-existing contact moved.
#[derive(Debug, Default)]
pub struct SampleAssembler {
    source: SourceType,
    current_slot: i32,
    slots: BTreeMap<i32, Slot>,
}

impl SampleAssembler {
    pub fn new(source: SourceType) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }

    /// Feed one event; returns the samples committed by it (empty unless the
    /// event is a `SYN_REPORT`).
    pub fn push(&mut self, event: &TouchEvent, time: Duration) -> Vec<PointerSample> {
        match event {
            TouchEvent::Slot(slot) => self.current_slot = *slot,
            TouchEvent::TrackingId(id) => {
                let slot = self.slots.entry(self.current_slot).or_default();
                if slot.pressed && !slot.ended && slot.tracking_id == *id {
                    return Vec::new();
                }
                if slot.pressed {
                    // A new contact replaced the reported one: lift it first.
                    slot.ended = true;
                    slot.released_at.get_or_insert((slot.x, slot.y));
                }
                slot.tracking_id = *id;
                slot.began = true;
            }
            TouchEvent::FingerUp => {
                if let Some(slot) = self.slots.get_mut(&self.current_slot) {
                    if slot.began && !slot.pressed {
                        // Down and up inside one frame: never reported.
                        self.slots.remove(&self.current_slot);
                    } else if slot.began {
                        // The replacing contact is gone too; only the lift remains.
                        slot.began = false;
                    } else {
                        slot.ended = true;
                        slot.released_at.get_or_insert((slot.x, slot.y));
                    }
                }
            }
            TouchEvent::PositionX(x) => {
                let slot = self.slots.entry(self.current_slot).or_default();
                slot.x = *x;
                slot.moved = true;
            }
            TouchEvent::PositionY(y) => {
                let slot = self.slots.entry(self.current_slot).or_default();
                slot.y = *y;
                slot.moved = true;
            }
            TouchEvent::SynReport => return self.commit(time),
        }
        Vec::new()
    }

    /// Report every active contact as cancelled, e.g. after the device went away.
    pub fn cancel(&mut self, time: Duration) -> Option<PointerSample> {
        let pointer_id = self
            .slots
            .iter()
            .find(|(_, s)| s.pressed)
            .map(|(id, _)| *id)?;
        let pointers = self
            .slots
            .iter()
            .filter(|(_, s)| s.pressed)
            .map(|(id, s)| (*id, PointerItem::released(s.x, s.y)))
            .collect();
        self.slots.clear();
        Some(PointerSample {
            time,
            action: PointerAction::Cancel,
            source: self.source,
            pointer_id,
            pointers,
        })
    }

    fn snapshot(&self) -> BTreeMap<i32, PointerItem> {
        self.slots
            .iter()
            .filter(|(_, s)| s.pressed)
            .map(|(id, s)| (*id, PointerItem::pressed(s.x, s.y)))
            .collect()
    }

    fn sample(&self, time: Duration, action: PointerAction, pointer_id: i32) -> PointerSample {
        PointerSample {
            time,
            action,
            source: self.source,
            pointer_id,
            pointers: self.snapshot(),
        }
    }

    fn commit(&mut self, time: Duration) -> Vec<PointerSample> {
        let mut samples = Vec::new();

        let ended: Vec<i32> = self
            .slots
            .iter()
            .filter(|(_, s)| s.ended && s.pressed)
            .map(|(id, _)| *id)
            .collect();
        for id in ended {
            let mut sample = self.sample(time, PointerAction::Up, id);
            let released_at = self.slots.get(&id).and_then(|s| s.released_at);
            if let Some(item) = sample.pointers.get_mut(&id) {
                item.pressed = false;
                if let Some((x, y)) = released_at {
                    item.x = x;
                    item.y = y;
                }
            }
            samples.push(sample);
            match self.slots.get_mut(&id) {
                Some(slot) if slot.began => {
                    slot.pressed = false;
                    slot.ended = false;
                    slot.released_at = None;
                }
                _ => {
                    self.slots.remove(&id);
                }
            }
        }

        let began: Vec<i32> = self
            .slots
            .iter()
            .filter(|(_, s)| s.began)
            .map(|(id, _)| *id)
            .collect();
        for id in &began {
            if let Some(slot) = self.slots.get_mut(id) {
                slot.pressed = true;
                slot.began = false;
                slot.moved = false;
            }
            samples.push(self.sample(time, PointerAction::Down, *id));
        }

        let moved = self
            .slots
            .iter()
            .find(|(_, s)| s.pressed && s.moved)
            .map(|(id, _)| *id);
        if let Some(id) = moved {
            samples.push(self.sample(time, PointerAction::Move, id));
        }

        self.slots.retain(|_, s| s.pressed);
        for slot in self.slots.values_mut() {
            slot.moved = false;
            slot.ended = false;
            slot.released_at = None;
        }

        trace!("Assembled {} sample(s) at {:?}", samples.len(), time);
        samples
    }
}

// -- Helpers --------------------------------------------------

/// Parse a USB vendor:product ID string into `(vendor, product)`.
///
/// Accepts formats like `"1234:5678"` or `"USB:1234:5678"` (case-insensitive).
/// Returns `None` if the format is invalid or the hex values cannot be parsed.
pub fn parse_usb_id(raw: &str) -> Option<(u16, u16)> {
    let cleaned = raw.to_lowercase().replace("usb:", "");
    let (vendor_str, product_str) = cleaned.split_once(':')?;
    let vendor = u16::from_str_radix(vendor_str, 16).ok()?;
    let product = u16::from_str_radix(product_str, 16).ok()?;
    Some((vendor, product))
}

/// Look up the action string for a recognized gesture in the device config.
///
/// Returns `Some(action)` if the gesture is configured, enabled, and has an action.
pub fn resolve_action(
    gesture: GestureId,
    gestures: &HashMap<String, GestureConfig>,
) -> Option<&str> {
    let gesture_name: &str = gesture.into();
    gestures
        .get(gesture_name)
        .filter(|gc| gc.enabled)
        .and_then(|gc| gc.action.as_deref())
}
