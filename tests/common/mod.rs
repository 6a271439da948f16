//! Shared helpers: synthetic finger streams and a recognizer harness that
//! records everything touch exploration emits.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use touchguide::chain::{Downstream, EventStage, InputSink, PointerOutput};
use touchguide::config::RecognizerConfig;
use touchguide::event::{KeyEvent, PointerAction, PointerItem, PointerSample, SourceType};
use touchguide::gesture::GestureId;
use touchguide::recognizer::{RecognizerState, TouchExploration};
use touchguide::sink::{AccessibilityEvent, ChannelSink, TouchLifecycle};

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

// -- Output recording -----------------------------------------

/// Collects everything that reaches the end of the chain.
#[derive(Default)]
pub struct Recorder {
    pub pointers: Mutex<Vec<PointerSample>>,
    pub keys: Mutex<Vec<KeyEvent>>,
}

impl Recorder {
    pub fn actions(&self) -> Vec<PointerAction> {
        self.pointers.lock().unwrap().iter().map(|s| s.action).collect()
    }

    pub fn samples(&self) -> Vec<PointerSample> {
        self.pointers.lock().unwrap().clone()
    }
}

impl PointerOutput for Recorder {
    fn deliver_pointer(&self, event: &PointerSample) {
        self.pointers.lock().unwrap().push(event.clone());
    }

    fn deliver_key(&self, event: &KeyEvent) {
        self.keys.lock().unwrap().push(*event);
    }
}

// -- Synthetic fingers ----------------------------------------

/// Tracks which fingers are on the surface and builds consistent samples.
#[derive(Default)]
pub struct Fingers {
    pointers: BTreeMap<i32, PointerItem>,
}

impl Fingers {
    pub fn new() -> Self {
        Self::default()
    }

    fn sample(&self, t: u64, action: PointerAction, id: i32) -> PointerSample {
        PointerSample {
            time: ms(t),
            action,
            source: SourceType::Touchscreen,
            pointer_id: id,
            pointers: self.pointers.clone(),
        }
    }

    pub fn down(&mut self, t: u64, id: i32, x: f64, y: f64) -> PointerSample {
        self.pointers.insert(id, PointerItem::pressed(x, y));
        self.sample(t, PointerAction::Down, id)
    }

    pub fn move_to(&mut self, t: u64, id: i32, x: f64, y: f64) -> PointerSample {
        self.pointers.insert(id, PointerItem::pressed(x, y));
        self.sample(t, PointerAction::Move, id)
    }

    /// Move several fingers within one sample.
    pub fn shift(&mut self, t: u64, deltas: &[(i32, f64, f64)]) -> PointerSample {
        for (id, dx, dy) in deltas {
            if let Some(p) = self.pointers.get_mut(id) {
                p.x += dx;
                p.y += dy;
            }
        }
        self.sample(t, PointerAction::Move, deltas[0].0)
    }

    /// Move every finger by the same offset.
    pub fn shift_all(&mut self, t: u64, dx: f64, dy: f64) -> PointerSample {
        let deltas: Vec<_> = self.pointers.keys().map(|id| (*id, dx, dy)).collect();
        self.shift(t, &deltas)
    }

    pub fn up(&mut self, t: u64, id: i32) -> PointerSample {
        if let Some(p) = self.pointers.get_mut(&id) {
            p.pressed = false;
        }
        let sample = self.sample(t, PointerAction::Up, id);
        self.pointers.remove(&id);
        sample
    }

    pub fn cancel(&mut self, t: u64) -> PointerSample {
        for p in self.pointers.values_mut() {
            p.pressed = false;
        }
        let id = self.pointers.keys().next().copied().unwrap_or(0);
        let sample = self.sample(t, PointerAction::Cancel, id);
        self.pointers.clear();
        sample
    }

    pub fn ids(&self) -> Vec<i32> {
        self.pointers.keys().copied().collect()
    }

    pub fn position(&self, id: i32) -> Option<(f64, f64)> {
        self.pointers.get(&id).map(|p| (p.x, p.y))
    }
}

// -- Harness --------------------------------------------------

/// A touch-exploration stage wired to a recording sink and output.
pub struct Harness {
    pub recognizer: TouchExploration,
    tail: Vec<Box<dyn EventStage>>,
    events: Receiver<AccessibilityEvent>,
    pub output: Arc<Recorder>,
    log: Vec<AccessibilityEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RecognizerConfig::default())
    }

    pub fn with_config(config: RecognizerConfig) -> Self {
        let (tx, events) = mpsc::channel();
        let output = Arc::new(Recorder::default());
        let sink_output: Arc<dyn PointerOutput> = output.clone();
        Self {
            recognizer: TouchExploration::new(config, Arc::new(ChannelSink::new(tx))),
            tail: vec![Box::new(InputSink::new(sink_output))],
            events,
            output,
            log: Vec::new(),
        }
    }

    /// Fire due timers, then dispatch `sample`.  Returns whether it was consumed.
    pub fn send(&mut self, sample: PointerSample) -> bool {
        self.advance_to(sample.time);
        let mut next = Downstream::new(&mut self.tail);
        self.recognizer.on_pointer_event(&sample, &mut next)
    }

    pub fn send_all(&mut self, samples: impl IntoIterator<Item = PointerSample>) {
        for sample in samples {
            self.send(sample);
        }
    }

    pub fn advance_to(&mut self, now: Duration) {
        while let Some(deadline) = self.recognizer.next_deadline() {
            if deadline > now {
                break;
            }
            let mut next = Downstream::new(&mut self.tail);
            self.recognizer.on_timer(deadline, &mut next);
        }
    }

    pub fn advance_ms(&mut self, t: u64) {
        self.advance_to(ms(t));
    }

    pub fn state(&self) -> RecognizerState {
        self.recognizer.state()
    }

    /// Every semantic event emitted so far.
    pub fn events(&mut self) -> Vec<AccessibilityEvent> {
        self.log.extend(self.events.try_iter());
        self.log.clone()
    }

    pub fn gestures(&mut self) -> Vec<GestureId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AccessibilityEvent::Gesture(g) => Some(g),
                AccessibilityEvent::Touch(_) => None,
            })
            .collect()
    }

    pub fn lifecycle(&mut self) -> Vec<TouchLifecycle> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AccessibilityEvent::Touch(t) => Some(t),
                AccessibilityEvent::Gesture(_) => None,
            })
            .collect()
    }
}
