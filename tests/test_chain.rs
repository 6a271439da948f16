//! Tests for the transmission chain: feature flags, assembly and dispatch.
mod common;

use std::str::FromStr;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use common::{Fingers, Recorder, ms};
use touchguide::chain::{Feature, Features, InputInterceptor, PointerOutput};
use touchguide::config::RecognizerConfig;
use touchguide::event::{KeyEvent, PointerAction, PointerSample, SourceType};
use touchguide::sink::{AccessibilityEvent, ChannelSink, NullSink, TouchLifecycle};

fn interceptor(features: Features) -> (InputInterceptor, Arc<Recorder>, Receiver<AccessibilityEvent>) {
    let (tx, rx) = mpsc::channel();
    let recorder = Arc::new(Recorder::default());
    let output: Arc<dyn PointerOutput> = recorder.clone();
    let mut interceptor = InputInterceptor::new(
        RecognizerConfig::default(),
        Arc::new(ChannelSink::new(tx)),
        output,
    );
    interceptor.set_features(features);
    (interceptor, recorder, rx)
}

// -- Features -------------------------------------------------

#[test]
fn test_features_bit_operations() {
    let mut features = Features::TOUCH_EXPLORATION | Features::KEY_EVENT_FILTER;
    assert!(features.contains(Features::TOUCH_EXPLORATION));
    assert!(!features.contains(Features::MOUSE_AUTOCLICK));

    features.insert(Features::MOUSE_AUTOCLICK);
    features.remove(Features::TOUCH_EXPLORATION);
    assert!(!features.contains(Features::TOUCH_EXPLORATION));
    assert_eq!(
        features.iter().collect::<Vec<_>>(),
        vec![Feature::MouseAutoclick, Feature::KeyEventFilter]
    );
    assert!(Features::empty().is_empty());
}

#[test]
fn test_feature_names() {
    assert_eq!(
        Feature::from_str("screen_magnification").ok(),
        Some(Feature::ScreenMagnification)
    );
    assert_eq!(Feature::TouchInjection.to_string(), "touch_injection");
    assert_eq!(
        Features::from(Feature::WindowMagnification),
        Features::WINDOW_MAGNIFICATION
    );
}

// -- Assembly -------------------------------------------------

#[test]
fn test_default_chain_is_only_the_sink() {
    let (i, _, _) = interceptor(Features::empty());
    assert_eq!(i.stage_names(), vec!["input_sink"]);
}

#[test]
fn test_touch_exploration_stage_installed() {
    let (i, _, _) = interceptor(Features::TOUCH_EXPLORATION | Features::SCREEN_MAGNIFICATION);
    assert_eq!(i.stage_names(), vec!["touch_exploration", "input_sink"]);
    assert!(i.features().contains(Features::SCREEN_MAGNIFICATION));
}

#[test]
fn test_same_features_keep_chain() {
    let (mut i, _, _) = interceptor(Features::TOUCH_EXPLORATION);
    let mut f = Fingers::new();
    i.on_pointer_event(&f.down(0, 0, 100.0, 100.0));
    assert!(i.next_deadline().is_some());

    i.set_features(Features::TOUCH_EXPLORATION);
    assert!(i.next_deadline().is_some());
}

#[test]
fn test_feature_change_rebuilds_chain() {
    let (mut i, _, rx) = interceptor(Features::TOUCH_EXPLORATION);
    let mut f = Fingers::new();
    i.on_pointer_event(&f.down(0, 0, 100.0, 100.0));

    i.set_features(Features::TOUCH_EXPLORATION | Features::MOUSE_AUTOCLICK);
    assert_eq!(i.next_deadline(), None);
    // The old recognizer was torn down silently.
    assert_eq!(
        rx.try_iter().collect::<Vec<_>>(),
        vec![AccessibilityEvent::Touch(TouchLifecycle::Begin)]
    );
}

#[test]
fn test_destroy_is_idempotent() {
    let (mut i, _, _) = interceptor(Features::TOUCH_EXPLORATION);
    i.destroy_events();
    i.destroy_events();
    assert!(i.stage_names().is_empty());
    assert_eq!(i.next_deadline(), None);
}

// -- Dispatch -------------------------------------------------

#[test]
fn test_without_exploration_touches_pass_through() {
    let (mut i, recorder, rx) = interceptor(Features::empty());
    let mut f = Fingers::new();
    assert!(i.on_pointer_event(&f.down(0, 0, 10.0, 10.0)));
    assert!(i.on_pointer_event(&f.up(50, 0)));
    assert_eq!(
        recorder.actions(),
        vec![PointerAction::Down, PointerAction::Up]
    );
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_mouse_samples_pass_unchanged() {
    let (mut i, recorder, rx) = interceptor(Features::TOUCH_EXPLORATION);
    let mut sample = PointerSample::single(
        ms(0),
        PointerAction::Move,
        0,
        touchguide::event::Point::new(5.0, 6.0),
    );
    sample.source = SourceType::Mouse;
    i.on_pointer_event(&sample);
    assert_eq!(recorder.samples(), vec![sample]);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_key_events_reach_output() {
    let (mut i, recorder, _) = interceptor(Features::TOUCH_EXPLORATION);
    let key = KeyEvent {
        time: ms(10),
        code: 30,
        pressed: true,
    };
    assert!(i.on_key_event(&key));
    assert_eq!(*recorder.keys.lock().unwrap(), vec![key]);
}

#[test]
fn test_advance_fires_recognizer_timers() {
    let (mut i, recorder, rx) = interceptor(Features::TOUCH_EXPLORATION);
    let mut f = Fingers::new();
    i.on_pointer_event(&f.down(0, 0, 100.0, 100.0));
    i.on_pointer_event(&f.up(150, 0));
    assert!(recorder.actions().is_empty());

    i.advance_to(Duration::from_secs(1));
    assert_eq!(
        recorder.actions(),
        vec![PointerAction::HoverEnter, PointerAction::HoverExit]
    );
    assert_eq!(
        rx.try_iter().collect::<Vec<_>>(),
        vec![
            AccessibilityEvent::Touch(TouchLifecycle::Begin),
            AccessibilityEvent::Touch(TouchLifecycle::End),
        ]
    );
    assert_eq!(i.next_deadline(), None);
}

#[test]
fn test_due_timers_fire_before_next_sample() {
    let (mut i, recorder, _) = interceptor(Features::TOUCH_EXPLORATION);
    let mut f = Fingers::new();
    i.on_pointer_event(&f.down(0, 0, 100.0, 100.0));
    // Long press is due at 200ms; exploration starts before this move lands.
    i.on_pointer_event(&f.move_to(250, 0, 150.0, 100.0));
    assert_eq!(
        recorder.actions(),
        vec![PointerAction::HoverEnter, PointerAction::HoverMove]
    );
}

#[test]
fn test_null_sink_still_forwards_hover() {
    let recorder = Arc::new(Recorder::default());
    let output: Arc<dyn PointerOutput> = recorder.clone();
    let mut i = InputInterceptor::new(RecognizerConfig::default(), Arc::new(NullSink), output);
    i.set_features(Features::TOUCH_EXPLORATION);
    let mut f = Fingers::new();
    assert!(i.on_pointer_event(&f.down(0, 0, 100.0, 100.0)));
    assert!(i.on_pointer_event(&f.up(150, 0)));
    i.advance_to(Duration::from_secs(1));
    assert_eq!(
        recorder.actions(),
        vec![PointerAction::HoverEnter, PointerAction::HoverExit]
    );
    assert_eq!(i.next_deadline(), None);
}
