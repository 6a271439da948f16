//! touchguide – touch exploration gesture recognition for accessibility
//! clients on Linux touchscreens.
//!
//! Raw multi-touch input is folded into pointer samples, passed through an
//! input transmission chain and interpreted by the touch-exploration state
//! machine, which reports semantic touch events and recognized gestures.

pub mod chain;
pub mod config;
pub mod event;
pub mod gesture;
pub mod manager;
pub mod multi_tap;
pub mod recognizer;
pub mod sink;
pub mod swipe;
pub mod timer;
