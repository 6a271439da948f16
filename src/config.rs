//! Configuration data structures and TOML parsing.
//!
//! The config file uses TOML format. Example:
//!
//! ```toml
//! [global]
//! log_level = "info"
//! features = ["touch_exploration"]
//! dpi = 320.0
//!
//! [global.thresholds]
//! long_press_timeout_ms = 200.0
//! double_tap_timeout_ms = 300.0
//! multi_tap_interval_ms = 100.0
//! swipe_complete_timeout_ms = 300.0
//! move_threshold_dp = 10.0
//! angle_tolerance_deg = 30.0
//!
//! [global.gestures.swipe_right]
//! action = "xdotool key Right"
//! enabled = true
//!
//! [device.kiosk]
//! device_usb_id = "1234:5678"
//! enabled = true
//!
//! [device.kiosk.gestures.two_finger_double_tap]
//! action = "xdotool key space"
//! enabled = true
//!
//! [device.kiosk.thresholds]
//! long_press_timeout_ms = 350.0
//! ```
//!
//! Every threshold is optional: device values fall back to the global
//! section, which falls back to the built-in defaults.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::chain::{Feature, Features};

/// Density-independent pixels are defined against this many dots per inch.
pub const BASELINE_DPI: f64 = 160.0;

/// Top-level error type used throughout the crate.
#[derive(Debug, Error)]
pub enum TouchguideError {
    #[error("Failed to read config file {path}: {source}")]
    ConfigReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    #[error("Invalid threshold '{name}' = {value} in {scope}")]
    InvalidThreshold {
        scope: String,
        name: &'static str,
        value: f64,
    },

    #[error("Invalid dpi {value} in {scope}")]
    InvalidDpi { scope: String, value: f64 },

    #[error("Unknown feature '{name}' in {scope}")]
    UnknownFeature { scope: String, name: String },
}

/// Root of the TOML config file.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    global: RawGlobal,
    #[serde(default)]
    device: HashMap<String, RawDevice>,
}

/// The `[global]` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawGlobal {
    log_level: Option<String>,
    log_file: Option<String>,
    features: Option<Vec<String>>,
    dpi: Option<f64>,
    #[serde(default)]
    thresholds: RawThresholds,
    #[serde(default)]
    gestures: HashMap<String, RawGestureConfig>,
}

/// Threshold values - all optional so device sections can partially override.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
struct RawThresholds {
    long_press_timeout_ms: Option<f64>,
    double_tap_timeout_ms: Option<f64>,
    multi_tap_interval_ms: Option<f64>,
    swipe_complete_timeout_ms: Option<f64>,
    finger_join_interval_ms: Option<f64>,
    move_threshold_dp: Option<f64>,
    swipe_min_distance_dp: Option<f64>,
    double_tap_slop_dp: Option<f64>,
    min_pointer_separation_dp: Option<f64>,
    angle_tolerance_deg: Option<f64>,
    drag_cosine: Option<f64>,
}

/// A gesture entry (action + enabled).
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
struct RawGestureConfig {
    action: Option<String>,
    enabled: Option<bool>,
}

/// A `[device.<id>]` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawDevice {
    device_usb_id: Option<String>,
    enabled: Option<bool>,
    dpi: Option<f64>,
    #[serde(default)]
    thresholds: RawThresholds,
    #[serde(default)]
    gestures: HashMap<String, RawGestureConfig>,
}

/// Fully resolved thresholds - all values guaranteed to be present.
///
/// Times are in milliseconds, distances in density-independent pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedThresholds {
    pub long_press_timeout_ms: f64,
    pub double_tap_timeout_ms: f64,
    pub multi_tap_interval_ms: f64,
    pub swipe_complete_timeout_ms: f64,
    pub finger_join_interval_ms: f64,
    pub move_threshold_dp: f64,
    pub swipe_min_distance_dp: f64,
    pub double_tap_slop_dp: f64,
    pub min_pointer_separation_dp: f64,
    pub angle_tolerance_deg: f64,
    pub drag_cosine: f64,
}

impl Default for ValidatedThresholds {
    fn default() -> Self {
        Self {
            long_press_timeout_ms: 200.0,
            double_tap_timeout_ms: 300.0,
            multi_tap_interval_ms: 100.0,
            swipe_complete_timeout_ms: 300.0,
            finger_join_interval_ms: 100.0,
            move_threshold_dp: 10.0,
            swipe_min_distance_dp: 50.0,
            double_tap_slop_dp: 100.0,
            min_pointer_separation_dp: 200.0,
            angle_tolerance_deg: 30.0,
            drag_cosine: 0.525,
        }
    }
}

impl ValidatedThresholds {
    /// Reject values that would make the recognizer misbehave.
    fn validate(&self, scope: &str) -> Result<(), TouchguideError> {
        let checks: [(&'static str, f64, bool); 11] = [
            ("long_press_timeout_ms", self.long_press_timeout_ms, self.long_press_timeout_ms > 0.0),
            ("double_tap_timeout_ms", self.double_tap_timeout_ms, self.double_tap_timeout_ms > 0.0),
            ("multi_tap_interval_ms", self.multi_tap_interval_ms, self.multi_tap_interval_ms > 0.0),
            (
                "swipe_complete_timeout_ms",
                self.swipe_complete_timeout_ms,
                self.swipe_complete_timeout_ms > 0.0,
            ),
            (
                "finger_join_interval_ms",
                self.finger_join_interval_ms,
                self.finger_join_interval_ms > 0.0,
            ),
            ("move_threshold_dp", self.move_threshold_dp, self.move_threshold_dp > 0.0),
            ("swipe_min_distance_dp", self.swipe_min_distance_dp, self.swipe_min_distance_dp > 0.0),
            ("double_tap_slop_dp", self.double_tap_slop_dp, self.double_tap_slop_dp > 0.0),
            (
                "min_pointer_separation_dp",
                self.min_pointer_separation_dp,
                self.min_pointer_separation_dp > 0.0,
            ),
            (
                "angle_tolerance_deg",
                self.angle_tolerance_deg,
                self.angle_tolerance_deg > 0.0 && self.angle_tolerance_deg < 45.0,
            ),
            (
                "drag_cosine",
                self.drag_cosine,
                self.drag_cosine > -1.0 && self.drag_cosine < 1.0,
            ),
        ];

        match checks.into_iter().find(|(_, _, ok)| !ok) {
            Some((name, value, _)) => Err(TouchguideError::InvalidThreshold {
                scope: scope.to_string(),
                name,
                value,
            }),
            None => Ok(()),
        }
    }
}

/// Generate merge and resolve for threshold fields.
macro_rules! threshold_fields {
    ($($field:ident),+ $(,)?) => {
        impl RawThresholds {
            fn merge_with_fallback(&self, fallback: &RawThresholds) -> RawThresholds {
                RawThresholds {
                    $($field: self.$field.or(fallback.$field),)+
                }
            }

            fn resolve(self, defaults: &ValidatedThresholds) -> ValidatedThresholds {
                ValidatedThresholds {
                    $($field: self.$field.unwrap_or(defaults.$field),)+
                }
            }
        }
    };
}

threshold_fields!(
    long_press_timeout_ms,
    double_tap_timeout_ms,
    multi_tap_interval_ms,
    swipe_complete_timeout_ms,
    finger_join_interval_ms,
    move_threshold_dp,
    swipe_min_distance_dp,
    double_tap_slop_dp,
    min_pointer_separation_dp,
    angle_tolerance_deg,
    drag_cosine,
);

/// Gesture configuration (action + enabled).
#[derive(Debug, Clone)]
pub struct GestureConfig {
    pub action: Option<String>,
    pub enabled: bool,
}

/// Configuration for a single touch device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub device_usb_id: String,
    pub gestures: HashMap<String, GestureConfig>,
    pub thresholds: ValidatedThresholds,
    /// Explicit screen density; `None` means "ask the device".
    pub dpi: Option<f64>,
}

/// Top-level parsed configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub log_level: String,
    pub log_file: Option<String>,
    pub features: Features,
    pub devices: HashMap<String, DeviceConfig>,
}

/// Recognizer tolerances in device pixels and wall-clock durations.
///
/// Built once from [`ValidatedThresholds`] and the display density when a
/// recognizer is constructed; never recomputed on the event path.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizerConfig {
    pub long_press_timeout: Duration,
    pub double_tap_timeout: Duration,
    pub multi_tap_interval: Duration,
    pub swipe_complete_timeout: Duration,
    pub finger_join_interval: Duration,
    pub move_threshold: f64,
    pub swipe_min_distance: f64,
    pub double_tap_slop: f64,
    pub min_pointer_separation: f64,
    /// Minimum cosine between a swipe leg and its axis.
    pub swipe_axis_cosine: f64,
    pub drag_cosine: f64,
}

impl RecognizerConfig {
    pub fn from_thresholds(th: &ValidatedThresholds, dpi: f64) -> Self {
        let density = dpi / BASELINE_DPI;
        let ms = |v: f64| Duration::from_secs_f64(v / 1000.0);
        Self {
            long_press_timeout: ms(th.long_press_timeout_ms),
            double_tap_timeout: ms(th.double_tap_timeout_ms),
            multi_tap_interval: ms(th.multi_tap_interval_ms),
            swipe_complete_timeout: ms(th.swipe_complete_timeout_ms),
            finger_join_interval: ms(th.finger_join_interval_ms),
            move_threshold: th.move_threshold_dp * density,
            swipe_min_distance: th.swipe_min_distance_dp * density,
            double_tap_slop: th.double_tap_slop_dp * density,
            min_pointer_separation: th.min_pointer_separation_dp * density,
            swipe_axis_cosine: th.angle_tolerance_deg.to_radians().cos(),
            drag_cosine: th.drag_cosine,
        }
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self::from_thresholds(&ValidatedThresholds::default(), BASELINE_DPI)
    }
}

/// Merge gesture maps: global first, then device-specific overrides.
fn merge_gestures(
    global: &HashMap<String, RawGestureConfig>,
    device: &HashMap<String, RawGestureConfig>,
) -> HashMap<String, GestureConfig> {
    let mut merged = HashMap::new();

    // Insert all global + device gesture names, device values override.
    for (name, gc) in global.iter().chain(device.iter()) {
        let entry = merged.entry(name.clone()).or_insert(GestureConfig {
            action: None,
            enabled: false,
        });
        if gc.action.is_some() {
            entry.action.clone_from(&gc.action);
        }
        if let Some(enabled) = gc.enabled {
            entry.enabled = enabled;
        }
    }

    merged
}

fn parse_features(names: Option<&[String]>) -> Result<Features, TouchguideError> {
    let Some(names) = names else {
        return Ok(Features::TOUCH_EXPLORATION);
    };
    names.iter().try_fold(Features::empty(), |acc, name| {
        name.parse::<Feature>()
            .map(|feature| acc | feature.into())
            .map_err(|_| TouchguideError::UnknownFeature {
                scope: "global".to_string(),
                name: name.clone(),
            })
    })
}

fn check_dpi(scope: &str, dpi: Option<f64>) -> Result<Option<f64>, TouchguideError> {
    match dpi {
        Some(value) if !(value > 0.0) => Err(TouchguideError::InvalidDpi {
            scope: scope.to_string(),
            value,
        }),
        other => Ok(other),
    }
}

/// Parse a TOML config file and return the fully resolved `AppConfig`.
pub fn parse_config_file(path: &Path) -> Result<AppConfig, TouchguideError> {
    let raw: RawConfig =
        toml::from_str(
            &fs::read_to_string(path).map_err(|e| TouchguideError::ConfigReadError {
                path: path.to_path_buf(),
                source: e,
            })?,
        )
        .map_err(|e| TouchguideError::ConfigParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let features = parse_features(raw.global.features.as_deref())?;
    let global_dpi = check_dpi("global", raw.global.dpi)?;
    let defaults = ValidatedThresholds::default();
    raw.global
        .thresholds
        .clone()
        .resolve(&defaults)
        .validate("global")?;
    let mut devices = HashMap::new();

    for (device_id, raw_dev) in &raw.device {
        if !raw_dev.enabled.unwrap_or(false) {
            debug!("Device '{device_id}' is not enabled – skipping.");
            continue;
        }

        let Some(usb_id) = raw_dev.device_usb_id.as_deref().filter(|s| !s.is_empty()) else {
            warn!(
                "Device '{device_id}' is enabled but has no device_usb_id – skipping. \
                 Run 'touchguide --list-devices' to find your USB ID.",
            );
            continue;
        };

        let scope = format!("device '{device_id}'");
        let thresholds = raw_dev
            .thresholds
            .merge_with_fallback(&raw.global.thresholds)
            .resolve(&defaults);
        thresholds.validate(&scope)?;

        devices.insert(
            device_id.clone(),
            DeviceConfig {
                device_usb_id: usb_id.to_string(),
                gestures: merge_gestures(&raw.global.gestures, &raw_dev.gestures),
                thresholds,
                dpi: check_dpi(&scope, raw_dev.dpi)?.or(global_dpi),
            },
        );
    }

    Ok(AppConfig {
        log_level: raw.global.log_level.unwrap_or_else(|| "info".to_string()),
        log_file: raw.global.log_file,
        features,
        devices,
    })
}
