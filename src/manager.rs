//! Multi-device touch exploration service and device discovery (I/O layer).
//!
//! Each configured device gets a reader thread that blocks on evdev and a
//! processing thread that owns the device's [`InputInterceptor`].  Only the
//! processing thread touches the recognizer, so timers and input are
//! serialized without locks.  Pure event-processing logic lives in
//! [`crate::event`] and [`crate::recognizer`].
use std::process::{Command, ExitCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use evdev::{AbsoluteAxisType, Device};
use log::{debug, error, info, trace, warn};

use crate::chain::{Features, InputInterceptor, PointerOutput};
use crate::config::{
    AppConfig, BASELINE_DPI, DeviceConfig, RecognizerConfig, TouchguideError, parse_config_file,
};
use crate::event::{
    KeyEvent, PointerSample, SampleAssembler, SourceType, TouchEvent, classify_event,
    parse_usb_id, resolve_action,
};
use crate::gesture::GestureId;
use crate::sink::{AccessibilityEvent, ChannelSink};

/// Upper bound on how long the processing loop waits without checking the
/// running flag.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const MM_PER_INCH: f64 = 25.4;

// -- GestureManager (top-level orchestrator) ------------------

/// Runs touch exploration across multiple touch devices.
pub struct GestureManager {
    config: AppConfig,
    running: Arc<AtomicBool>,
}

impl GestureManager {
    pub fn new(config_path: impl AsRef<std::path::Path>) -> Result<Self, TouchguideError> {
        Ok(Self {
            config: parse_config_file(config_path.as_ref())?,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start listening to all configured devices.  Blocks until every device
    /// thread has finished.
    pub fn start(&mut self) {
        if self.config.devices.is_empty() {
            error!("No devices configured");
            return;
        }

        self.running.store(true, Ordering::Relaxed);
        info!(
            "Starting touch exploration (features: {})",
            self.config
                .features
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut handles = Vec::new();

        for (device_id, device_config) in &self.config.devices {
            let Some(device) = find_device(device_id, device_config) else {
                warn!("Device not found: {device_id}");
                continue;
            };
            let device_id = device_id.clone();
            let config = device_config.clone();
            let features = self.config.features;
            let running = Arc::clone(&self.running);

            let spawned = thread::Builder::new()
                .name(format!("touch-{device_id}"))
                .spawn(move || run_device_loop(&device_id, device, &config, features, &running));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => error!("Failed to spawn device thread: {e}"),
            }
        }

        if handles.is_empty() {
            error!("No devices found, exiting");
            return;
        }

        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Get a reference to the running flag for signal handling.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Get the log level from the parsed configuration.
    pub fn config_log_level(&self) -> &str {
        &self.config.log_level
    }

    /// Get the optional log file path from the parsed configuration.
    pub fn config_log_file(&self) -> Option<&str> {
        self.config.log_file.as_deref()
    }
}

// -- Device I/O -----------------------------------------------

/// Check if a device has multi-touch capabilities.
fn is_touch_device(device: &Device) -> bool {
    let Some(abs_axes) = device.supported_absolute_axes() else {
        return false;
    };
    abs_axes.contains(AbsoluteAxisType::ABS_MT_POSITION_X)
        && abs_axes.contains(AbsoluteAxisType::ABS_MT_POSITION_Y)
}

/// Find a touchscreen device by USB vendor:product ID.
fn find_device(device_id: &str, config: &DeviceConfig) -> Option<Device> {
    let Some((vendor, product)) = parse_usb_id(&config.device_usb_id) else {
        warn!(
            "Device {device_id}: invalid USB ID format '{}' (expected vendor:product)",
            config.device_usb_id
        );
        return None;
    };

    for (path, device) in evdev::enumerate() {
        if !is_touch_device(&device) {
            continue;
        }
        let id = device.input_id();
        if id.vendor() == vendor && id.product() == product {
            info!(
                "Found device for {} by USB ID {}: {} ({})",
                device_id,
                config.device_usb_id,
                device.name().unwrap_or("unknown"),
                path.display()
            );
            return Some(device);
        }
    }

    warn!(
        "Device {}: no touch device with USB ID {} found",
        device_id, config.device_usb_id
    );
    None
}

/// Screen density from an evdev axis resolution in units per millimetre.
pub fn dpi_from_resolution(units_per_mm: i32) -> Option<f64> {
    (units_per_mm > 0).then(|| f64::from(units_per_mm) * MM_PER_INCH)
}

/// Configured dpi, else the device's reported resolution, else the baseline.
fn resolve_dpi(device_id: &str, device: &Device, config: &DeviceConfig) -> f64 {
    if let Some(dpi) = config.dpi {
        return dpi;
    }
    let reported = match device.get_abs_state() {
        Ok(abs) => dpi_from_resolution(abs[AbsoluteAxisType::ABS_MT_POSITION_X.0 as usize].resolution),
        Err(e) => {
            warn!("Device {device_id}: failed to get abs state: {e}");
            None
        }
    };
    reported.unwrap_or_else(|| {
        warn!("Device {device_id}: no axis resolution reported, assuming {BASELINE_DPI} dpi");
        BASELINE_DPI
    })
}

/// Messages from a reader thread to its processing loop.
enum DeviceMessage {
    Events(Instant, Vec<TouchEvent>),
    Disconnected(String),
}

/// Forward classified multi-touch events from `device` until it fails or the
/// processing loop hangs up.
fn spawn_reader(device_id: &str, mut device: Device, tx: Sender<DeviceMessage>) -> bool {
    let spawned = thread::Builder::new()
        .name(format!("reader-{device_id}"))
        .spawn(move || {
            loop {
                match device.fetch_events() {
                    Ok(events) => {
                        let batch: Vec<TouchEvent> =
                            events.filter_map(|e| classify_event(&e)).collect();
                        if batch.is_empty() {
                            continue;
                        }
                        if tx.send(DeviceMessage::Events(Instant::now(), batch)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(DeviceMessage::Disconnected(e.to_string()));
                        return;
                    }
                }
            }
        });
    match spawned {
        Ok(_) => true,
        Err(e) => {
            error!("Device {device_id}: failed to spawn reader thread: {e}");
            false
        }
    }
}

/// Terminal output of the chain.  Re-injection is left to the platform, so
/// pass-through input is only traced.
struct TracingOutput {
    device_id: String,
}

impl PointerOutput for TracingOutput {
    fn deliver_pointer(&self, event: &PointerSample) {
        trace!(
            "{}: {:?} pointer {} ({} down) at {:?}",
            self.device_id,
            event.action,
            event.pointer_id,
            event.pressed_count(),
            event.time
        );
    }

    fn deliver_key(&self, event: &KeyEvent) {
        trace!("{}: key {} pressed={}", self.device_id, event.code, event.pressed);
    }
}

/// Build the interceptor for one device and run its processing loop.
fn run_device_loop(
    device_id: &str,
    device: Device,
    config: &DeviceConfig,
    features: Features,
    running: &Arc<AtomicBool>,
) {
    let dpi = resolve_dpi(device_id, &device, config);
    info!(
        "Started processing device: {device_id} (USB {}, {dpi:.0} dpi)",
        config.device_usb_id
    );

    let (event_tx, accessibility_events) = mpsc::channel();
    let mut interceptor = InputInterceptor::new(
        RecognizerConfig::from_thresholds(&config.thresholds, dpi),
        Arc::new(ChannelSink::new(event_tx)),
        Arc::new(TracingOutput {
            device_id: device_id.to_string(),
        }),
    );
    interceptor.set_features(features);

    let (tx, rx) = mpsc::channel();
    if !spawn_reader(device_id, device, tx.clone()) {
        return;
    }

    let mut assembler = SampleAssembler::new(SourceType::Touchscreen);
    let epoch = Instant::now();
    let mut horizon = Duration::ZERO;

    while running.load(Ordering::Relaxed) {
        let timeout = interceptor
            .next_deadline()
            .map_or(POLL_INTERVAL, |deadline| {
                deadline.saturating_sub(epoch.elapsed()).min(POLL_INTERVAL)
            });

        match rx.recv_timeout(timeout) {
            Ok(DeviceMessage::Events(at, batch)) => {
                // Timers may already have fired past the read time.
                let time = at.saturating_duration_since(epoch).max(horizon);
                for event in &batch {
                    for sample in assembler.push(event, time) {
                        interceptor.on_pointer_event(&sample);
                    }
                }
            }
            Ok(DeviceMessage::Disconnected(reason)) => {
                warn!("Device {device_id} disconnected: {reason}");
                if let Some(sample) = assembler.cancel(epoch.elapsed().max(horizon)) {
                    interceptor.on_pointer_event(&sample);
                }
                drain_events(device_id, &accessibility_events, config);
                let Some(device) = attempt_reconnect(device_id, config, running) else {
                    break;
                };
                if !spawn_reader(device_id, device, tx.clone()) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        horizon = horizon.max(epoch.elapsed());
        interceptor.advance_to(horizon);
        drain_events(device_id, &accessibility_events, config);
    }

    interceptor.destroy_events();
    info!("Stopped processing device: {device_id}");
}

/// Act on everything touch exploration reported since the last call.
fn drain_events(device_id: &str, events: &Receiver<AccessibilityEvent>, config: &DeviceConfig) {
    for event in events.try_iter() {
        match event {
            AccessibilityEvent::Touch(lifecycle) => debug!("{device_id}: touch {lifecycle:?}"),
            AccessibilityEvent::Gesture(gesture) => execute_gesture(device_id, gesture, config),
        }
    }
}

/// Spawn the shell command for a recognized gesture.
fn execute_gesture(device_id: &str, gesture: GestureId, config: &DeviceConfig) {
    let Some(action) = resolve_action(gesture, &config.gestures) else {
        debug!("{device_id}: {gesture} (no action configured)");
        return;
    };
    match Command::new("sh").arg("-c").arg(action).spawn() {
        Ok(_) => debug!("Spawned action: {action}"),
        Err(e) => error!("Failed to execute action '{action}': {e}"),
    }
    info!("{device_id}: {gesture}");
}

/// Wait for a disconnected device to come back.
fn attempt_reconnect(
    device_id: &str,
    config: &DeviceConfig,
    running: &Arc<AtomicBool>,
) -> Option<Device> {
    const MAX_RETRIES: usize = 10;
    const RETRY_INTERVAL: Duration = Duration::from_secs(5);

    for attempt in 1..=MAX_RETRIES {
        if !running.load(Ordering::Relaxed) {
            return None;
        }
        info!("Reconnect attempt {attempt}/{MAX_RETRIES} for {device_id}...");
        thread::sleep(RETRY_INTERVAL);

        if let Some(device) = find_device(device_id, config) {
            info!("Reconnected to {device_id}");
            return Some(device);
        }
    }
    error!("Failed to reconnect to {device_id} after {MAX_RETRIES} attempts");
    None
}

/// List all multi-touch capable devices.
pub fn list_touch_devices() -> ExitCode {
    println!("\n=== touchguide: Available Touchscreen Devices ===\n");
    let mut touch_count = 0;

    for (path, device) in evdev::enumerate() {
        if !is_touch_device(&device) {
            continue;
        }

        touch_count += 1;
        let dpi = device
            .get_abs_state()
            .ok()
            .and_then(|abs| {
                dpi_from_resolution(abs[AbsoluteAxisType::ABS_MT_POSITION_X.0 as usize].resolution)
            })
            .map_or_else(|| "unknown".to_string(), |dpi| format!("{dpi:.0}"));
        println!(
            "Device {touch_count}:\n\
             \x20 Path:      {}\n\
             \x20 Name:      {}\n\
             \x20 USB ID:    {:04x}:{:04x}\n\
             \x20 Phys:      {}\n\
             \x20 DPI:       {dpi}\n",
            path.display(),
            device.name().unwrap_or("unknown"),
            device.input_id().vendor(),
            device.input_id().product(),
            device.physical_path().unwrap_or("N/A"),
        );
    }

    if touch_count == 0 {
        println!(
            "No multi-touch devices found.\n\n\
             Troubleshooting:\n\
             \x20 - Check if touchscreen is connected\n\
             \x20 - Run 'libinput list-devices' to see all devices\n\
             \x20 - Run as root if devices are not visible"
        );
        return ExitCode::FAILURE;
    }

    println!(
        "Found {touch_count} touch device(s).\n\n\
         Add the USB ID to your touchguide.toml:\n\
         \x20 [device.<name>]\n\
         \x20 device_usb_id = \"<USB ID>\"\n\
         \x20 enabled = true"
    );
    ExitCode::SUCCESS
}
