//! touchguide: touch exploration for Linux touchscreens.
//!
//! Runs the recognizer on every configured touchscreen and executes the
//! action bound to each recognized gesture.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::sync::atomic::Ordering;
use std::time::SystemTime;

use clap::Parser;
use log::{LevelFilter, Log, Metadata, Record};
use strum::IntoEnumIterator;

use touchguide::gesture::GestureId;
use touchguide::manager::{GestureManager, list_touch_devices};

#[derive(Parser)]
#[command(
    name = "touchguide",
    version,
    about = "Touch exploration gestures for accessibility clients",
    long_about = "Watches multi-touch screens and recognizes touch exploration \
                  gestures: one-finger hover exploration, swipes and compound \
                  swipes, double taps, and two- to four-finger taps, holds and \
                  swipes. Gestures bound to an action in the config file run \
                  that action."
)]
struct Cli {
    /// Path to configuration file
    #[arg(default_value = "/etc/touchguide/touchguide.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// List available touchscreen devices and exit
    #[arg(short, long)]
    list_devices: bool,

    /// List the gesture names usable as `[*.gestures.<name>]` keys and exit
    #[arg(short = 'g', long)]
    list_gestures: bool,
}

/// Writes `[secs.millis LEVEL module] message` lines to stderr and, when
/// configured, to a log file.  Only records from this crate pass.
struct TouchguideLogger {
    level: LevelFilter,
    file: Option<Mutex<std::fs::File>>,
}

impl Log for TouchguideLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with("touchguide")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        let module = record
            .target()
            .strip_prefix("touchguide::")
            .unwrap_or("main");
        let line = format!(
            "[{}.{:03} {:<5} {module}] {}\n",
            now.as_secs(),
            now.subsec_millis(),
            record.level(),
            record.args()
        );

        // stderr ends up in the journal under systemd
        eprint!("{line}");

        if let Some(file_mutex) = &self.file
            && let Ok(mut f) = file_mutex.lock()
        {
            let _ = f.write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        if let Some(file_mutex) = &self.file
            && let Ok(mut f) = file_mutex.lock()
        {
            let _ = f.flush();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_devices {
        return list_touch_devices();
    }
    if cli.list_gestures {
        for gesture in GestureId::iter() {
            println!("{gesture}");
        }
        return ExitCode::SUCCESS;
    }

    // The config decides the log level, so it is read before the logger exists.
    let mut manager = match GestureManager::new(&cli.config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!(
                "Error: {e}\n\n\
                 To find available touchscreen devices, run:\n\
                 \x20 touchguide --list-devices"
            );
            return ExitCode::FAILURE;
        }
    };

    // --verbose wins over the configured level.
    let log_level: LevelFilter = if cli.verbose {
        LevelFilter::Debug
    } else {
        manager
            .config_log_level()
            .parse()
            .unwrap_or(LevelFilter::Info)
    };

    let log_file = manager.config_log_file().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Mutex::new(file)),
            Err(e) => {
                eprintln!("Warning: cannot open log file '{path}': {e}");
                None
            }
        }
    });

    let logger = TouchguideLogger {
        level: log_level,
        file: log_file,
    };
    if let Err(e) = log::set_boxed_logger(Box::new(logger)) {
        eprintln!("Error: cannot install logger: {e}");
        return ExitCode::FAILURE;
    }
    log::set_max_level(log_level);

    let running = manager.running_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::Relaxed);
    }) {
        log::error!("Cannot install the shutdown handler: {e}");
        return ExitCode::FAILURE;
    }

    log::info!(
        "touchguide {} using {}",
        env!("CARGO_PKG_VERSION"),
        cli.config.display()
    );
    manager.start();

    ExitCode::SUCCESS
}
