//! Run log for debugging shoal.
//!
//! Every invocation rewrites `~/.shoal/shoal.log`. The first line names the
//! command being run; once the project is loaded a second line records the
//! mode and root. Each record after that is tagged with the command and mode,
//! so a development watch session never reads like a production build.
//!
//! Log levels:
//! - ERROR: Task failures and server errors
//! - WARN: Recoverable problems (dropped watch events, lint findings in development)
//! - INFO: Task lifecycle, watch triggers, server start
//! - DEBUG: Tool invocations, file decisions (written / skipped)
//! - TRACE: Raw tool output
//!
//! `--debug` or `SHOAL_DEBUG=1` turns on DEBUG, `SHOAL_DEBUG=trace` turns on
//! everything. Console progress lines are written separately by
//! [`crate::report`].

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use crate::config::Mode;

/// Environment variable that raises the log level.
pub const DEBUG_ENV: &str = "SHOAL_DEBUG";

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static COMMAND: OnceLock<String> = OnceLock::new();
static MODE: OnceLock<Mode> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Level for a run given the `--debug` flag and the value of `SHOAL_DEBUG`.
    pub fn for_run(debug_flag: bool, env: Option<&str>) -> Self {
        match env.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("trace") => LogLevel::Trace,
            Some("1") | Some("true") | Some("debug") => LogLevel::Debug,
            _ if debug_flag => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

/// Start the log for `command` (e.g. `build`, `watch`, `swim`).
pub fn init(command: &str, debug: bool) {
    let level = LogLevel::for_run(debug, std::env::var(DEBUG_ENV).ok().as_deref());
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
    COMMAND.set(command.to_string()).ok();

    if let Some(shoal_dir) = dirs::home_dir().map(|h| h.join(".shoal")) {
        let _ = std::fs::create_dir_all(&shoal_dir);
        let path = shoal_dir.join("shoal.log");
        let header = format!(
            "=== shoal {} started {} (pid {}, level {}) ===\n",
            command,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            std::process::id(),
            level.as_str()
        );
        let _ = std::fs::write(&path, header);
        LOG_PATH.set(path).ok();
    }
}

/// Record the build mode and project root once the config is loaded.
///
/// Later records are tagged with the mode.
pub fn attach_project(mode: Mode, root: &Path) {
    MODE.set(mode).ok();
    log_at(
        LogLevel::Info,
        &format!("project {} in {} mode", root.display(), mode),
    );
}

fn get_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// `[time] [LEVEL] [command/mode] message`
fn format_record(
    timestamp: &str,
    level: LogLevel,
    command: Option<&str>,
    mode: Option<Mode>,
    msg: &str,
) -> String {
    let scope = match (command, mode) {
        (Some(command), Some(mode)) => format!("{}/{}", command, mode),
        (Some(command), None) => command.to_string(),
        (None, Some(mode)) => mode.to_string(),
        (None, None) => "-".to_string(),
    };
    format!("[{}] [{}] [{}] {}", timestamp, level.as_str(), scope, msg)
}

/// Log a message at the specified level.
pub fn log_at(level: LogLevel, msg: &str) {
    if level > get_level() {
        return;
    }

    if let Some(path) = LOG_PATH.get() {
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let timestamp = chrono::Local::now().format("%H:%M:%S%.3f").to_string();
            let record = format_record(
                &timestamp,
                level,
                COMMAND.get().map(String::as_str),
                MODE.get().copied(),
                msg,
            );
            let _ = writeln!(file, "{}", record);
        }
    }
}

pub fn log(msg: &str) {
    log_at(LogLevel::Info, msg);
}

pub fn error(msg: &str) {
    log_at(LogLevel::Error, msg);
}

pub fn warn(msg: &str) {
    log_at(LogLevel::Warn, msg);
}

pub fn debug(msg: &str) {
    log_at(LogLevel::Debug, msg);
}

pub fn trace(msg: &str) {
    log_at(LogLevel::Trace, msg);
}

/// Log macro for INFO level.
#[macro_export]
macro_rules! slog {
    ($($arg:tt)*) => {
        $crate::log::log(&format!($($arg)*))
    };
}

/// Log macro for ERROR level.
#[macro_export]
macro_rules! slog_error {
    ($($arg:tt)*) => {
        $crate::log::error(&format!($($arg)*))
    };
}

/// Log macro for WARN level.
#[macro_export]
macro_rules! slog_warn {
    ($($arg:tt)*) => {
        $crate::log::warn(&format!($($arg)*))
    };
}

/// Log macro for DEBUG level.
#[macro_export]
macro_rules! slog_debug {
    ($($arg:tt)*) => {
        $crate::log::debug(&format!($($arg)*))
    };
}

/// Log macro for TRACE level (raw tool output).
#[macro_export]
macro_rules! slog_trace {
    ($($arg:tt)*) => {
        $crate::log::trace(&format!($($arg)*))
    };
}
