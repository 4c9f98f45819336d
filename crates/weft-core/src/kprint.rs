//! Kernel-style print macros for weft
//!
//! Thread-safe, optionally-flushing diagnostic output to stderr. Every leveled
//! record carries the name of the emitting thread, which is what you want to
//! see when a task hops between the caller and the pool workers.
//!
//! # Environment Variables
//!
//! - `WEFT_FLUSH_EPRINT=1` - Flush stderr after each record (useful before an abort)
//! - `WEFT_LOG_LEVEL=<level>` - off|error|warn|info|debug|trace, or 0..=5
//!
//! # Usage
//!
//! ```ignore
//! use weft_core::{kinfo, kdebug, fatal};
//!
//! kinfo!("pool started with {} workers", n);
//! kdebug!("worker {} resumed {} tasks", id, count);
//! fatal!("task resumed after completion");   // logs, then aborts
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Log levels
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Parse a level name or digit; `None` for anything unrecognised.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "1" => Some(LogLevel::Error),
            "warn" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize logging from the environment.
///
/// Runs at most once; the first log call triggers it implicitly.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    FLUSH_ENABLED.store(
        crate::env::env_get_bool("WEFT_FLUSH_EPRINT", false),
        Ordering::Relaxed,
    );

    if let Some(level) = std::env::var("WEFT_LOG_LEVEL")
        .ok()
        .and_then(|v| LogLevel::parse(&v))
    {
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

#[inline]
fn ensure_init() {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
}

#[inline]
pub fn flush_enabled() -> bool {
    ensure_init();
    FLUSH_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn log_level() -> LogLevel {
    ensure_init();
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level programmatically (overrides `WEFT_LOG_LEVEL`)
pub fn set_log_level(level: LogLevel) {
    ensure_init();
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn set_flush_enabled(enabled: bool) {
    ensure_init();
    FLUSH_ENABLED.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

fn write_record(level: LogLevel, args: std::fmt::Arguments<'_>, force_flush: bool) {
    let current = std::thread::current();
    let thread = current.name().unwrap_or("<unnamed>");

    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = write!(handle, "{} [{}] ", level.prefix(), thread);
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if force_flush || flush_enabled() {
        let _ = handle.flush();
    }
}

#[doc(hidden)]
pub fn _kprintln_impl(args: std::fmt::Arguments<'_>) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if flush_enabled() {
        let _ = handle.flush();
    }
}

#[doc(hidden)]
pub fn _klog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if level_enabled(level) {
        write_record(level, args, false);
    }
}

/// Report a contract violation and abort the process.
///
/// Printed regardless of the configured level and always flushed.
#[doc(hidden)]
#[cold]
pub fn _fatal_impl(args: std::fmt::Arguments<'_>) -> ! {
    write_record(LogLevel::Error, format_args!("fatal: {}", args), true);
    std::process::abort()
}

// ============================================================================
// Public Macros
// ============================================================================

/// Print to stderr with newline (no level, no prefix)
#[macro_export]
macro_rules! kprintln {
    () => {{
        $crate::kprint::_kprintln_impl(format_args!(""));
    }};
    ($($arg:tt)*) => {{
        $crate::kprint::_kprintln_impl(format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Error,
            format_args!($($arg)*)
        );
    }};
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Warn,
            format_args!($($arg)*)
        );
    }};
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Info,
            format_args!($($arg)*)
        );
    }};
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Debug,
            format_args!($($arg)*)
        );
    }};
}

#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Trace,
            format_args!($($arg)*)
        );
    }};
}

/// Log at error level and abort. Used for programmer misuse and
/// unrecoverable resource exhaustion, never for runtime failures.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::kprint::_fatal_impl(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels_ordered() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_parse_names_and_digits() {
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" WARN "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("0"), Some(LogLevel::Off));
        assert_eq!(LogLevel::parse("5"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::from_u8(99), LogLevel::Trace);
    }

    #[test]
    fn test_off_is_never_enabled() {
        assert!(!level_enabled(LogLevel::Off));
    }

    #[test]
    fn test_macros_compile() {
        kprintln!("kprint smoke {}", 1);
        kerror!("error {}", "msg");
        kwarn!("warn");
        kinfo!("info");
        kdebug!("debug");
        ktrace!("trace");
    }
}
