use std::env;
use std::fmt::Arguments;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TraceLevel {
    Off,
    Basic,
    Full,
}

const TRACE_ENV: &str = "FLOWINFER_TRACE";

const COLOR_WARNING: &str = "33";
const COLOR_ERROR: &str = "91";
const COLOR_CRITICAL: &str = "31";
const COLOR_TRACE: &str = "34";

static TRACE_LEVEL: OnceLock<TraceLevel> = OnceLock::new();

fn parse_trace_level(value: &str) -> TraceLevel {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "basic" => TraceLevel::Basic,
        "full" => TraceLevel::Full,
        _ => TraceLevel::Off,
    }
}

fn trace_level() -> TraceLevel {
    *TRACE_LEVEL.get_or_init(|| {
        env::var(TRACE_ENV)
            .ok()
            .as_deref()
            .map(parse_trace_level)
            .unwrap_or(TraceLevel::Off)
    })
}

fn trace_full_enabled() -> bool {
    matches!(trace_level(), TraceLevel::Full)
}

fn trace_basic_enabled() -> bool {
    matches!(trace_level(), TraceLevel::Full | TraceLevel::Basic)
}

fn timestamp_hms() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3_600,
        (secs % 3_600) / 60,
        secs % 60
    )
}

fn emit(kind: &str, color: &str, args: Arguments) {
    let ts = timestamp_hms();
    if color.is_empty() {
        eprintln!("{ts} [{kind}] -- {args}");
    } else {
        eprintln!("{ts} [\u{001b}[{color}m{kind}\u{001b}[0m] -- {args}");
    }
}

pub fn emit_warning(args: Arguments) {
    if trace_full_enabled() {
        emit("WARNING", COLOR_WARNING, args);
    }
}

pub fn emit_error(args: Arguments) {
    if trace_basic_enabled() {
        emit("ERROR", COLOR_ERROR, args);
    }
}

/// Always printed, regardless of `FLOWINFER_TRACE`.
pub fn emit_critical(args: Arguments) {
    emit("CRITICAL", COLOR_CRITICAL, args);
}

pub fn emit_trace(args: Arguments) {
    if trace_basic_enabled() {
        emit("TRACE", COLOR_TRACE, args);
    }
}

#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {
        $crate::logging::emit_warning(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logging::emit_error(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! critical {
    ($($arg:tt)*) => {
        $crate::logging::emit_critical(format_args!($($arg)*))
    };
}

/// Emit a trace line when `FLOWINFER_TRACE` is `1` or `full`.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::logging::emit_trace(format_args!($($arg)*))
    };
}

/// Raw `println!` passthrough.
#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        println!($($arg)*)
    };
}
