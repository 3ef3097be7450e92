//! Minimal internal logger — global atomic level, no external log facade.
//!
//! Ported from the log utility this crate's allocation engine grew out of;
//! the allocator traces region acquisition/release and notable free-list
//! events (split, coalesce, exhaustion) at [`LogLevel::Debug`].

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Off = 4,
}

impl LogLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            3 => LogLevel::Error,
            _ => LogLevel::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);

pub fn set_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn level() -> LogLevel {
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(msg_level: LogLevel) -> bool {
    msg_level >= level()
}

pub fn log(msg_level: LogLevel, module: &str, msg: &str) {
    if enabled(msg_level) {
        eprintln!("[{}] {}: {}", msg_level.label(), module, msg);
    }
}

macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogLevel::Debug,
            module_path!(),
            &format!($($arg)*),
        )
    };
}

macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogLevel::Warn,
            module_path!(),
            &format!($($arg)*),
        )
    };
}

pub(crate) use log_debug;
pub(crate) use log_warn;
