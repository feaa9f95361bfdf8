use log::{Metadata, Record};

macro_rules! trace {
    ($($arg:tt)+) => { log::trace!($($arg)+) };
}

macro_rules! debug {
    ($($arg:tt)+) => { log::debug!($($arg)+) };
}

macro_rules! info {
    ($($arg:tt)+) => { log::info!($($arg)+) };
}

macro_rules! warning {
    ($($arg:tt)+) => { log::warn!($($arg)+) };
}

macro_rules! error {
    ($($arg:tt)+) => { log::error!($($arg)+) };
}

pub(crate) use {debug, error, info, trace, warning};

/// Codes used to specify different levels of API logging.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(value: log::Level) -> Self {
        match value {
            log::Level::Trace => LogLevel::Trace,
            log::Level::Debug => LogLevel::Debug,
            log::Level::Info => LogLevel::Info,
            log::Level::Warn => LogLevel::Warning,
            log::Level::Error => LogLevel::Error,
        }
    }
}

impl From<LogLevel> for log::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// Set the callback function that is called when logging.
///
/// The `callback` function's first parameter is the level of the message being
/// logged, and the second is the message itself. Returns an error if a logger
/// has already been installed.
pub fn set_logging_callback<T>(callback: T) -> Result<(), log::SetLoggerError>
where
    T: Fn(LogLevel, &str) + Send + Sync + 'static,
{
    let logger = Box::new(CallbackLogger { callback });

    log::set_boxed_logger(logger).map(|()| log::set_max_level(log::LevelFilter::Trace))
}

pub(crate) fn is_log_enabled(level: LogLevel) -> bool {
    log::Level::from(level) <= log::max_level()
}

/// Render an error and its whole source chain as a single string.
pub(crate) fn format_details(error: &dyn std::error::Error) -> String {
    let mut details = error.to_string();

    let mut source = error.source();
    while let Some(error) = source {
        details.push_str(": ");
        details.push_str(&error.to_string());
        source = error.source();
    }

    details
}

struct CallbackLogger<T: Fn(LogLevel, &str)> {
    callback: T,
}

impl<T: Fn(LogLevel, &str)> std::fmt::Debug for CallbackLogger<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackLogger").finish_non_exhaustive()
    }
}

impl<T: Fn(LogLevel, &str) + Send + Sync> log::Log for CallbackLogger<T> {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            (self.callback)(record.level().into(), &format!("{}", record.args()));
        }
    }

    fn flush(&self) {}
}
