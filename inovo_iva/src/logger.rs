//! Injected logging capability.
//!
//! Components that report progress take an `Arc<dyn Logger>` instead of
//! reaching for a global. [`TracingLogger`] is the default and forwards to
//! `tracing`, so the host application's subscriber decides formatting and
//! filtering.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message)
    }
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message)
    }
    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message)
    }
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message)
    }
    fn critical(&self, message: &str) {
        self.log(LogLevel::Critical, message)
    }
}

/// Forwards to `tracing` under the given component name.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    name: String,
}

impl TracingLogger {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("inovo_iva")
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        let name = self.name.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(component = name, "{}", message),
            LogLevel::Info => tracing::info!(component = name, "{}", message),
            LogLevel::Warning => tracing::warn!(component = name, "{}", message),
            LogLevel::Error => tracing::error!(component = name, "{}", message),
            LogLevel::Critical => tracing::error!(component = name, critical = true, "{}", message),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Publishes formatted lines on a broadcast channel, for UIs that show a
/// live session log. Messages below `min_level` are dropped. Sending never
/// blocks; with no subscribers the line is discarded.
#[cfg(feature = "driver")]
#[derive(Debug, Clone)]
pub struct ChannelLogger {
    sender: tokio::sync::broadcast::Sender<String>,
    min_level: LogLevel,
}

#[cfg(feature = "driver")]
impl ChannelLogger {
    pub fn new(capacity: usize, min_level: LogLevel) -> Self {
        let (sender, _rx) = tokio::sync::broadcast::channel(capacity);
        Self { sender, min_level }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

#[cfg(feature = "driver")]
impl Logger for ChannelLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if level < self.min_level {
            return;
        }
        let _ = self.sender.send(format!("[{}] {}", level, message));
    }
}
