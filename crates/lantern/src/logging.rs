//! Named logger capability handed to the bridge and the transport.
//!
//! The console implementation forwards to the `log` facade using the logger
//! name as the target, so `RUST_LOG=bridge=debug`-style filters work.

use std::fmt::Write as _;
use std::sync::Arc;

use log::Level;
use parking_lot::Mutex;

#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to create logger {name}: {reason}")]
pub struct LoggerError {
    pub name: String,
    pub reason: String,
}

pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn debug(&self, message: &str);
    fn error(&self, message: &str);
    fn fatal(&self, message: &str);
    /// Dumps `bytes` as hex between `prefix` and `suffix`.
    fn buffer(&self, prefix: &str, bytes: &[u8], suffix: &str);
}

pub trait LoggerFactory {
    fn create(&self, name: &str) -> Result<Arc<dyn Logger>, LoggerError>;
}

pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    name: String,
}

impl ConsoleLogger {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Logger for ConsoleLogger {
    fn info(&self, message: &str) {
        log::info!(target: self.name.as_str(), "{}", message);
    }

    fn debug(&self, message: &str) {
        log::debug!(target: self.name.as_str(), "{}", message);
    }

    fn error(&self, message: &str) {
        log::error!(target: self.name.as_str(), "{}", message);
    }

    fn fatal(&self, message: &str) {
        log::error!(target: self.name.as_str(), "FATAL: {}", message);
    }

    fn buffer(&self, prefix: &str, bytes: &[u8], suffix: &str) {
        if log::log_enabled!(target: self.name.as_str(), Level::Debug) {
            log::debug!(target: self.name.as_str(), "{}{}{}", prefix, hex_dump(bytes), suffix);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLoggerFactory;

impl LoggerFactory for ConsoleLoggerFactory {
    fn create(&self, name: &str) -> Result<Arc<dyn Logger>, LoggerError> {
        if name.is_empty() {
            return Err(LoggerError {
                name: name.to_string(),
                reason: "logger name must not be empty".to_string(),
            });
        }
        Ok(Arc::new(ConsoleLogger::new(name)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Debug,
    Error,
    Fatal,
}

/// Keeps every line in memory. Handy for embedding and for asserting on
/// what the bridge reported.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().clone()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.lines.lock().iter().filter(|(l, _)| *l == level).count()
    }

    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines
            .lock()
            .iter()
            .any(|(l, line)| *l == level && line.contains(needle))
    }

    fn push(&self, level: LogLevel, message: String) {
        self.lines.lock().push((level, message));
    }
}

impl Logger for MemoryLogger {
    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message.to_string());
    }

    fn debug(&self, message: &str) {
        self.push(LogLevel::Debug, message.to_string());
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message.to_string());
    }

    fn fatal(&self, message: &str) {
        self.push(LogLevel::Fatal, message.to_string());
    }

    fn buffer(&self, prefix: &str, bytes: &[u8], suffix: &str) {
        self.push(
            LogLevel::Debug,
            format!("{}{}{}", prefix, hex_dump(bytes), suffix),
        );
    }
}

/// Hands out one shared [`MemoryLogger`] regardless of name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoggerFactory {
    logger: Arc<MemoryLogger>,
}

impl MemoryLoggerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logger(&self) -> Arc<MemoryLogger> {
        Arc::clone(&self.logger)
    }
}

impl LoggerFactory for MemoryLoggerFactory {
    fn create(&self, _name: &str) -> Result<Arc<dyn Logger>, LoggerError> {
        Ok(self.logger.clone())
    }
}

/// The severities the transport library logs with, mapped onto a [`Logger`].
#[derive(Clone)]
pub struct TransportLogger {
    inner: Arc<dyn Logger>,
}

impl TransportLogger {
    pub fn new(inner: Arc<dyn Logger>) -> Self {
        Self { inner }
    }

    pub fn notice(&self, message: &str) {
        self.inner.info(message);
    }

    pub fn critical(&self, message: &str) {
        self.inner.error(message);
    }

    pub fn emergency(&self, message: &str) {
        self.inner.fatal(message);
    }

    pub fn debug(&self, message: &str) {
        self.inner.debug(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_is_spaced_lowercase() {
        assert_eq!(hex_dump(&[0xb0, 0x00, 0x0a]), "b0 00 0a");
        assert_eq!(hex_dump(&[]), "");
    }

    #[test]
    fn memory_logger_records_buffers_at_debug() {
        let logger = MemoryLogger::new();
        logger.buffer("(id1) PACKET IN: ", &[0xb0, 0x01], "");
        logger.fatal("gone");

        assert!(logger.contains(LogLevel::Debug, "(id1) PACKET IN: b0 01"));
        assert_eq!(logger.count(LogLevel::Fatal), 1);
    }

    #[test]
    fn transport_logger_maps_severities() {
        let memory = Arc::new(MemoryLogger::new());
        let logger = TransportLogger::new(memory.clone());

        logger.notice("listening");
        logger.critical("socket error");
        logger.emergency("worker stopped");

        assert_eq!(
            memory.lines(),
            vec![
                (LogLevel::Info, "listening".to_string()),
                (LogLevel::Error, "socket error".to_string()),
                (LogLevel::Fatal, "worker stopped".to_string()),
            ]
        );
    }

    #[test]
    fn console_factory_rejects_empty_name() {
        assert!(ConsoleLoggerFactory.create("").is_err());
        assert!(ConsoleLoggerFactory.create("Bridge").is_ok());
    }
}
