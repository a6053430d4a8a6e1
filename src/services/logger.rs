use crate::constants::limits::MAX_WARNINGS;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }

    fn from_env() -> Self {
        ["SSHLINK_LOG_LEVEL", "LOG_LEVEL"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find_map(|raw| LogLevel::parse(&raw))
            .unwrap_or(LogLevel::Warn)
    }

    fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    error: u64,
    warn: u64,
    info: u64,
    debug: u64,
}

#[derive(Debug, Default)]
struct Shared {
    counters: Counters,
    warnings: VecDeque<String>,
    /// Lines kept in memory instead of printed; only set by `Logger::capturing`.
    captured: Option<Vec<String>>,
}

/// Leveled logger writing to stderr. Clones and children share counters and
/// the warning queue, so one session's channels and SFTP layer report into
/// the same place.
#[derive(Debug, Clone)]
pub struct Logger {
    context: String,
    level: LogLevel,
    shared: Arc<Mutex<Shared>>,
}

impl Logger {
    pub fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
            level: LogLevel::from_env(),
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    /// Logger that records lines in memory; used by tests to observe
    /// failures that are deliberately not surfaced to callers.
    pub fn capturing(context: &str, level: LogLevel) -> Self {
        let logger = Self {
            context: context.to_string(),
            level,
            shared: Arc::new(Mutex::new(Shared::default())),
        };
        logger.lock().captured = Some(Vec::new());
        logger
    }

    pub fn child(&self, suffix: &str) -> Self {
        let context = if suffix.is_empty() {
            self.context.clone()
        } else {
            format!("{}:{}", self.context, suffix)
        };
        Self {
            context,
            level: self.level,
            shared: self.shared.clone(),
        }
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn log(&self, level: LogLevel, message: &str, meta: Option<&serde_json::Value>) {
        let meta_suffix = meta
            .filter(|m| !m.is_null())
            .map(|m| format!(" {}", m))
            .unwrap_or_default();
        let mut shared = self.lock();
        if level == LogLevel::Warn {
            if shared.warnings.len() >= MAX_WARNINGS {
                shared.warnings.pop_front();
            }
            shared
                .warnings
                .push_back(format!("[{}] {}{}", self.context, message, meta_suffix));
        }
        if level > self.level {
            return;
        }
        match level {
            LogLevel::Error => shared.counters.error += 1,
            LogLevel::Warn => shared.counters.warn += 1,
            LogLevel::Info => shared.counters.info += 1,
            LogLevel::Debug => shared.counters.debug += 1,
        }
        let line = format!(
            "[{}] {} [{}] {}{}",
            chrono::Utc::now().to_rfc3339(),
            level.label(),
            self.context,
            message,
            meta_suffix
        );
        match shared.captured.as_mut() {
            Some(lines) => lines.push(line),
            None => eprintln!("{}", line),
        }
    }

    pub fn error(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Error, message, meta);
    }

    pub fn warn(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Warn, message, meta);
    }

    pub fn info(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Info, message, meta);
    }

    pub fn debug(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Debug, message, meta);
    }

    /// Drains queued warnings regardless of the print level.
    pub fn take_warnings(&self) -> Vec<String> {
        self.lock().warnings.drain(..).collect()
    }

    pub fn captured(&self) -> Vec<String> {
        self.lock().captured.clone().unwrap_or_default()
    }

    pub fn stats(&self) -> serde_json::Value {
        let shared = self.lock();
        serde_json::json!({
            "level": format!("{:?}", self.level).to_lowercase(),
            "context": self.context,
            "error": shared.counters.error,
            "warn": shared.counters.warn,
            "info": shared.counters.info,
            "debug": shared.counters.debug,
            "pending_warnings": shared.warnings.len(),
        })
    }
}
