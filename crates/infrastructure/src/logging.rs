//! Level-filtered file logger.
//!
//! This is the gateway's own log file (rule `log` actions and lifecycle
//! messages land here); console diagnostics use `tracing` as everywhere
//! else. The sink opens the file per write and flushes, so lines survive
//! a crash of the process.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    /// Case-insensitive; `warn` and `warning` both map to `Warn`.
    pub fn parse(s: &str) -> Option<Level> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "fatal" => Some(Level::Fatal),
            _ => None,
        }
    }
}

pub struct FileLogger {
    path: PathBuf,
    level: RwLock<Level>,
    // serializes appends from concurrent callers
    io: Mutex<()>,
}

impl FileLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            level: RwLock::new(Level::Info),
            io: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_level(&self, level: Level) {
        *self.level.write().unwrap() = level;
    }

    pub fn level(&self) -> Level {
        *self.level.read().unwrap()
    }

    /// Append one line if `level` clears the current threshold. The tag
    /// bracket is omitted when `tag` is empty. Sink errors are swallowed.
    pub fn log(&self, level: Level, tag: &str, msg: &str) {
        if level < self.level() {
            return;
        }
        let line = format_line(Local::now(), level, tag, msg);

        let _guard = self.io.lock().unwrap();
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = file.write_all(line.as_bytes());
            let _ = file.flush();
        }
    }

    /// Best-effort.
    pub fn flush(&self) {
        let _guard = self.io.lock().unwrap();
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = file.flush();
        }
    }
}

fn format_line(ts: DateTime<Local>, level: Level, tag: &str, msg: &str) -> String {
    if tag.is_empty() {
        format!("{} [{}] {}\n", ts.format("%Y-%m-%d %H:%M:%S"), level.as_str(), msg)
    } else {
        format!(
            "{} [{}] [{}] {}\n",
            ts.format("%Y-%m-%d %H:%M:%S"),
            level.as_str(),
            tag,
            msg
        )
    }
}
