use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Local;

/// Log verbosity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    #[default]
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl FromStr for LogLevel {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(()),
        }
    }
}

/// Rotate once the live file reaches this size.
const MAX_LOG_SIZE_KB: u64 = 2_048;
/// Keep this many rotated files (`.1` newest .. `.5` oldest).
const MAX_LOG_KEEP: u32 = 5;

/// Leveled stderr logger with an optional size-rotated file sink. Logging
/// is fire-and-forget: file problems are swallowed, never surfaced to the
/// caller.
#[derive(Clone)]
pub struct Logger {
    level: LogLevel,
    path: Option<PathBuf>,
}

impl Logger {
    pub fn new(level: LogLevel, file_path: Option<String>) -> Self {
        let env_level = std::env::var("SIGNWX_LOG_LEVEL")
            .ok()
            .and_then(|s| LogLevel::from_str(&s).ok());
        let env_file = std::env::var("SIGNWX_LOG_PATH").ok();
        Self {
            level: env_level.unwrap_or(level),
            path: file_path.or(env_file).map(PathBuf::from),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn log(&self, level: LogLevel, msg: impl AsRef<str>) {
        if level > self.level {
            return;
        }
        let stamp = Local::now().format("%m/%d/%y %H:%M:%S");
        let line = format!("[{stamp}] [{level:?}] {}", msg.as_ref());
        eprintln!("{line}");
        if let Some(path) = self.path.as_ref() {
            let _ = append_with_rotation(path, &line);
        }
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Error, msg);
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Warn, msg);
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Info, msg);
    }

    pub fn debug(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Debug, msg);
    }

    #[allow(dead_code)]
    pub fn trace(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Trace, msg);
    }
}

fn append_with_rotation(path: &Path, line: &str) -> std::io::Result<()> {
    rotate_if_needed(path)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

fn rotate_if_needed(path: &Path) -> std::io::Result<()> {
    let size_kb = match fs::metadata(path) {
        Ok(meta) => meta.len() / 1024,
        Err(_) => return Ok(()),
    };
    if size_kb < MAX_LOG_SIZE_KB {
        return Ok(());
    }
    for i in (1..MAX_LOG_KEEP).rev() {
        let src = rotated_name(path, i);
        if src.exists() {
            fs::rename(&src, rotated_name(path, i + 1))?;
        }
    }
    fs::rename(path, rotated_name(path, 1))
}

fn rotated_name(path: &Path, index: u32) -> PathBuf {
    PathBuf::from(format!("{}.{index}", path.display()))
}
