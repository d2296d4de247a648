use super::*;
use ringlog::Level;

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::Error,
            LogLevel::Warn => Level::Warn,
            LogLevel::Info => Level::Info,
            LogLevel::Debug => Level::Debug,
            LogLevel::Trace => Level::Trace,
        }
    }
}

fn log_level() -> LogLevel {
    LogLevel::Info
}

fn log_max_size() -> u64 {
    1024 * 1024 * 1024
}

fn log_queue_depth() -> usize {
    4096
}

fn log_single_message_size() -> usize {
    1024
}

#[derive(Clone, Deserialize)]
pub struct Debug {
    #[serde(default = "log_level")]
    log_level: LogLevel,
    /// Debug log file. When unset, the debug log goes to stderr.
    #[serde(default)]
    log_file: Option<String>,
    /// File the previous debug log is rotated to. Defaults to the log file
    /// with a `.old` suffix.
    #[serde(default)]
    log_backup: Option<String>,
    #[serde(default = "log_max_size")]
    log_max_size: u64,
    #[serde(default = "log_queue_depth")]
    log_queue_depth: usize,
    #[serde(default = "log_single_message_size")]
    log_single_message_size: usize,
}

impl Default for Debug {
    fn default() -> Self {
        Self {
            log_level: log_level(),
            log_file: None,
            log_backup: None,
            log_max_size: log_max_size(),
            log_queue_depth: log_queue_depth(),
            log_single_message_size: log_single_message_size(),
        }
    }
}

impl Debug {
    pub fn log_level(&self) -> Level {
        self.log_level.into()
    }

    pub fn log_file(&self) -> Option<String> {
        self.log_file.clone()
    }

    pub fn log_backup(&self) -> Option<String> {
        self.log_backup.clone()
    }

    pub fn log_max_size(&self) -> u64 {
        self.log_max_size
    }

    pub fn log_queue_depth(&self) -> usize {
        self.log_queue_depth
    }

    pub fn log_single_message_size(&self) -> usize {
        self.log_single_message_size
    }
}
