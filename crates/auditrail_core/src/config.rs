//! Audit log configuration.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::{EngineError, EngineResult};

/// Default maximum total bytes retained across sealed segments (16 GiB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 16 * 1024 * 1024 * 1024;

/// How often the log seals the current segment and starts a new one.
///
/// The cycle also determines segment file names: each segment is named after
/// its zero-padded UTC window, so lexical order equals chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollCycle {
    /// One segment per minute.
    Minutely,
    /// One segment per hour (default).
    Hourly,
    /// One segment per day.
    Daily,
}

impl RollCycle {
    /// Returns the window label for a timestamp in epoch milliseconds.
    ///
    /// Timestamps outside chrono's representable range collapse to the
    /// epoch window rather than failing an append.
    #[must_use]
    pub fn window_label(self, timestamp_millis: i64) -> String {
        let dt = DateTime::<Utc>::from_timestamp_millis(timestamp_millis)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let pattern = match self {
            Self::Minutely => "%Y%m%d%H%M",
            Self::Hourly => "%Y%m%d%H",
            Self::Daily => "%Y%m%d",
        };
        dt.format(pattern).to_string()
    }
}

impl Default for RollCycle {
    fn default() -> Self {
        Self::Hourly
    }
}

/// Configuration for opening an audit log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory holding segment files. Required.
    pub dir: PathBuf,

    /// Segment roll cycle.
    pub roll_cycle: RollCycle,

    /// Maximum total bytes retained across sealed segments.
    pub max_log_size: u64,
}

impl LogConfig {
    /// Creates a configuration for `dir` with default roll cycle and budget.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            roll_cycle: RollCycle::default(),
            max_log_size: DEFAULT_MAX_LOG_SIZE,
        }
    }

    /// Sets the roll cycle.
    #[must_use]
    pub fn roll_cycle(mut self, cycle: RollCycle) -> Self {
        self.roll_cycle = cycle;
        self
    }

    /// Sets the retention budget in bytes.
    #[must_use]
    pub const fn max_log_size(mut self, bytes: u64) -> Self {
        self.max_log_size = bytes;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the directory path is empty or the
    /// size budget is not positive. Fatal at startup, before any record is
    /// written.
    pub fn validate(&self) -> EngineResult<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(EngineError::config("log directory must be set"));
        }
        if self.max_log_size == 0 {
            return Err(EngineError::config("max_log_size must be positive"));
        }
        Ok(())
    }
}
