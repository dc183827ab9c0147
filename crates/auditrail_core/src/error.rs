//! Error types for the audit log engine.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the audit log engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] auditrail_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration, fatal at startup.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// The writer has been shut down and accepts no new submissions.
    #[error("audit writer deactivated")]
    Deactivated,

    /// Another writer holds the log directory lock.
    #[error("log directory locked: another writer has exclusive access")]
    LogLocked,

    /// The log has been closed.
    #[error("log is closed")]
    LogClosed,

    /// No more records to read.
    #[error("end of log")]
    EndOfLog,

    /// A record payload exceeds the frame length field.
    #[error("record too large: {len} bytes")]
    RecordTooLarge {
        /// Payload size in bytes.
        len: usize,
    },
}

impl EngineError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
