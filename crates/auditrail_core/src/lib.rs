//! Durable, size-bounded persistence for audit records.
//!
//! The engine accepts [`auditrail_codec::AuditRecord`]s through a bounded
//! queue, appends them from a single writer thread into time-windowed
//! segment files, and deletes the oldest segments once the directory
//! exceeds its size budget.
//!
//! ```no_run
//! use auditrail_core::{AuditLogEngine, LogConfig};
//! use auditrail_codec::{AuditRecord, OperationStatus};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! # fn main() -> auditrail_core::EngineResult<()> {
//! let engine = AuditLogEngine::open(LogConfig::new("/var/log/audit"))?;
//! engine.submit(AuditRecord::single(
//!     1_700_000_000_000,
//!     IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
//!     IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
//!     "alice",
//!     OperationStatus::Attempt,
//!     "SELECT * FROM users",
//! ))?;
//! engine.shutdown()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod discovery;
mod engine;
mod error;
mod log;
mod reader;
mod rotation;
mod segment;
mod writer;

pub use config::{LogConfig, RollCycle, DEFAULT_MAX_LOG_SIZE};
pub use discovery::SegmentDiscovery;
pub use engine::AuditLogEngine;
pub use error::{EngineError, EngineResult};
pub use log::{AppendLog, SegmentedLog, LOCK_FILE, MAX_RECORD_LEN, SEGMENT_SUFFIX};
pub use reader::LogReader;
pub use rotation::{NoopSegmentListener, RotationController, SegmentListener};
pub use segment::{SealedSegment, SizeTracker};
pub use writer::{AsyncLogWriter, DEFAULT_QUEUE_CAPACITY};
