//! Top-level engine wiring the writer, log, and retention together.

use std::fmt;
use std::fs;
use std::sync::Arc;

use auditrail_codec::AuditRecord;
use tracing::info;

use crate::config::LogConfig;
use crate::error::EngineResult;
use crate::log::SegmentedLog;
use crate::rotation::{RotationController, SegmentListener};
use crate::writer::AsyncLogWriter;

/// A running audit log: asynchronous ingest in front of a segmented,
/// size-bounded store.
pub struct AuditLogEngine {
    writer: AsyncLogWriter,
    rotation: Arc<RotationController>,
}

impl AuditLogEngine {
    /// Opens the engine over `config.dir`, wiring segment rotation into
    /// the log and starting the writer thread.
    pub fn open(config: LogConfig) -> EngineResult<Self> {
        config.validate()?;
        // Discovery runs at controller construction, so the directory has
        // to exist before then or a fresh start warns spuriously.
        fs::create_dir_all(&config.dir)?;
        let rotation = Arc::new(RotationController::new(&config.dir, config.max_log_size));
        let listener: Arc<dyn SegmentListener> = rotation.clone();
        let log = SegmentedLog::open(config, listener)?;
        let writer = AsyncLogWriter::new(Arc::new(log))?;
        info!("audit log engine started");
        Ok(Self { writer, rotation })
    }

    /// Queues a record for durable appending. Blocks while the writer
    /// queue is full.
    pub fn submit(&self, record: AuditRecord) -> EngineResult<()> {
        self.writer.submit(record)
    }

    /// Flushes queued records and releases the log directory. Idempotent;
    /// any later `submit` fails with [`crate::EngineError::Deactivated`].
    pub fn shutdown(&self) -> EngineResult<()> {
        self.writer.shutdown()
    }

    /// Bytes of sealed segments currently counted against the size budget.
    #[must_use]
    pub fn retained_bytes(&self) -> u64 {
        self.rotation.tracked_bytes()
    }
}

impl fmt::Debug for AuditLogEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLogEngine")
            .field("retained_bytes", &self.rotation.tracked_bytes())
            .field("retained_segments", &self.rotation.tracked_segments())
            .finish_non_exhaustive()
    }
}
