//! Append-only segmented log files.
//!
//! Records are framed with a u32 little-endian length prefix and appended
//! to the segment for their timestamp's roll window. Segment file names
//! are zero-padded UTC window labels, so lexical order equals
//! chronological order.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::LogConfig;
use crate::error::{EngineError, EngineResult};
use crate::rotation::SegmentListener;

/// File name suffix for segment files.
pub const SEGMENT_SUFFIX: &str = ".seg";

/// Advisory lock file guarding single-writer access to a log directory.
pub const LOCK_FILE: &str = "LOCK";

/// Largest payload a single frame may carry.
pub const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// Destination for encoded audit records.
///
/// The writer thread appends through this trait, which keeps the queueing
/// layer testable against an in-memory sink.
pub trait AppendLog: Send + Sync {
    /// Appends one encoded record under the roll window of `timestamp_millis`.
    fn append(&self, timestamp_millis: i64, payload: &[u8]) -> EngineResult<()>;

    /// Seals the active segment and refuses further appends. Idempotent.
    /// The directory lock stays held until the log is dropped.
    fn close(&self) -> EngineResult<()>;
}

struct ActiveSegment {
    label: String,
    path: PathBuf,
    file: File,
    len: u64,
}

/// Append-only log that rolls to a new segment file whenever a record's
/// timestamp lands in a later roll window.
pub struct SegmentedLog {
    config: LogConfig,
    listener: Arc<dyn SegmentListener>,
    active: Mutex<Option<ActiveSegment>>,
    closed: AtomicBool,
    // Held for the lifetime of the log; dropping releases the lock.
    _lock: File,
}

impl SegmentedLog {
    /// Opens the log directory, creating it if needed, and takes the
    /// exclusive advisory lock. No segment is created until the first
    /// append arrives.
    pub fn open(config: LogConfig, listener: Arc<dyn SegmentListener>) -> EngineResult<Self> {
        config.validate()?;
        fs::create_dir_all(&config.dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(config.dir.join(LOCK_FILE))?;
        lock.try_lock_exclusive()
            .map_err(|_| EngineError::LogLocked)?;

        info!(dir = %config.dir.display(), cycle = ?config.roll_cycle, "opened segmented log");
        Ok(Self {
            config,
            listener,
            active: Mutex::new(None),
            closed: AtomicBool::new(false),
            _lock: lock,
        })
    }

    /// Directory this log writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    fn acquire(&self, label: String) -> EngineResult<ActiveSegment> {
        let path = self
            .config
            .dir
            .join(format!("{label}{SEGMENT_SUFFIX}"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let len = file.metadata()?.len();
        debug!(path = %path.display(), "acquired segment");
        self.listener.on_segment_acquired(&path);
        Ok(ActiveSegment {
            label,
            path,
            file,
            len,
        })
    }

    fn release(&self, segment: ActiveSegment) -> EngineResult<()> {
        segment.file.sync_all()?;
        debug!(path = %segment.path.display(), len = segment.len, "released segment");
        self.listener.on_segment_released(&segment.path, segment.len);
        Ok(())
    }
}

impl AppendLog for SegmentedLog {
    fn append(&self, timestamp_millis: i64, payload: &[u8]) -> EngineResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::LogClosed);
        }
        if payload.len() > MAX_RECORD_LEN {
            return Err(EngineError::RecordTooLarge { len: payload.len() });
        }

        let label = self.config.roll_cycle.window_label(timestamp_millis);
        let mut active = self.active.lock();

        // Roll forward only: a clock stepping backwards must not create a
        // segment that sorts before one already sealed.
        let needs_roll = match active.as_ref() {
            Some(segment) => label.as_str() > segment.label.as_str(),
            None => true,
        };
        if needs_roll {
            if let Some(previous) = active.take() {
                self.release(previous)?;
            }
            *active = Some(self.acquire(label)?);
        }

        let Some(segment) = active.as_mut() else {
            return Err(EngineError::LogClosed);
        };
        let frame_len = payload.len() as u32;
        segment.file.write_all(&frame_len.to_le_bytes())?;
        segment.file.write_all(payload)?;
        segment.len += 4 + payload.len() as u64;
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let taken = self.active.lock().take();
        if let Some(segment) = taken {
            self.release(segment)?;
        }
        info!(dir = %self.config.dir.display(), "closed segmented log");
        Ok(())
    }
}

impl Drop for SegmentedLog {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl fmt::Debug for SegmentedLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedLog")
            .field("dir", &self.config.dir)
            .field("cycle", &self.config.roll_cycle)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RollCycle;
    use crate::rotation::NoopSegmentListener;
    use parking_lot::Mutex as PlMutex;
    use tempfile::tempdir;

    const HOUR_MS: i64 = 3_600_000;

    #[derive(Default)]
    struct RecordingListener {
        events: PlMutex<Vec<String>>,
    }

    impl SegmentListener for RecordingListener {
        fn on_segment_acquired(&self, path: &Path) {
            self.events
                .lock()
                .push(format!("acquired {}", path.file_name().unwrap().to_str().unwrap()));
        }

        fn on_segment_released(&self, path: &Path, len: u64) {
            self.events.lock().push(format!(
                "released {} {len}",
                path.file_name().unwrap().to_str().unwrap()
            ));
        }
    }

    fn open(dir: &Path, listener: Arc<dyn SegmentListener>) -> SegmentedLog {
        let config = LogConfig::new(dir).roll_cycle(RollCycle::Hourly);
        SegmentedLog::open(config, listener).unwrap()
    }

    #[test]
    fn appends_frame_into_window_segment() {
        let dir = tempdir().unwrap();
        let log = open(dir.path(), Arc::new(NoopSegmentListener));

        log.append(0, b"hello").unwrap();
        log.close().unwrap();

        let data = fs::read(dir.path().join("1970010100.seg")).unwrap();
        assert_eq!(&data[..4], &5u32.to_le_bytes());
        assert_eq!(&data[4..], b"hello");
    }

    #[test]
    fn rolls_on_window_boundary_and_fires_listener() {
        let dir = tempdir().unwrap();
        let listener = Arc::new(RecordingListener::default());
        let log = open(dir.path(), listener.clone());

        log.append(0, b"a").unwrap();
        log.append(HOUR_MS, b"b").unwrap();
        log.close().unwrap();

        let events = listener.events.lock().clone();
        assert_eq!(
            events,
            vec![
                "acquired 1970010100.seg".to_string(),
                "released 1970010100.seg 5".to_string(),
                "acquired 1970010101.seg".to_string(),
                "released 1970010101.seg 5".to_string(),
            ]
        );
    }

    #[test]
    fn late_record_stays_in_current_segment() {
        let dir = tempdir().unwrap();
        let log = open(dir.path(), Arc::new(NoopSegmentListener));

        log.append(HOUR_MS, b"now").unwrap();
        // An hour-old timestamp must not roll back to an earlier segment.
        log.append(0, b"late").unwrap();
        log.close().unwrap();

        assert!(dir.path().join("1970010101.seg").exists());
        assert!(!dir.path().join("1970010100.seg").exists());
    }

    #[test]
    fn second_open_of_same_dir_is_refused() {
        let dir = tempdir().unwrap();
        let log = open(dir.path(), Arc::new(NoopSegmentListener));
        assert!(format!("{log:?}").contains("SegmentedLog"));

        let config = LogConfig::new(dir.path());
        let err = SegmentedLog::open(config, Arc::new(NoopSegmentListener)).unwrap_err();
        assert!(matches!(err, EngineError::LogLocked));
    }

    #[test]
    fn lock_is_held_through_close_until_drop() {
        let dir = tempdir().unwrap();
        let log = open(dir.path(), Arc::new(NoopSegmentListener));
        log.close().unwrap();

        // Closed but not dropped: the directory lock is still ours.
        let refused = SegmentedLog::open(
            LogConfig::new(dir.path()),
            Arc::new(NoopSegmentListener),
        );
        assert!(matches!(refused, Err(EngineError::LogLocked)));
        drop(log);

        let reopened = SegmentedLog::open(
            LogConfig::new(dir.path()),
            Arc::new(NoopSegmentListener),
        );
        assert!(reopened.is_ok());
    }

    #[test]
    fn close_is_idempotent_and_stops_appends() {
        let dir = tempdir().unwrap();
        let listener = Arc::new(RecordingListener::default());
        let log = open(dir.path(), listener.clone());

        log.append(0, b"x").unwrap();
        log.close().unwrap();
        log.close().unwrap();

        let err = log.append(0, b"y").unwrap_err();
        assert!(matches!(err, EngineError::LogClosed));

        let released = listener
            .events
            .lock()
            .iter()
            .filter(|event| event.starts_with("released"))
            .count();
        assert_eq!(released, 1);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let dir = tempdir().unwrap();
        let log = open(dir.path(), Arc::new(NoopSegmentListener));

        let payload = vec![0u8; MAX_RECORD_LEN + 1];
        let err = log.append(0, &payload).unwrap_err();
        assert!(matches!(err, EngineError::RecordTooLarge { .. }));
    }
}
