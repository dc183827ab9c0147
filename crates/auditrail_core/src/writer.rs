//! Bounded asynchronous writer.
//!
//! Submitters hand off owned records through a fixed-capacity queue; a
//! single background thread encodes and appends them. When the queue is
//! full, submission blocks until the writer catches up, so producers feel
//! disk backpressure instead of growing an unbounded buffer.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use auditrail_codec::AuditRecord;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::log::AppendLog;

/// Number of records the submission queue holds before `submit` blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// How long shutdown waits for the writer thread to drain the queue.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Single-threaded asynchronous appender over an [`AppendLog`].
pub struct AsyncLogWriter {
    tx: Mutex<Option<SyncSender<AuditRecord>>>,
    drained: Arc<(Mutex<bool>, Condvar)>,
    handle: Mutex<Option<JoinHandle<()>>>,
    log: Arc<dyn AppendLog>,
}

impl AsyncLogWriter {
    /// Starts the writer thread with the default queue capacity.
    pub fn new(log: Arc<dyn AppendLog>) -> EngineResult<Self> {
        Self::with_capacity(log, DEFAULT_QUEUE_CAPACITY)
    }

    /// Starts the writer thread with an explicit queue capacity.
    pub fn with_capacity(log: Arc<dyn AppendLog>, capacity: usize) -> EngineResult<Self> {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let drained = Arc::new((Mutex::new(false), Condvar::new()));

        let thread_log = Arc::clone(&log);
        let thread_drained = Arc::clone(&drained);
        let handle = thread::Builder::new()
            .name("auditrail-writer".into())
            .spawn(move || {
                drain_loop(&rx, thread_log.as_ref());
                let (flag, condvar) = &*thread_drained;
                *flag.lock() = true;
                condvar.notify_all();
            })
            .map_err(EngineError::Io)?;

        debug!(capacity, "started audit writer thread");
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            drained,
            handle: Mutex::new(Some(handle)),
            log,
        })
    }

    /// Queues a record for appending. Blocks while the queue is full and
    /// returns [`EngineError::Deactivated`] once the writer has shut down.
    pub fn submit(&self, record: AuditRecord) -> EngineResult<()> {
        // Clone the sender so the send itself happens outside the lock;
        // a full queue must not block concurrent shutdown.
        let sender = self.tx.lock().clone();
        let Some(sender) = sender else {
            return Err(EngineError::Deactivated);
        };
        sender.send(record).map_err(|_| EngineError::Deactivated)
    }

    /// Stops accepting records, waits up to the grace period for the
    /// queue to drain, then closes the underlying log. Idempotent.
    pub fn shutdown(&self) -> EngineResult<()> {
        let sender = self.tx.lock().take();
        if sender.is_none() {
            return Ok(());
        }
        // Dropping the last sender closes the channel; the writer thread
        // exits once it has drained what was already queued.
        drop(sender);

        let (flag, condvar) = &*self.drained;
        let mut done = flag.lock();
        if !*done {
            condvar.wait_for(&mut done, SHUTDOWN_GRACE);
        }
        let finished = *done;
        drop(done);

        if finished {
            if let Some(handle) = self.handle.lock().take() {
                if handle.join().is_err() {
                    warn!("audit writer thread panicked");
                }
            }
        } else {
            warn!("audit writer did not drain within the shutdown grace period");
        }

        info!("audit writer shut down");
        self.log.close()
    }
}

impl Drop for AsyncLogWriter {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!(%err, "audit writer shutdown failed during drop");
        }
    }
}

fn drain_loop(rx: &Receiver<AuditRecord>, log: &dyn AppendLog) {
    while let Ok(record) = rx.recv() {
        let timestamp = record.timestamp_millis;
        let payload = record.encode();
        if let Err(err) = log.append(timestamp, &payload) {
            error!(%err, "failed to append audit record; writer thread exiting");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditrail_codec::OperationStatus;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn record(operation: &str) -> AuditRecord {
        AuditRecord::single(
            1_700_000_000_000,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            "alice",
            OperationStatus::Attempt,
            operation,
        )
    }

    /// In-memory sink with an optional gate so tests can hold the writer
    /// thread still and observe queue backpressure.
    #[derive(Default)]
    struct StubLog {
        appended: Mutex<Vec<Vec<u8>>>,
        close_calls: AtomicUsize,
        gate: Arc<(Mutex<bool>, Condvar)>,
    }

    impl StubLog {
        fn gated() -> Self {
            let stub = Self::default();
            *stub.gate.0.lock() = true;
            stub
        }

        fn open_gate(&self) {
            *self.gate.0.lock() = false;
            self.gate.1.notify_all();
        }
    }

    impl AppendLog for StubLog {
        fn append(&self, _timestamp_millis: i64, payload: &[u8]) -> EngineResult<()> {
            let (closed, condvar) = &*self.gate;
            let mut held = closed.lock();
            while *held {
                condvar.wait(&mut held);
            }
            drop(held);
            self.appended.lock().push(payload.to_vec());
            Ok(())
        }

        fn close(&self) -> EngineResult<()> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn submitted_records_reach_the_log() {
        let stub = Arc::new(StubLog::default());
        let writer = AsyncLogWriter::new(Arc::clone(&stub) as Arc<dyn AppendLog>).unwrap();

        writer.submit(record("SELECT 1")).unwrap();
        writer.submit(record("SELECT 2")).unwrap();
        writer.shutdown().unwrap();

        assert_eq!(stub.appended.lock().len(), 2);
    }

    #[test]
    fn submit_blocks_when_queue_is_full() {
        let stub = Arc::new(StubLog::gated());
        let writer = Arc::new(
            AsyncLogWriter::with_capacity(Arc::clone(&stub) as Arc<dyn AppendLog>, 2).unwrap(),
        );

        // Writer thread is parked on the gate holding one record, so two
        // more fill the queue.
        writer.submit(record("a")).unwrap();
        writer.submit(record("b")).unwrap();
        writer.submit(record("c")).unwrap();

        let blocked = Arc::clone(&writer);
        let start = Instant::now();
        let submitter = thread::spawn(move || {
            blocked.submit(record("d")).unwrap();
            start.elapsed()
        });

        thread::sleep(Duration::from_millis(100));
        stub.open_gate();

        let waited = submitter.join().unwrap();
        assert!(
            waited >= Duration::from_millis(50),
            "fourth submit should have blocked, waited {waited:?}"
        );

        writer.shutdown().unwrap();
        assert_eq!(stub.appended.lock().len(), 4);
    }

    #[test]
    fn submit_after_shutdown_is_deactivated() {
        let stub = Arc::new(StubLog::default());
        let writer = AsyncLogWriter::new(Arc::clone(&stub) as Arc<dyn AppendLog>).unwrap();

        writer.shutdown().unwrap();
        let err = writer.submit(record("too late")).unwrap_err();
        assert!(matches!(err, EngineError::Deactivated));
    }

    #[test]
    fn shutdown_drains_queued_records_first() {
        let stub = Arc::new(StubLog::default());
        let writer =
            AsyncLogWriter::with_capacity(Arc::clone(&stub) as Arc<dyn AppendLog>, 64).unwrap();

        for i in 0..50 {
            writer.submit(record(&format!("op {i}"))).unwrap();
        }
        writer.shutdown().unwrap();

        assert_eq!(stub.appended.lock().len(), 50);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let stub = Arc::new(StubLog::default());
        let writer = AsyncLogWriter::new(Arc::clone(&stub) as Arc<dyn AppendLog>).unwrap();

        writer.shutdown().unwrap();
        writer.shutdown().unwrap();
        drop(writer);

        assert_eq!(stub.close_calls.load(Ordering::SeqCst), 1);
    }
}
