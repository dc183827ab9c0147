//! Size-bounded segment retention.
//!
//! The rotation controller observes segment lifecycle events from the
//! segmented log and deletes the oldest sealed segments whenever the
//! total on-disk footprint exceeds the configured budget.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::discovery::SegmentDiscovery;
use crate::segment::{SealedSegment, SizeTracker};

/// Observer of segment lifecycle transitions in a [`crate::log::SegmentedLog`].
pub trait SegmentListener: Send + Sync {
    /// A new segment file has been created and is now the active write target.
    fn on_segment_acquired(&self, path: &Path);

    /// A segment has been sealed at its final length and will never be
    /// written to again.
    fn on_segment_released(&self, path: &Path, len: u64);
}

/// Listener that ignores all segment events. Useful when retention is
/// handled elsewhere or not at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSegmentListener;

impl SegmentListener for NoopSegmentListener {
    fn on_segment_acquired(&self, _path: &Path) {}
    fn on_segment_released(&self, _path: &Path, _len: u64) {}
}

enum RetentionState {
    /// Constructed, no segment acquired yet. Discovered files are parked
    /// here until the first acquisition tells us which file is active.
    Fresh(SegmentDiscovery),
    /// Discovered files have been folded into the tracker; all further
    /// events only touch the tracker.
    Steady,
}

/// Enforces the size budget by deleting oldest-first once sealed segments
/// push the tracked total past `max_log_size`.
pub struct RotationController {
    dir: PathBuf,
    max_log_size: u64,
    state: Mutex<Retention>,
}

struct Retention {
    phase: RetentionState,
    tracker: SizeTracker,
}

impl RotationController {
    /// Creates a controller for `dir`, running best-effort discovery of
    /// segments left behind by earlier runs.
    #[must_use]
    pub fn new(dir: &Path, max_log_size: u64) -> Self {
        let discovered = SegmentDiscovery::discover(dir);
        Self {
            dir: dir.to_path_buf(),
            max_log_size,
            state: Mutex::new(Retention {
                phase: RetentionState::Fresh(discovered),
                tracker: SizeTracker::new(),
            }),
        }
    }

    /// Total bytes of sealed segments currently under retention accounting.
    #[must_use]
    pub fn tracked_bytes(&self) -> u64 {
        self.state.lock().tracker.total_bytes()
    }

    /// Number of sealed segments currently under retention accounting.
    #[must_use]
    pub fn tracked_segments(&self) -> usize {
        self.state.lock().tracker.len()
    }

    fn bootstrap(state: &mut Retention, active: &Path) {
        if let RetentionState::Fresh(discovered) = &mut state.phase {
            discovered.exclude_active(active);
            discovered.drain_into(&mut state.tracker);
            state.phase = RetentionState::Steady;
        }
    }

    /// Falls back to a rediscovery pass after a deletion failure: the
    /// tracker may hold stale entries, so rebuild it from the directory
    /// on the next acquisition.
    fn rebootstrap(&self, state: &mut Retention) {
        state.tracker.clear();
        state.phase = RetentionState::Fresh(SegmentDiscovery::discover(&self.dir));
    }

    fn enforce_budget(&self, state: &mut Retention) {
        while state.tracker.total_bytes() > self.max_log_size {
            let Some(oldest) = state.tracker.pop_oldest() else {
                break;
            };
            match fs::remove_file(&oldest.path) {
                Ok(()) => {
                    info!(
                        path = %oldest.path.display(),
                        reclaimed = oldest.len,
                        remaining = state.tracker.total_bytes(),
                        "deleted oldest segment to honor size budget"
                    );
                }
                Err(err) => {
                    warn!(
                        path = %oldest.path.display(),
                        %err,
                        "failed to delete segment; rediscovering on next acquisition"
                    );
                    self.rebootstrap(state);
                    break;
                }
            }
        }
    }
}

impl SegmentListener for RotationController {
    fn on_segment_acquired(&self, path: &Path) {
        let mut state = self.state.lock();
        // A discovered backlog can exceed the budget here; deletion waits
        // for the next release.
        Self::bootstrap(&mut state, path);
    }

    fn on_segment_released(&self, path: &Path, len: u64) {
        let mut state = self.state.lock();
        state.tracker.push(SealedSegment::new(path.to_path_buf(), len));
        self.enforce_budget(&mut state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![0u8; len]).unwrap();
        path
    }

    #[test]
    fn released_segments_accumulate_until_budget() {
        let dir = tempdir().unwrap();
        let controller = RotationController::new(dir.path(), 100);

        let a = touch(dir.path(), "2023111422.seg", 40);
        let b = touch(dir.path(), "2023111423.seg", 40);

        controller.on_segment_acquired(&a);
        controller.on_segment_released(&a, 40);
        controller.on_segment_released(&b, 40);

        assert_eq!(controller.tracked_bytes(), 80);
        assert!(a.exists());
        assert!(b.exists());
    }

    #[test]
    fn oldest_segment_deleted_when_over_budget() {
        let dir = tempdir().unwrap();
        let controller = RotationController::new(dir.path(), 100);

        let a = touch(dir.path(), "2023111422.seg", 60);
        let b = touch(dir.path(), "2023111423.seg", 60);

        controller.on_segment_acquired(&a);
        controller.on_segment_released(&a, 60);
        controller.on_segment_released(&b, 60);

        assert!(!a.exists(), "oldest segment should have been deleted");
        assert!(b.exists());
        assert_eq!(controller.tracked_bytes(), 60);
    }

    #[test]
    fn deletes_repeatedly_until_under_budget() {
        let dir = tempdir().unwrap();
        let controller = RotationController::new(dir.path(), 49);

        let mut paths = Vec::new();
        for hour in 0..14 {
            let path = touch(dir.path(), &format!("20231114{hour:02}.seg"), 10);
            controller.on_segment_acquired(&path);
            controller.on_segment_released(&path, 10);
            paths.push(path);
        }

        // A 49-byte budget holds at most four 10-byte segments.
        assert_eq!(controller.tracked_segments(), 4);
        assert_eq!(controller.tracked_bytes(), 40);
        for old in &paths[..10] {
            assert!(!old.exists());
        }
        for kept in &paths[10..] {
            assert!(kept.exists());
        }
    }

    #[test]
    fn startup_discovery_folds_in_preexisting_segments() {
        let dir = tempdir().unwrap();
        let old = touch(dir.path(), "2023111420.seg", 30);
        touch(dir.path(), "2023111421.seg", 30);

        let controller = RotationController::new(dir.path(), 1000);
        let active = touch(dir.path(), "2023111422.seg", 0);
        controller.on_segment_acquired(&active);

        assert_eq!(controller.tracked_segments(), 2);
        assert_eq!(controller.tracked_bytes(), 60);
        assert!(old.exists());
    }

    #[test]
    fn acquisition_never_deletes_even_over_budget() {
        let dir = tempdir().unwrap();
        let a = touch(dir.path(), "2023111420.seg", 30);
        let b = touch(dir.path(), "2023111421.seg", 30);

        let controller = RotationController::new(dir.path(), 10);
        let active = touch(dir.path(), "2023111422.seg", 0);
        controller.on_segment_acquired(&active);

        // The backlog exceeds the budget, but deletion waits for a release.
        assert_eq!(controller.tracked_bytes(), 60);
        assert!(a.exists());
        assert!(b.exists());
    }

    #[test]
    fn active_segment_never_eligible_for_deletion() {
        let dir = tempdir().unwrap();
        let a = touch(dir.path(), "2023111420.seg", 30);
        let b = touch(dir.path(), "2023111421.seg", 30);

        let controller = RotationController::new(dir.path(), 10);
        let active = touch(dir.path(), "2023111422.seg", 5);
        controller.on_segment_acquired(&active);
        controller.on_segment_released(&active, 5);

        // Enforcement evicts oldest-first; the just-sealed segment is the
        // youngest and fits the remaining budget.
        assert!(!a.exists());
        assert!(!b.exists());
        assert!(active.exists());
        assert_eq!(controller.tracked_bytes(), 5);
    }

    #[test]
    fn deletion_failure_triggers_rediscovery() {
        let dir = tempdir().unwrap();
        let controller = RotationController::new(dir.path(), 10);

        // Never created on disk, so remove_file fails.
        let ghost = dir.path().join("2023111420.seg");
        let real = touch(dir.path(), "2023111421.seg", 30);

        controller.on_segment_acquired(&ghost);
        controller.on_segment_released(&ghost, 30);

        // Tracker was cleared; the next acquisition rediscovers the real file.
        assert_eq!(controller.tracked_segments(), 0);

        let active = touch(dir.path(), "2023111422.seg", 5);
        controller.on_segment_acquired(&active);
        assert_eq!(controller.tracked_segments(), 1);

        controller.on_segment_released(&active, 5);
        assert!(!real.exists(), "rediscovered segment should be deleted on release");
        assert!(active.exists());
    }
}
