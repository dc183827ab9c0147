//! Startup discovery of pre-existing segment files.
//!
//! After a restart, segments already exist on disk that the rotation
//! controller has never seen. Discovery folds them back into retention
//! accounting so the size budget keeps holding across process lifetimes.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::log::SEGMENT_SUFFIX;
use crate::segment::{SealedSegment, SizeTracker};

/// Pre-existing segment files found at startup, oldest first.
#[derive(Debug, Default)]
pub struct SegmentDiscovery {
    files: Vec<SealedSegment>,
}

impl SegmentDiscovery {
    /// Scans `dir` for segment files, sorted so lexical order equals
    /// chronological order (segment names are zero-padded UTC windows).
    ///
    /// Discovery is best-effort: any I/O failure during listing logs a
    /// warning and yields an empty set. Worst case, retention undercounts
    /// disk usage until the next natural rotation.
    #[must_use]
    pub fn discover(dir: &Path) -> Self {
        match Self::list(dir) {
            Ok(files) => {
                debug!(dir = %dir.display(), count = files.len(), "discovered segments");
                Self { files }
            }
            Err(err) => {
                warn!(
                    dir = %dir.display(),
                    %err,
                    "segment discovery failed; retention will undercount until the next roll"
                );
                Self::default()
            }
        }
    }

    fn list(dir: &Path) -> io::Result<Vec<SealedSegment>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.ends_with(SEGMENT_SUFFIX) {
                continue;
            }
            let len = entry.metadata()?.len();
            files.push(SealedSegment::new(entry.path(), len));
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Removes the segment currently being written to from the discovered
    /// set; it must never become eligible for deletion.
    pub fn exclude_active(&mut self, path: &Path) {
        self.files.retain(|segment| segment.path != path);
    }

    /// Hands all remaining discovered files to `tracker` in order and
    /// clears the set. Idempotent once drained.
    pub fn drain_into(&mut self, tracker: &mut SizeTracker) {
        for segment in self.files.drain(..) {
            tracker.push(segment);
        }
    }

    /// True once all discovered files have been drained (or none existed).
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of discovered, not yet drained files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when no discovered files are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![0u8; len]).unwrap();
        path
    }

    #[test]
    fn discovers_only_segment_files_in_order() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "2023111423.seg", 20);
        touch(dir.path(), "2023111422.seg", 10);
        touch(dir.path(), "LOCK", 0);
        touch(dir.path(), "notes.txt", 5);

        let discovery = SegmentDiscovery::discover(dir.path());
        assert_eq!(discovery.len(), 2);

        let mut tracker = SizeTracker::new();
        let mut discovery = discovery;
        discovery.drain_into(&mut tracker);

        let first = tracker.pop_oldest().unwrap();
        assert!(first.path.ends_with("2023111422.seg"));
        assert_eq!(first.len, 10);
    }

    #[test]
    fn missing_directory_is_empty_not_error() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("nope");
        let discovery = SegmentDiscovery::discover(&gone);
        assert!(discovery.is_empty());
    }

    #[test]
    fn exclude_active_removes_one_file() {
        let dir = tempdir().unwrap();
        let active = touch(dir.path(), "2023111423.seg", 20);
        touch(dir.path(), "2023111422.seg", 10);

        let mut discovery = SegmentDiscovery::discover(dir.path());
        discovery.exclude_active(&active);
        assert_eq!(discovery.len(), 1);
    }

    #[test]
    fn drain_is_idempotent() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "2023111422.seg", 10);

        let mut discovery = SegmentDiscovery::discover(dir.path());
        let mut tracker = SizeTracker::new();

        discovery.drain_into(&mut tracker);
        assert!(discovery.is_drained());
        assert_eq!(tracker.total_bytes(), 10);

        discovery.drain_into(&mut tracker);
        assert_eq!(tracker.total_bytes(), 10);
    }
}
