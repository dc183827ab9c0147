//! Sealed segment bookkeeping.

use std::collections::VecDeque;
use std::path::PathBuf;

/// A closed, on-disk segment file with its byte length captured at closure
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSegment {
    /// Path of the segment file.
    pub path: PathBuf,
    /// Byte length when the segment was sealed.
    pub len: u64,
}

impl SealedSegment {
    /// Creates a sealed segment entry.
    pub fn new(path: impl Into<PathBuf>, len: u64) -> Self {
        Self {
            path: path.into(),
            len,
        }
    }
}

/// FIFO of sealed segments with a running total size, oldest first.
#[derive(Debug, Default)]
pub struct SizeTracker {
    segments: VecDeque<SealedSegment>,
    total: u64,
}

impl SizeTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a newly sealed segment.
    pub fn push(&mut self, segment: SealedSegment) {
        self.total += segment.len;
        self.segments.push_back(segment);
    }

    /// Removes and returns the oldest tracked segment.
    pub fn pop_oldest(&mut self) -> Option<SealedSegment> {
        let segment = self.segments.pop_front()?;
        self.total -= segment.len;
        Some(segment)
    }

    /// Forgets all tracked segments.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.total = 0;
    }

    /// Total bytes across all tracked segments.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    /// Number of tracked segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True when no segments are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
