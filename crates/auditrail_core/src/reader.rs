//! Sequential reader over a log directory.
//!
//! Walks segment files in lexical (and therefore chronological) order,
//! decoding one framed record at a time. A torn frame at the tail of a
//! segment, left by a crash mid-write, ends that segment and the reader
//! moves on to the next one.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use auditrail_codec::{decode_record, AuditRecord};
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::log::{MAX_RECORD_LEN, SEGMENT_SUFFIX};

/// Iterator-style reader yielding decoded records oldest first.
pub struct LogReader {
    segments: VecDeque<PathBuf>,
    current: Option<Segment>,
    peeked: Option<AuditRecord>,
}

struct Segment {
    path: PathBuf,
    file: BufReader<File>,
}

impl LogReader {
    /// Opens a reader over every segment file in `dir`.
    ///
    /// Unlike retention discovery this is not best-effort: a caller asking
    /// to read the log should hear about an unreadable directory.
    pub fn open(dir: &Path) -> EngineResult<Self> {
        let mut segments = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let is_segment = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(SEGMENT_SUFFIX));
            if is_segment {
                segments.push(path);
            }
        }
        segments.sort();
        Ok(Self {
            segments: segments.into(),
            current: None,
            peeked: None,
        })
    }

    /// True when another record is available. Decodes and buffers it.
    pub fn has_next(&mut self) -> EngineResult<bool> {
        if self.peeked.is_none() {
            self.peeked = self.advance()?;
        }
        Ok(self.peeked.is_some())
    }

    /// Returns the next record, oldest first, or [`EngineError::EndOfLog`].
    pub fn next_record(&mut self) -> EngineResult<AuditRecord> {
        if !self.has_next()? {
            return Err(EngineError::EndOfLog);
        }
        // has_next just filled the buffer.
        self.peeked.take().ok_or(EngineError::EndOfLog)
    }

    fn advance(&mut self) -> EngineResult<Option<AuditRecord>> {
        loop {
            if self.current.is_none() {
                let Some(path) = self.segments.pop_front() else {
                    return Ok(None);
                };
                let file = BufReader::new(File::open(&path)?);
                self.current = Some(Segment { path, file });
            }

            let Some(segment) = self.current.as_mut() else {
                return Ok(None);
            };
            match read_frame(&mut segment.file)? {
                Frame::Record(payload) => {
                    let record = decode_record(&payload)?;
                    return Ok(Some(record));
                }
                Frame::End => {
                    self.current = None;
                }
                Frame::Torn => {
                    warn!(
                        path = %segment.path.display(),
                        "ignoring torn frame at segment tail"
                    );
                    self.current = None;
                }
            }
        }
    }
}

enum Frame {
    Record(Vec<u8>),
    End,
    Torn,
}

fn read_frame(file: &mut BufReader<File>) -> EngineResult<Frame> {
    let mut len_bytes = [0u8; 4];
    match read_fully(file, &mut len_bytes)? {
        Fill::Empty => return Ok(Frame::End),
        Fill::Partial => return Ok(Frame::Torn),
        Fill::Full => {}
    }

    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_RECORD_LEN {
        // A garbage length prefix means the tail is corrupt, not that a
        // sixteen-megabyte record is pending.
        return Ok(Frame::Torn);
    }

    let mut payload = vec![0u8; len];
    match read_fully(file, &mut payload)? {
        Fill::Full => Ok(Frame::Record(payload)),
        Fill::Empty | Fill::Partial => Ok(Frame::Torn),
    }
}

enum Fill {
    Full,
    Partial,
    Empty,
}

fn read_fully(file: &mut impl Read, buf: &mut [u8]) -> EngineResult<Fill> {
    let mut read = 0;
    while read < buf.len() {
        match file.read(&mut buf[read..]) {
            Ok(0) => {
                return Ok(if read == 0 { Fill::Empty } else { Fill::Partial });
            }
            Ok(n) => read += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(EngineError::Io(err)),
        }
    }
    Ok(Fill::Full)
}
