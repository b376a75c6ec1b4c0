//! The verification reference: a read-only byte buffer loaded once per run and
//! shared by every worker through private cursors.

use crate::error::ReferenceError;
use log::debug;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::Path;

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

pub struct ReferenceBuffer {
    backing: Backing,
}

impl ReferenceBuffer {
    /// Map `path` read-only. Missing, unreadable and zero-length files are all
    /// rejected; an empty reference is a misconfiguration, not "no verification".
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let file = File::open(path).map_err(ReferenceError::Open)?;
        let len = file.metadata().map_err(ReferenceError::Metadata)?.len();
        if len == 0 {
            return Err(ReferenceError::Empty);
        }

        // The file is opened read-only and never written by this process.
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(ReferenceError::Map)?;
        debug!("Mapped reference {} ({} bytes)", path.display(), mmap.len());

        Ok(Self {
            backing: Backing::Mapped(mmap),
        })
    }

    /// Wrap bytes already in memory. Same emptiness rule as [`load`](Self::load).
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, ReferenceError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ReferenceError::Empty);
        }
        Ok(Self {
            backing: Backing::Owned(bytes),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(mmap) => mmap.as_ref(),
            Backing::Owned(bytes) => bytes.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A fresh cursor positioned at the start of the buffer.
    pub fn cursor(&self) -> ReferenceCursor<'_> {
        ReferenceCursor {
            remaining: self.as_bytes(),
            consumed: 0,
            exhausted: false,
        }
    }

    /// Unmap or free the buffer. Takes `self`, so the borrow checker rejects any
    /// call while a cursor is still alive.
    pub fn release(self) {
        debug!("Releasing reference buffer ({} bytes)", self.len());
    }
}

/// Outcome of offering one body chunk to a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkCheck {
    Match,
    Mismatch,
    /// Not compared: the chunk did not fit in what was left of the reference,
    /// or an earlier chunk already didn't.
    Skipped,
}

/// A private view into a [`ReferenceBuffer`]. Each unit owns one.
#[derive(Debug, Clone)]
pub struct ReferenceCursor<'r> {
    remaining: &'r [u8],
    consumed: usize,
    exhausted: bool,
}

impl<'r> ReferenceCursor<'r> {
    /// Compare `chunk` against the next `chunk.len()` reference bytes.
    ///
    /// The cursor advances on both match and mismatch. Once a chunk is larger
    /// than what remains, comparison stops for good: extra trailing bytes are
    /// tolerated rather than counted as a mismatch.
    pub fn check(&mut self, chunk: &[u8]) -> ChunkCheck {
        if self.exhausted || chunk.len() > self.remaining.len() {
            self.exhausted = true;
            return ChunkCheck::Skipped;
        }

        let (expected, rest) = self.remaining.split_at(chunk.len());
        self.remaining = rest;
        self.consumed += chunk.len();

        if expected == chunk {
            ChunkCheck::Match
        } else {
            ChunkCheck::Mismatch
        }
    }

    pub(crate) fn consumed(&self) -> usize {
        self.consumed
    }

    pub(crate) fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_maps_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"reference payload").unwrap();
        file.flush().unwrap();

        let buf = ReferenceBuffer::load(file.path()).unwrap();
        assert_eq!(buf.len(), 17);
        assert_eq!(buf.as_bytes(), b"reference payload");
        buf.release();
    }

    #[test]
    fn zero_length_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            ReferenceBuffer::load(file.path()),
            Err(ReferenceError::Empty)
        ));
        assert!(matches!(
            ReferenceBuffer::from_bytes(Vec::new()),
            Err(ReferenceError::Empty)
        ));
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.bin");
        assert!(matches!(
            ReferenceBuffer::load(&missing),
            Err(ReferenceError::Open(_))
        ));
    }

    #[test]
    fn cursor_advances_on_match_and_mismatch() {
        let buf = ReferenceBuffer::from_bytes(b"abcdef".to_vec()).unwrap();
        let mut cursor = buf.cursor();

        assert_eq!(cursor.check(b"ab"), ChunkCheck::Match);
        assert_eq!(cursor.check(b"XX"), ChunkCheck::Mismatch);
        assert_eq!(cursor.consumed(), 4);
        assert_eq!(cursor.check(b"ef"), ChunkCheck::Match);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn chunk_exactly_filling_remainder_is_compared() {
        let buf = ReferenceBuffer::from_bytes(b"abcd".to_vec()).unwrap();
        let mut cursor = buf.cursor();
        assert_eq!(cursor.check(b"abcd"), ChunkCheck::Match);
    }

    #[test]
    fn oversized_chunk_stops_comparison() {
        let buf = ReferenceBuffer::from_bytes(b"abcd".to_vec()).unwrap();
        let mut cursor = buf.cursor();

        assert_eq!(cursor.check(b"ab"), ChunkCheck::Match);
        // Three bytes offered, two left.
        assert_eq!(cursor.check(b"cdX"), ChunkCheck::Skipped);
        assert_eq!(cursor.consumed(), 2);
        // Would fit, but comparison has already stopped.
        assert_eq!(cursor.check(b"c"), ChunkCheck::Skipped);
    }
}
