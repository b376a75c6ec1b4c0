//! Per-unit state: what one worker accumulates while its transfer streams in.

use crate::error::UnitError;
use crate::reference::{ChunkCheck, ReferenceCursor};
use serde::{Serialize, Serializer};
use std::fs::File;
use std::path::PathBuf;
use std::thread::ThreadId;
use std::time::Duration;

/// HTTP status code settable exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusLatch(Option<u16>);

impl StatusLatch {
    /// Store `code` unless a code is already latched. Returns whether it stuck.
    pub fn set_if_unset(&mut self, code: u16) -> bool {
        if self.0.is_some() {
            return false;
        }
        self.0 = Some(code);
        true
    }

    pub fn get(&self) -> Option<u16> {
        self.0
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

/// Parse the three-digit code following the first space of a status line,
/// e.g. `HTTP/1.1 200 OK`. Returns `None` for anything unparseable.
pub fn parse_status_line(line: &[u8]) -> Option<u16> {
    let space = line.iter().position(|&b| b == b' ')?;
    let digits: Vec<u8> = line[space + 1..]
        .iter()
        .take(3)
        .take_while(|b| b.is_ascii_digit())
        .copied()
        .collect();
    if digits.is_empty() {
        return None;
    }
    std::str::from_utf8(&digits).ok()?.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    NotRequested,
    /// Every compared byte so far has matched.
    Matching,
    /// Terminal: some compared chunk differed.
    Mismatch,
}

impl Verification {
    /// Fold one chunk verdict in. `Mismatch` is absorbing and `NotRequested`
    /// never changes.
    pub fn record(&mut self, check: ChunkCheck) {
        if *self == Verification::Matching && check == ChunkCheck::Mismatch {
            *self = Verification::Mismatch;
        }
    }

    pub fn marker(self) -> char {
        match self {
            Verification::NotRequested => '-',
            Verification::Matching => 'S',
            Verification::Mismatch => 'F',
        }
    }
}

/// One unit of work. Created by the dispatcher, then mutated by exactly one
/// worker thread until the join barrier.
pub struct RequestUnit<'r> {
    pub index: usize,
    pub url: &'r str,
    pub save_path: Option<PathBuf>,
    pub handle: Option<ThreadId>,
    pub bytes: u64,
    pub status: StatusLatch,
    pub elapsed: Option<Duration>,
    pub verification: Verification,
    pub cursor: Option<ReferenceCursor<'r>>,
    pub error: Option<UnitError>,
    pub destination: Option<File>,
    pub(crate) header_lines: usize,
}

impl<'r> RequestUnit<'r> {
    pub fn new(index: usize, url: &'r str) -> Self {
        Self {
            index,
            url,
            save_path: None,
            handle: None,
            bytes: 0,
            status: StatusLatch::default(),
            elapsed: None,
            verification: Verification::NotRequested,
            cursor: None,
            error: None,
            destination: None,
            header_lines: 0,
        }
    }

    pub fn with_save_path(mut self, path: Option<PathBuf>) -> Self {
        self.save_path = path;
        self
    }

    /// Give this unit its own cursor into the shared reference.
    pub fn bind_reference(mut self, cursor: Option<ReferenceCursor<'r>>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Freeze the unit once its worker has joined, dropping the reference
    /// cursor and any file handle.
    pub fn into_outcome(self) -> UnitOutcome {
        UnitOutcome {
            index: self.index,
            handle: self.handle.map(|id| format!("{:?}", id)),
            url: self.url.to_string(),
            bytes: self.bytes,
            status: self.status.get(),
            elapsed: self.elapsed,
            verification: self.verification,
            error: self.error,
        }
    }
}

/// Read-only result of one unit, consumed by the aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub index: usize,
    pub handle: Option<String>,
    pub url: String,
    pub bytes: u64,
    pub status: Option<u16>,
    #[serde(rename = "elapsed_secs", serialize_with = "opt_secs")]
    pub elapsed: Option<Duration>,
    pub verification: Verification,
    pub error: Option<UnitError>,
}

impl UnitOutcome {
    pub fn completed(&self) -> bool {
        self.error.is_none()
    }
}

pub(crate) fn opt_secs<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.as_secs_f64()),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_latches_once() {
        let mut status = StatusLatch::default();
        assert!(!status.is_set());
        assert!(status.set_if_unset(301));
        assert!(!status.set_if_unset(200));
        assert_eq!(status.get(), Some(301));
    }

    #[test]
    fn parses_status_lines() {
        assert_eq!(parse_status_line(b"HTTP/1.1 200 OK\r\n"), Some(200));
        assert_eq!(parse_status_line(b"HTTP/2 404\r\n"), Some(404));
        assert_eq!(parse_status_line(b"HTTP/1.0 5xx\r\n"), Some(5));
        assert_eq!(parse_status_line(b"garbage\r\n"), None);
        assert_eq!(parse_status_line(b"HTTP/1.1 OK\r\n"), None);
    }

    #[test]
    fn mismatch_never_reverts() {
        let mut v = Verification::Matching;
        v.record(ChunkCheck::Match);
        assert_eq!(v, Verification::Matching);
        v.record(ChunkCheck::Mismatch);
        assert_eq!(v, Verification::Mismatch);
        v.record(ChunkCheck::Match);
        v.record(ChunkCheck::Skipped);
        assert_eq!(v, Verification::Mismatch);
    }

    #[test]
    fn not_requested_ignores_checks() {
        let mut v = Verification::NotRequested;
        v.record(ChunkCheck::Mismatch);
        assert_eq!(v, Verification::NotRequested);
        assert_eq!(v.marker(), '-');
        assert_eq!(Verification::Matching.marker(), 'S');
        assert_eq!(Verification::Mismatch.marker(), 'F');
    }
}
