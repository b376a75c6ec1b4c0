//! The body of one worker thread: a single GET folded into its own unit.

use crate::error::UnitError;
use crate::transfer::{Transfer, TransferSink};
use crate::unit::{parse_status_line, RequestUnit, Verification};
use log::{debug, warn};
use std::fs::OpenOptions;
use std::io::{self, Write};

/// Run one unit to completion or failure. Touches nothing but `unit`, its
/// destination file, and its reference cursor.
pub fn run_unit(unit: &mut RequestUnit<'_>, transfer: &dyn Transfer) {
    unit.handle = Some(std::thread::current().id());

    if let Some(path) = unit.save_path.clone() {
        match OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
        {
            Ok(file) => unit.destination = Some(file),
            Err(e) => {
                warn!("REQ {:04}: cannot open {}: {}", unit.index, path.display(), e);
                unit.error = Some(UnitError::save_failed(e.to_string()));
                return;
            }
        }
    }

    if unit.cursor.is_some() {
        unit.verification = Verification::Matching;
    }

    let url = unit.url;
    let result = transfer.get(url, &mut UnitSink { unit: &mut *unit });

    // Closes the file either way; partial contents stay on disk.
    unit.destination = None;

    if let Some(cursor) = &unit.cursor {
        debug!(
            "REQ {:04}: verification {} after {} reference bytes ({} unchecked)",
            unit.index,
            unit.verification.marker(),
            cursor.consumed(),
            cursor.remaining()
        );
    }

    match result {
        Ok(elapsed) => {
            unit.elapsed = Some(elapsed);
            debug!(
                "REQ {:04}: done in {:.2}s, {} bytes",
                unit.index,
                elapsed.as_secs_f64(),
                unit.bytes
            );
        }
        Err(e) => {
            warn!("REQ {:04}: URL transfer failed: {}", unit.index, e);
            unit.error = Some(UnitError::transfer_failed(e.detail));
        }
    }
}

/// The two streaming callbacks, closed over one unit.
struct UnitSink<'u, 'r> {
    unit: &'u mut RequestUnit<'r>,
}

impl TransferSink for UnitSink<'_, '_> {
    fn header(&mut self, line: &[u8]) {
        let first = self.unit.header_lines == 0;
        self.unit.header_lines += 1;

        // Only the status line of the first header block counts.
        if first && !self.unit.status.is_set() {
            if let Some(code) = parse_status_line(line) {
                self.unit.status.set_if_unset(code);
            }
        }
    }

    fn body(&mut self, chunk: &[u8]) -> io::Result<()> {
        let unit = &mut *self.unit;
        unit.bytes += chunk.len() as u64;

        if let Some(file) = unit.destination.as_mut() {
            file.write_all(chunk)?;
        }

        if let Some(cursor) = unit.cursor.as_mut() {
            unit.verification.record(cursor.check(chunk));
        }
        Ok(())
    }
}
