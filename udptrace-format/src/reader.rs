//! Sequential trace reading

use crate::record::{decode, RecordError, TraceRecord};
use std::io::{self, BufRead};
use thiserror::Error;

/// Failures while iterating over a trace
///
/// Record-level failures are skippable; I/O failures are fatal to the read.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("I/O error reading trace: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Iterator over the records of a trace.
///
/// Yields the byte offset of the start of each line together with its decode
/// result, so callers can skip corrupt lines and still account for file
/// positions. Reads until EOF; the trace has no header, footer, or record
/// count. A final line without a trailing newline is still decoded.
pub struct TraceRecords<R: BufRead> {
    inner: R,
    offset: u64,
    line: Vec<u8>,
}

impl<R: BufRead> TraceRecords<R> {
    pub fn new(inner: R) -> Self {
        Self::with_offset(inner, 0)
    }

    /// Iterate over a reader already positioned `offset` bytes into the
    /// trace, so yielded offsets stay absolute.
    pub fn with_offset(inner: R, offset: u64) -> Self {
        TraceRecords {
            inner,
            offset,
            line: Vec::new(),
        }
    }

    /// Byte offset of the next line to be read.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<R: BufRead> Iterator for TraceRecords<R> {
    type Item = (u64, Result<TraceRecord, ReadError>);

    fn next(&mut self) -> Option<Self::Item> {
        self.line.clear();
        let start = self.offset;
        match self.inner.read_until(b'\n', &mut self.line) {
            Ok(0) => None,
            Ok(n) => {
                self.offset += n as u64;
                // Lines are read as raw bytes so a corrupt binary line
                // surfaces as a skippable record error, not an I/O error.
                let result = match std::str::from_utf8(&self.line) {
                    Ok(line) => decode(line).map_err(ReadError::from),
                    Err(_) => Err(ReadError::Record(RecordError::MalformedRecord(
                        String::from_utf8_lossy(&self.line).into_owned(),
                    ))),
                };
                Some((start, result))
            }
            Err(e) => Some((start, Err(ReadError::Io(e)))),
        }
    }
}
