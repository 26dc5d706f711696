//! Append-only trace writing

use crate::record::encode;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Appends encoded records to an underlying writer.
///
/// Every record is flushed as soon as it is written: the socket, not the
/// disk, is the bottleneck during capture, and a flushed line is durable
/// before the next datagram arrives. The writer never rewinds or rewrites
/// prior records.
pub struct TraceWriter<W: Write> {
    inner: W,
    records_written: u64,
}

impl TraceWriter<File> {
    /// Create a fresh trace file, truncating any existing one.
    ///
    /// Recording always starts from an empty trace; there is no
    /// append-resume.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(TraceWriter::new(File::create(path)?))
    }
}

impl<W: Write> TraceWriter<W> {
    pub fn new(inner: W) -> Self {
        TraceWriter {
            inner,
            records_written: 0,
        }
    }

    /// Append one record and flush it.
    pub fn append(&mut self, timestamp: f64, payload: &[u8]) -> io::Result<()> {
        self.inner.write_all(encode(timestamp, payload).as_bytes())?;
        self.inner.flush()?;
        self.records_written += 1;
        Ok(())
    }

    /// Number of records appended through this writer.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
