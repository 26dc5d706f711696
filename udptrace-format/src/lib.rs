//! Trace format for UDP record/replay
//!
//! This crate implements the on-disk trace format (one timestamped,
//! base64-encoded datagram per line), sequential readers and writers for it,
//! and timestamp seeking so playback can start mid-trace.

pub mod reader;
pub mod record;
pub mod seek;
pub mod writer;

pub use reader::{ReadError, TraceRecords};
pub use record::{decode, encode, RecordError, TraceRecord};
pub use seek::{seek_timestamp, seek_timestamp_linear};
pub use writer::TraceWriter;
