//! Trace record encoding and decoding
//!
//! A trace is a sequence of newline-terminated lines, one datagram per line:
//! a timestamp in seconds with ten fractional digits, a tab, and the
//! base64-encoded payload. Timestamps are relative to the first record in the
//! trace, which is always exactly `0.0`. The tab works as a separator because
//! it cannot appear in the base64 alphabet.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use thiserror::Error;

/// Fractional digits used when formatting timestamps.
pub const TIMESTAMP_PRECISION: usize = 10;

/// Separator between the timestamp and payload fields.
pub const FIELD_SEPARATOR: char = '\t';

/// Per-record decode failures
///
/// The three kinds are distinguishable so callers can choose between
/// skip-and-continue (playback) and abort (direct API use).
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("record does not split into exactly two fields: {0:?}")]
    MalformedRecord(String),

    #[error("invalid timestamp {0:?}: must be a finite non-negative number")]
    InvalidTimestamp(String),

    #[error("invalid base64 payload: {0}")]
    InvalidPayload(#[from] base64::DecodeError),
}

/// One recorded datagram: a relative timestamp and its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    /// Seconds since the first record in the trace.
    pub timestamp: f64,
    /// Raw datagram contents, opaque to the codec beyond length.
    pub payload: Bytes,
}

impl TraceRecord {
    pub fn new(timestamp: f64, payload: Bytes) -> Self {
        TraceRecord { timestamp, payload }
    }

    /// Encode this record as a trace line.
    pub fn encode(&self) -> String {
        encode(self.timestamp, &self.payload)
    }
}

/// Encode one record as a trace line, including the trailing newline.
///
/// Never fails: any finite non-negative timestamp and any payload bytes are
/// representable.
pub fn encode(timestamp: f64, payload: &[u8]) -> String {
    format!(
        "{:.prec$}{}{}\n",
        timestamp,
        FIELD_SEPARATOR,
        BASE64.encode(payload),
        prec = TIMESTAMP_PRECISION,
    )
}

/// Decode one trace line.
///
/// The trailing newline, if present, is trimmed before the payload field is
/// base64-decoded.
pub fn decode(line: &str) -> Result<TraceRecord, RecordError> {
    let mut fields = line.split(FIELD_SEPARATOR);
    let (time_field, data_field) = match (fields.next(), fields.next(), fields.next()) {
        (Some(time), Some(data), None) => (time, data),
        _ => return Err(RecordError::MalformedRecord(line.to_string())),
    };

    let timestamp: f64 = time_field
        .parse()
        .map_err(|_| RecordError::InvalidTimestamp(time_field.to_string()))?;
    // NaN fails the is_finite check, so it never slips past as "not < 0".
    if !timestamp.is_finite() || timestamp < 0.0 {
        return Err(RecordError::InvalidTimestamp(time_field.to_string()));
    }

    let data_field = data_field.strip_suffix('\n').unwrap_or(data_field);
    let payload = BASE64.decode(data_field)?;

    Ok(TraceRecord::new(timestamp, Bytes::from(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_format() {
        let line = encode(0.0, b"hello");
        assert_eq!(line, "0.0000000000\taGVsbG8=\n");

        let line = encode(1.5, b"");
        assert_eq!(line, "1.5000000000\t\n");
    }

    #[test]
    fn test_roundtrip() {
        let payload = b"some binary \x00\xff\x7f data";
        let line = encode(12.3456789, payload);
        let record = decode(&line).unwrap();

        assert!((record.timestamp - 12.3456789).abs() < 1e-10);
        assert_eq!(&record.payload[..], payload);
    }

    #[test]
    fn test_decode_without_trailing_newline() {
        let record = decode("2.0000000000\taGVsbG8=").unwrap();
        assert_eq!(record.timestamp, 2.0);
        assert_eq!(&record.payload[..], b"hello");
    }

    #[test]
    fn test_decode_empty_payload() {
        let record = decode("0.0000000000\t\n").unwrap();
        assert_eq!(record.timestamp, 0.0);
        assert!(record.payload.is_empty());
    }

    #[test]
    fn test_malformed_field_count() {
        assert!(matches!(
            decode("no tab here\n"),
            Err(RecordError::MalformedRecord(_))
        ));
        assert!(matches!(
            decode("1.0\taGVsbG8=\textra\n"),
            Err(RecordError::MalformedRecord(_))
        ));
        assert!(matches!(decode(""), Err(RecordError::MalformedRecord(_))));
    }

    #[test]
    fn test_invalid_timestamp() {
        // Negative timestamps are a parse error, never a clamp.
        assert!(matches!(
            decode("-1.0\taGVsbG8=\n"),
            Err(RecordError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            decode("abc\taGVsbG8=\n"),
            Err(RecordError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            decode("inf\taGVsbG8=\n"),
            Err(RecordError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            decode("NaN\taGVsbG8=\n"),
            Err(RecordError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_invalid_payload() {
        assert!(matches!(
            decode("1.0\tnot!!base64\n"),
            Err(RecordError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_record_encode_matches_free_function() {
        let record = TraceRecord::new(3.25, Bytes::from_static(b"abc"));
        assert_eq!(record.encode(), encode(3.25, b"abc"));
    }
}
