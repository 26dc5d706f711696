//! Timestamp index seeking
//!
//! Locates the byte offset of the first record whose timestamp is at or
//! after a target, so playback can start mid-trace without replaying the
//! prefix. The returned offset is always aligned to the start of a record.
//!
//! Records are variable-length lines, so the binary variant bisects byte
//! positions: each probe skips the line fragment at the midpoint, reads the
//! next full record, and uses timestamp monotonicity to discard half the
//! range. Once the range collapses, a short linear scan from the proven
//! lower bound pins down the exact record boundary.

use crate::reader::{ReadError, TraceRecords};
use crate::record::decode;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

/// Byte offset of the first record with timestamp `>= target`.
///
/// Targets past either end of the trace are not errors: they resolve to the
/// nearest boundary, offset `0` or EOF. An empty trace resolves to `0`.
///
/// If a probe hits a record that does not decode, the whole search falls
/// back to [`seek_timestamp_linear`], which stops at the corruption; the
/// tail past a corrupt record is unreachable by seek.
pub fn seek_timestamp<S: Read + Seek>(source: &mut S, target: f64) -> io::Result<u64> {
    let len = source.seek(SeekFrom::End(0))?;
    if len == 0 {
        return Ok(0);
    }

    // Invariant: lo is record-aligned and every record starting before lo
    // has a timestamp below the target. hi only bounds the bisection.
    let mut lo: u64 = 0;
    let mut hi: u64 = len;
    while hi > lo {
        let mid = lo + (hi - lo) / 2;
        if mid == lo {
            // Range collapsed to less than a line fragment; finish linearly.
            break;
        }
        match probe_after(source, mid, len)? {
            Probe::Record {
                line_end,
                timestamp,
            } => {
                if timestamp >= target {
                    hi = mid;
                } else {
                    // Monotonicity: every record up to the end of this line
                    // is below the target.
                    lo = line_end;
                }
            }
            Probe::End => hi = mid,
            Probe::Corrupt => return seek_timestamp_linear(source, target),
        }
    }

    scan_from(source, lo, target)
}

/// Byte offset of the first record with timestamp `>= target`, found by
/// scanning sequentially from the start of the trace.
///
/// The reference implementation for seek semantics: returns the EOF offset
/// when every record is below the target, `0` when the trace is empty or the
/// target is at or below the first timestamp. A record that fails to decode
/// terminates the scan and its own offset is returned.
pub fn seek_timestamp_linear<S: Read + Seek>(source: &mut S, target: f64) -> io::Result<u64> {
    scan_from(source, 0, target)
}

enum Probe {
    /// A full record follows the probe point.
    Record { line_end: u64, timestamp: f64 },
    /// No full record between the probe point and EOF.
    End,
    /// The record after the probe point does not decode.
    Corrupt,
}

/// Skip the (possibly partial) line at `pos` and examine the next full one.
fn probe_after<S: Read + Seek>(source: &mut S, pos: u64, len: u64) -> io::Result<Probe> {
    source.seek(SeekFrom::Start(pos))?;
    let mut reader = BufReader::new(&mut *source);

    let mut fragment = Vec::new();
    let skipped = reader.read_until(b'\n', &mut fragment)? as u64;
    let line_start = pos + skipped;
    if line_start >= len || !fragment.ends_with(b"\n") {
        return Ok(Probe::End);
    }

    let mut line = Vec::new();
    let read = reader.read_until(b'\n', &mut line)? as u64;
    if read == 0 {
        return Ok(Probe::End);
    }

    let timestamp = std::str::from_utf8(&line)
        .ok()
        .and_then(|line| decode(line).ok())
        .map(|record| record.timestamp);
    Ok(match timestamp {
        Some(timestamp) => Probe::Record {
            line_end: line_start + read,
            timestamp,
        },
        None => Probe::Corrupt,
    })
}

fn scan_from<S: Read + Seek>(source: &mut S, start: u64, target: f64) -> io::Result<u64> {
    source.seek(SeekFrom::Start(start))?;
    let mut records = TraceRecords::with_offset(BufReader::new(&mut *source), start);
    loop {
        match records.next() {
            Some((offset, Ok(record))) => {
                if record.timestamp >= target {
                    return Ok(offset);
                }
            }
            // Skip-and-stop: the scan ends at the corrupt record's offset.
            Some((offset, Err(ReadError::Record(_)))) => return Ok(offset),
            Some((_, Err(ReadError::Io(e)))) => return Err(e),
            None => return Ok(records.offset()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::encode;
    use std::io::Cursor;

    /// Trace plus the byte offset of each record and the EOF offset.
    fn build_trace(timestamps: &[f64]) -> (Cursor<Vec<u8>>, Vec<u64>, u64) {
        let mut data = Vec::new();
        let mut offsets = Vec::new();
        for (i, &ts) in timestamps.iter().enumerate() {
            offsets.push(data.len() as u64);
            data.extend_from_slice(encode(ts, format!("payload-{i}").as_bytes()).as_bytes());
        }
        let len = data.len() as u64;
        (Cursor::new(data), offsets, len)
    }

    #[test]
    fn test_seek_between_records() {
        let (mut trace, offsets, _) = build_trace(&[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(seek_timestamp(&mut trace, 1.5).unwrap(), offsets[2]);
        assert_eq!(seek_timestamp_linear(&mut trace, 1.5).unwrap(), offsets[2]);
    }

    #[test]
    fn test_seek_exact_timestamp() {
        let (mut trace, offsets, _) = build_trace(&[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(seek_timestamp(&mut trace, 2.0).unwrap(), offsets[2]);
        assert_eq!(seek_timestamp_linear(&mut trace, 2.0).unwrap(), offsets[2]);
    }

    #[test]
    fn test_seek_at_or_before_start_returns_zero() {
        let (mut trace, _, _) = build_trace(&[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(seek_timestamp(&mut trace, 0.0).unwrap(), 0);
        assert_eq!(seek_timestamp(&mut trace, -1.0).unwrap(), 0);
        assert_eq!(seek_timestamp_linear(&mut trace, 0.0).unwrap(), 0);
        assert_eq!(seek_timestamp_linear(&mut trace, -1.0).unwrap(), 0);
    }

    #[test]
    fn test_seek_past_end_returns_eof_offset() {
        let (mut trace, _, len) = build_trace(&[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(seek_timestamp(&mut trace, 100.0).unwrap(), len);
        assert_eq!(seek_timestamp_linear(&mut trace, 100.0).unwrap(), len);
    }

    #[test]
    fn test_seek_empty_trace() {
        let mut trace = Cursor::new(Vec::new());
        assert_eq!(seek_timestamp(&mut trace, 5.0).unwrap(), 0);
        assert_eq!(seek_timestamp_linear(&mut trace, 5.0).unwrap(), 0);
    }

    #[test]
    fn test_seek_single_record() {
        let (mut trace, _, len) = build_trace(&[0.0]);
        assert_eq!(seek_timestamp(&mut trace, 0.0).unwrap(), 0);
        assert_eq!(seek_timestamp(&mut trace, 0.5).unwrap(), len);
    }

    #[test]
    fn test_linear_scan_stops_at_corruption() {
        let mut data = Vec::new();
        data.extend_from_slice(encode(0.0, b"a").as_bytes());
        let second_offset = data.len() as u64;
        data.extend_from_slice(encode(1.0, b"b").as_bytes());
        let corrupt_offset = data.len() as u64;
        data.extend_from_slice(b"this is not a record\n");
        data.extend_from_slice(encode(3.0, b"c").as_bytes());

        // Records past the corruption are unreachable by seek.
        let mut trace = Cursor::new(data);
        assert_eq!(
            seek_timestamp_linear(&mut trace, 3.0).unwrap(),
            corrupt_offset
        );
        assert_eq!(
            seek_timestamp_linear(&mut trace, 0.5).unwrap(),
            second_offset
        );
    }

    #[test]
    fn test_binary_falls_back_on_corruption() {
        let mut data = Vec::new();
        data.extend_from_slice(encode(0.0, b"a").as_bytes());
        let corrupt_offset = data.len() as u64;
        for _ in 0..200 {
            data.extend_from_slice(b"????????????????????\n");
        }

        let mut trace = Cursor::new(data);
        assert_eq!(seek_timestamp(&mut trace, 50.0).unwrap(), corrupt_offset);
    }

    #[test]
    fn test_binary_agrees_with_linear() {
        // Uneven payload sizes give uneven line lengths.
        let timestamps: Vec<f64> = (0..500).map(|i| (i as f64) * 0.37).collect();
        let mut data = Vec::new();
        for (i, &ts) in timestamps.iter().enumerate() {
            let payload = vec![b'x'; (i * 13) % 97 + 1];
            data.extend_from_slice(encode(ts, &payload).as_bytes());
        }

        let mut trace = Cursor::new(data);
        for target in [-5.0, 0.0, 0.2, 1.0, 37.0, 92.4, 184.63, 200.0] {
            let linear = seek_timestamp_linear(&mut trace, target).unwrap();
            let binary = seek_timestamp(&mut trace, target).unwrap();
            assert_eq!(binary, linear, "target {target}");
        }
    }
}
