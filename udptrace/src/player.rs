//! Playback loop: replay a trace to a destination socket
//!
//! Records are sent in batches: the loop accumulates up to [`BATCH_CAPACITY`]
//! decoded records, sends the whole batch back-to-back, and schedules the
//! next batch one batch-span later. Sleeping once per packet would burn CPU
//! on timer polling; the batch approximation trades intra-batch spacing for
//! efficiency and relies on the receiver to buffer bursts and smooth them
//! itself. Packets still leave in strict file order.

use crate::session::{SessionController, SessionError, StopFlag, DEFAULT_STOP_TIMEOUT};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use udptrace_format::{seek_timestamp, ReadError, TraceRecords};
use udptrace_io::{Timestamp, UdpEndpoint};

/// Records accumulated before a batch is sent.
pub const BATCH_CAPACITY: usize = 100;

/// Slice length for interruptible waits between batches.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Playback session parameters
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Trace file to replay. Never modified.
    pub trace_path: PathBuf,
    /// Destination for the replayed datagrams.
    pub dest_addr: SocketAddr,
    /// Skip records before this timestamp, in seconds. Non-zero values seek
    /// into the trace instead of reading from the start.
    pub begin_time: f64,
    /// Stop before the first record whose timestamp exceeds this bound; the
    /// record equal to the bound is still sent.
    pub end_time: Option<f64>,
}

impl PlayerConfig {
    pub fn new(trace_path: impl Into<PathBuf>, dest_addr: SocketAddr) -> Self {
        PlayerConfig {
            trace_path: trace_path.into(),
            dest_addr,
            begin_time: 0.0,
            end_time: None,
        }
    }

    pub fn with_bounds(mut self, begin_time: f64, end_time: Option<f64>) -> Self {
        self.begin_time = begin_time;
        self.end_time = end_time;
        self
    }
}

/// Controls at most one playback session at a time.
///
/// Playback ends naturally at EOF or at `end_time`; the session is
/// restartable afterwards without an explicit `stop`.
#[derive(Default)]
pub struct PlayerSession {
    controller: SessionController,
}

impl PlayerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start playback on a background thread.
    ///
    /// The trace is opened, and for a non-zero `begin_time` seeked, before
    /// this returns, so a missing file fails synchronously. Fails with
    /// [`SessionError::AlreadyActive`] while a playback is in progress.
    pub fn start(&self, config: PlayerConfig) -> Result<(), SessionError> {
        self.controller.start_with("udptrace-player", || {
            let socket = UdpEndpoint::unbound(config.dest_addr.is_ipv6())?;
            let mut file = File::open(&config.trace_path)?;

            let start_offset = if config.begin_time > 0.0 {
                seek_timestamp(&mut file, config.begin_time)?
            } else {
                0
            };
            file.seek(SeekFrom::Start(start_offset))?;

            tracing::info!(
                trace = %config.trace_path.display(),
                dest = %config.dest_addr,
                offset = start_offset,
                "playback started"
            );

            Ok(move |stop: StopFlag| play_loop(socket, file, start_offset, config, stop))
        })
    }

    /// Stop the session, waiting up to `timeout` for the loop to exit.
    ///
    /// Surfaces any failure the loop died with. A no-op when idle.
    pub fn stop(&self, timeout: Duration) -> Result<(), SessionError> {
        self.controller.stop(timeout)
    }

    /// Stop with the default timeout.
    pub fn stop_default(&self) -> Result<(), SessionError> {
        self.stop(DEFAULT_STOP_TIMEOUT)
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }
}

fn play_loop(
    socket: UdpEndpoint,
    file: File,
    start_offset: u64,
    config: PlayerConfig,
    stop: StopFlag,
) -> Result<(), SessionError> {
    let mut records = TraceRecords::with_offset(BufReader::new(file), start_offset);
    let mut batch: Vec<Bytes> = Vec::with_capacity(BATCH_CAPACITY);
    let mut batch_first_timestamp = 0.0f64;
    let mut next_play_time: Option<Timestamp> = None;
    let mut sent: u64 = 0;

    for (offset, record) in &mut records {
        if stop.is_set() {
            return Ok(());
        }

        let record = match record {
            Ok(record) => record,
            Err(ReadError::Record(e)) => {
                // Corrupt records are skipped so one bad line cannot abort a
                // long replay. They do not count toward the batch.
                tracing::warn!(offset, error = %e, "skipping corrupt record");
                continue;
            }
            Err(ReadError::Io(e)) => return Err(e.into()),
        };

        // Exclusive upper bound: the first record past end_time ends
        // playback before that record is sent.
        if let Some(end) = config.end_time {
            if record.timestamp > end {
                break;
            }
        }

        if batch.is_empty() {
            batch_first_timestamp = record.timestamp;
        }
        batch.push(record.payload);
        if batch.len() < BATCH_CAPACITY {
            continue;
        }

        // Time the full batch covered in the original capture. Non-monotonic
        // traces are tolerated; the span just clamps to zero.
        let buffer_span = (record.timestamp - batch_first_timestamp).max(0.0);

        if !wait_until(next_play_time, &stop) {
            return Ok(());
        }
        let send_time = Timestamp::now();
        for payload in batch.drain(..) {
            if stop.is_set() {
                return Ok(());
            }
            socket.send_to(&payload, config.dest_addr)?;
            sent += 1;
        }
        next_play_time =
            Some(send_time + Duration::try_from_secs_f64(buffer_span).unwrap_or(Duration::ZERO));
    }

    // Trailing partial batch: honor the pending schedule, then send without
    // reproducing intra-batch spacing.
    if !wait_until(next_play_time, &stop) {
        return Ok(());
    }
    for payload in batch.drain(..) {
        if stop.is_set() {
            return Ok(());
        }
        socket.send_to(&payload, config.dest_addr)?;
        sent += 1;
    }

    tracing::info!(sent, "playback finished");
    Ok(())
}

/// Sleep until `deadline`, in slices, so a stop request interrupts promptly.
/// Returns false if stopped. Never sleeps when the deadline has passed.
fn wait_until(deadline: Option<Timestamp>, stop: &StopFlag) -> bool {
    let Some(deadline) = deadline else {
        return !stop.is_set();
    };
    while !stop.is_set() {
        let remaining = deadline.duration_since(Timestamp::now());
        if remaining.is_zero() {
            return true;
        }
        thread::sleep(remaining.min(WAIT_SLICE));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use udptrace_format::encode;

    fn write_trace(path: &std::path::Path, records: &[(f64, &[u8])]) {
        let mut data = String::new();
        for (ts, payload) in records {
            data.push_str(&encode(*ts, payload));
        }
        std::fs::write(path, data).unwrap();
    }

    fn recv_all(socket: &UdpSocket) -> Vec<Vec<u8>> {
        let mut received = Vec::new();
        let mut buf = [0u8; 2048];
        while let Ok(n) = socket.recv(&mut buf) {
            received.push(buf[..n].to_vec());
        }
        received
    }

    #[test]
    fn test_replays_whole_trace_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("play.trace");
        write_trace(
            &path,
            &[(0.0, b"alpha"), (0.001, b"beta"), (0.002, b"gamma")],
        );

        let dest = UdpSocket::bind("127.0.0.1:0").unwrap();
        dest.set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();

        let session = PlayerSession::new();
        session
            .start(PlayerConfig::new(&path, dest.local_addr().unwrap()))
            .unwrap();

        let received = recv_all(&dest);
        assert_eq!(received, vec![b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec()]);

        // Natural completion leaves the session idle and restartable.
        assert!(!session.is_running());
        session.stop(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn test_missing_trace_fails_synchronously() {
        let dir = tempfile::tempdir().unwrap();
        let session = PlayerSession::new();
        let result = session.start(PlayerConfig::new(
            dir.path().join("nope.trace"),
            "127.0.0.1:9".parse().unwrap(),
        ));
        assert!(matches!(result, Err(SessionError::Io(_))));
        assert!(!session.is_running());
    }

    #[test]
    fn test_stop_interrupts_scheduled_wait() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.trace");

        // A full batch spanning an hour forces a long inter-batch wait.
        let records: Vec<(f64, Vec<u8>)> = (0..=BATCH_CAPACITY + 1)
            .map(|i| (i as f64 * 36.0, format!("p{i}").into_bytes()))
            .collect();
        let borrowed: Vec<(f64, &[u8])> =
            records.iter().map(|(ts, p)| (*ts, p.as_slice())).collect();
        write_trace(&path, &borrowed);

        let dest = UdpSocket::bind("127.0.0.1:0").unwrap();
        let session = PlayerSession::new();
        session
            .start(PlayerConfig::new(&path, dest.local_addr().unwrap()))
            .unwrap();

        // First batch goes out immediately; the second is an hour away.
        thread::sleep(Duration::from_millis(100));
        let started = std::time::Instant::now();
        session.stop(Duration::from_secs(2)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
