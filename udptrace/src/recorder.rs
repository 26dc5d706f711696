//! Recording loop: capture UDP datagrams into a trace file
//!
//! Binds a socket, stamps each datagram on arrival, and appends one encoded
//! record per datagram. Timestamps are relative to the first datagram, which
//! is always written as exactly `0.0`; startup delay before traffic begins
//! never shows up in the trace.

use crate::session::{SessionController, SessionError, StopFlag, DEFAULT_STOP_TIMEOUT};
use parking_lot::Mutex;
use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use udptrace_format::TraceWriter;
use udptrace_io::{Timestamp, UdpEndpoint};

/// Largest datagram received intact, in bytes. Larger datagrams are
/// truncated by the OS receive.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 16384;

/// How long a blocked receive waits before rechecking the stop flag.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Recording session parameters
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Trace file to write. Always created fresh; recording never resumes
    /// an existing trace.
    pub trace_path: PathBuf,
    /// Local address to capture datagrams on.
    pub bind_addr: SocketAddr,
    /// Receive buffer bound.
    pub max_packet_size: usize,
}

impl RecorderConfig {
    pub fn new(trace_path: impl Into<PathBuf>, bind_addr: SocketAddr) -> Self {
        RecorderConfig {
            trace_path: trace_path.into(),
            bind_addr,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }

    pub fn with_max_packet_size(mut self, max_packet_size: usize) -> Self {
        self.max_packet_size = max_packet_size;
        self
    }
}

/// Controls at most one recording session at a time.
///
/// Recording has no natural end; it runs until `stop` or a socket failure.
#[derive(Default)]
pub struct RecorderSession {
    controller: SessionController,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl RecorderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording on a background thread.
    ///
    /// The socket is bound and the trace file created before this returns,
    /// so those failures are synchronous. Fails with
    /// [`SessionError::AlreadyActive`] while a recording is in progress.
    pub fn start(&self, config: RecorderConfig) -> Result<(), SessionError> {
        self.controller.start_with("udptrace-recorder", || {
            let socket = UdpEndpoint::bind(config.bind_addr)?;
            socket.set_read_timeout(Some(RECV_POLL_INTERVAL))?;
            let bound = socket.local_addr()?;
            let writer = TraceWriter::create(&config.trace_path)?;

            tracing::info!(
                addr = %bound,
                trace = %config.trace_path.display(),
                "recording started"
            );
            *self.local_addr.lock() = Some(bound);

            let max_packet_size = config.max_packet_size;
            Ok(move |stop: StopFlag| record_loop(socket, writer, max_packet_size, stop))
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

    /// Local address of the most recent capture socket. Useful when binding
    /// to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }
}

fn record_loop(
    socket: UdpEndpoint,
    mut writer: TraceWriter<File>,
    max_packet_size: usize,
    stop: StopFlag,
) -> Result<(), SessionError> {
    let mut buf = vec![0u8; max_packet_size];
    let mut first_arrival: Option<Timestamp> = None;

    while !stop.is_set() {
        let (len, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if e.is_timeout() => continue,
            Err(e) => return Err(e.into()),
        };
        // Stamp before encoding so encode cost never skews the recorded
        // spacing.
        let arrival = Timestamp::now();

        let elapsed = match first_arrival {
            None => {
                first_arrival = Some(arrival);
                0.0
            }
            Some(first) => arrival.as_secs_since(first),
        };

        tracing::trace!(len, %from, elapsed, "datagram captured");
        writer.append(elapsed, &buf[..len])?;
    }

    tracing::info!(records = writer.records_written(), "recording stopped");
    Ok(())
}
