//! udp-record - capture UDP traffic into a timestamped trace file

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use udptrace::{RecorderConfig, RecorderSession, DEFAULT_MAX_PACKET_SIZE};
use udptrace_cli::JobConfig;

#[derive(Parser, Debug)]
#[command(name = "udp-record")]
#[command(about = "Record UDP datagrams into a timestamped trace file", long_about = None)]
struct Args {
    /// Trace file to write (created fresh)
    trace: Option<PathBuf>,

    /// Local address to capture datagrams on
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to capture datagrams on
    #[arg(short, long, default_value = "9000")]
    port: u16,

    /// Largest datagram received intact, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_PACKET_SIZE)]
    max_packet_size: usize,

    /// Stop after this many seconds (default: run until killed)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Load the job from a TOML file instead of flags
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    let (config, duration) = if let Some(path) = &args.config {
        let job = JobConfig::from_file(path)?.record()?.clone();
        (
            RecorderConfig::new(job.trace, job.bind).with_max_packet_size(job.max_packet_size),
            job.duration_secs,
        )
    } else {
        let trace = args
            .trace
            .ok_or_else(|| anyhow::anyhow!("a trace file argument is required"))?;
        let bind_addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
        (
            RecorderConfig::new(trace, bind_addr).with_max_packet_size(args.max_packet_size),
            args.duration,
        )
    };

    let session = RecorderSession::new();
    session.start(config)?;
    tracing::info!("recording; stop with Ctrl-C");

    // Recording has no natural end; wait for the deadline, a kill signal, or
    // the session dying on a socket failure.
    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    while session.is_running() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        thread::sleep(Duration::from_millis(200));
    }

    session.stop_default()?;
    Ok(())
}
