//! udp-play - replay a recorded trace to a UDP destination

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use udptrace::{PlayerConfig, PlayerSession};
use udptrace_cli::JobConfig;

#[derive(Parser, Debug)]
#[command(name = "udp-play")]
#[command(about = "Replay a recorded UDP trace to a destination address", long_about = None)]
struct Args {
    /// Trace file to replay
    trace: Option<PathBuf>,

    /// Destination host for the replayed datagrams
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Destination port
    #[arg(short, long, default_value = "9000")]
    port: u16,

    /// Start playback at this trace timestamp, in seconds
    #[arg(short, long, default_value_t = 0.0)]
    begin: f64,

    /// Stop playback past this trace timestamp, in seconds
    #[arg(short, long)]
    end: Option<f64>,

    /// Load the job from a TOML file instead of flags
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    let config = if let Some(path) = &args.config {
        let job = JobConfig::from_file(path)?.play()?.clone();
        PlayerConfig::new(job.trace, job.dest).with_bounds(job.begin_time, job.end_time)
    } else {
        let trace = args
            .trace
            .ok_or_else(|| anyhow::anyhow!("a trace file argument is required"))?;
        let dest_addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
        PlayerConfig::new(trace, dest_addr).with_bounds(args.begin, args.end)
    };

    let session = PlayerSession::new();
    session.start(config)?;

    // Playback ends naturally at EOF or at the end bound.
    while session.is_running() {
        thread::sleep(Duration::from_millis(50));
    }

    session.stop_default()?;
    Ok(())
}
