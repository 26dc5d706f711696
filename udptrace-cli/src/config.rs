//! Configuration file support for the udptrace CLI tools

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Recording job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordJob {
    /// Trace file to create
    pub trace: PathBuf,
    /// Local address to capture on
    pub bind: SocketAddr,
    /// Largest datagram received intact, in bytes
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// Capture duration in seconds; absent means run until killed
    pub duration_secs: Option<u64>,
}

fn default_max_packet_size() -> usize {
    udptrace::DEFAULT_MAX_PACKET_SIZE
}

/// Playback job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayJob {
    /// Trace file to replay
    pub trace: PathBuf,
    /// Destination address
    pub dest: SocketAddr,
    /// Skip records before this timestamp, in seconds
    #[serde(default)]
    pub begin_time: f64,
    /// Stop before the first record past this timestamp
    pub end_time: Option<f64>,
}

/// Combined job file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Recording job
    pub record: Option<RecordJob>,
    /// Playback job
    pub play: Option<PlayJob>,
}

impl JobConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: JobConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// The `[record]` table, required by `udp-record`
    pub fn record(&self) -> Result<&RecordJob, ConfigError> {
        self.record
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("missing [record] table".to_string()))
    }

    /// The `[play]` table, required by `udp-play`
    pub fn play(&self) -> Result<&PlayJob, ConfigError> {
        self.play
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("missing [play] table".to_string()))
    }

    /// Create an example recording configuration
    pub fn example_record() -> Self {
        JobConfig {
            record: Some(RecordJob {
                trace: PathBuf::from("capture.trace"),
                bind: "0.0.0.0:9000".parse().unwrap(),
                max_packet_size: default_max_packet_size(),
                duration_secs: None,
            }),
            play: None,
        }
    }

    /// Create an example playback configuration
    pub fn example_play() -> Self {
        JobConfig {
            record: None,
            play: Some(PlayJob {
                trace: PathBuf::from("capture.trace"),
                dest: "127.0.0.1:9000".parse().unwrap(),
                begin_time: 0.0,
                end_time: None,
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
