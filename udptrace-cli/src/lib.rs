//! CLI support for the udp-record and udp-play tools

pub mod config;

pub use config::{ConfigError, JobConfig, PlayJob, RecordJob};
