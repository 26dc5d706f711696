//! UDP traffic recording and replay
//!
//! Captures UDP datagrams into a timestamped trace file and replays them
//! with approximately the original spacing. Each session runs its loop on a
//! background thread and is controlled through `start`, `stop`, and
//! `is_running`.

pub mod player;
pub mod recorder;
pub mod session;

pub use player::{PlayerConfig, PlayerSession, BATCH_CAPACITY};
pub use recorder::{RecorderConfig, RecorderSession, DEFAULT_MAX_PACKET_SIZE};
pub use session::{SessionController, SessionError, StopFlag, DEFAULT_STOP_TIMEOUT};
