//! I/O primitives for UDP trace capture and replay
//!
//! UDP socket wrapper and monotonic time utilities shared by the recorder
//! and player sessions.

pub mod socket;
pub mod time;

pub use socket::{SocketError, UdpEndpoint};
pub use time::Timestamp;
