//! Monotonic time utilities
//!
//! Trace timestamps are seconds relative to the first captured datagram, so
//! both the recorder and the player work with a monotonic clock and convert
//! to floating-point seconds only at the trace boundary.

use std::ops::{Add, Sub};
use std::time::{Duration, Instant};

/// Monotonic timestamp
///
/// Wraps `std::time::Instant`. The recorder stamps each datagram on arrival
/// and writes the difference from the first arrival; the player schedules
/// batch sends against these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(Instant);

impl Timestamp {
    /// Get the current timestamp
    #[inline]
    pub fn now() -> Self {
        Timestamp(Instant::now())
    }

    /// Duration since another timestamp, saturating to zero if `earlier` is
    /// actually later
    #[inline]
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        self.0.duration_since(earlier.0)
    }

    /// Elapsed time since this timestamp
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }

    /// Seconds since a reference timestamp, as written to a trace
    pub fn as_secs_since(&self, reference: Timestamp) -> f64 {
        self.0.duration_since(reference.0).as_secs_f64()
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, duration: Duration) -> Timestamp {
        Timestamp(self.0 + duration)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, duration: Duration) -> Timestamp {
        Timestamp(self.0 - duration)
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    fn sub(self, other: Timestamp) -> Duration {
        self.0.duration_since(other.0)
    }
}
