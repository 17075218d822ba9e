//! Monotonic millisecond timestamps.
//!
//! The device clock is a free-running `u32` millisecond counter that wraps
//! after roughly 49.7 days. Never compare two timestamps directly; always
//! measure the distance between them with [`elapsed`].

use std::time::Instant;

/// Milliseconds on a wrapping monotonic clock.
pub type Millis = u32;

/// Time elapsed from `since` to `now`, correct across counter wraparound.
#[inline]
pub fn elapsed(now: Millis, since: Millis) -> Millis {
    now.wrapping_sub(since)
}

/// Host-side clock producing wrapping `Millis` from [`Instant`].
///
/// On the device the same value comes from the ESP-IDF timer; this exists so
/// the host simulation drives the state machine with the same arithmetic.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
    offset: Millis,
}

impl MonotonicClock {
    /// Start a clock reading zero now.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Start a clock at an arbitrary reading, useful for exercising wraparound.
    pub fn starting_at(offset: Millis) -> Self {
        Self {
            origin: Instant::now(),
            offset,
        }
    }

    /// Current reading. Truncation to `u32` is the intended wrap.
    pub fn now(&self) -> Millis {
        let ms = self.origin.elapsed().as_millis() as u32;
        self.offset.wrapping_add(ms)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
