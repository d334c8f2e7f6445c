//! Millisecond time source used to gate the driver's I/O.
use std::time::Instant;

/// A free-running millisecond counter. It may start anywhere and wraps at `u32::MAX`.
pub trait Clock {
    fn now(&mut self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now(&mut self) -> u32 {
        (**self).now()
    }
}

/// Milliseconds from `since` to `now`, correct across one wrap of the counter.
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// [`Clock`] backed by [`Instant`], counting from when it was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&mut self) -> u32 {
        // truncation is the wrap
        self.origin.elapsed().as_millis() as u32
    }
}
