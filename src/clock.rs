use std::time::{Duration, Instant};

/// Monotonic time source for the collection loop.
///
/// `now` returns the time elapsed since an arbitrary origin fixed for the
/// lifetime of the clock; only differences between readings are meaningful.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall-clock time via `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}
