use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source with a way to pause the caller.
pub trait Clock {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;

    /// Suspends the calling thread for roughly `interval`.
    ///
    /// A zero interval yields the time slice instead of sleeping.
    fn pause(&self, interval: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn pause(&self, interval: Duration) {
        (**self).pause(interval)
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn pause(&self, interval: Duration) {
        (**self).pause(interval)
    }
}

/// Wall clock backed by `Instant` and `thread::sleep`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
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
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn pause(&self, interval: Duration) {
        if interval.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(interval);
        }
    }
}

/// Clock that only moves when told to.
///
/// `pause` advances the clock by the requested interval and returns
/// immediately, so a timed-out wait costs no real time.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    pauses: Cell<u32>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Number of `pause` calls so far.
    pub fn pauses(&self) -> u32 {
        self.pauses.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn pause(&self, interval: Duration) {
        self.pauses.set(self.pauses.get() + 1);
        // Zero-length pauses still have to make progress.
        self.advance(interval.max(Duration::from_nanos(1)));
    }
}
