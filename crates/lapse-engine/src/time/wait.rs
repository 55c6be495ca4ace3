use std::time::Duration;

use super::Clock;

/// Outcome of a [`BoundedWait`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WaitOutcome<T> {
    Ready(T),
    /// The deadline passed before the poll produced a value.
    TimedOut { waited: Duration },
}

/// Poll-until-ready loop with a deadline.
///
/// The poll closure is always invoked at least once, even with a zero timeout.
/// Between polls the caller is paused for `interval` (clamped to the time
/// left), so the worst-case stall is `timeout` plus one poll.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BoundedWait {
    pub timeout: Duration,
    pub interval: Duration,
}

impl BoundedWait {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Runs `poll` until it yields a value, fails, or the deadline passes.
    pub fn run<C, T, E, F>(&self, clock: &C, mut poll: F) -> Result<WaitOutcome<T>, E>
    where
        C: Clock + ?Sized,
        F: FnMut() -> Result<Option<T>, E>,
    {
        let start = clock.now();

        loop {
            if let Some(value) = poll()? {
                return Ok(WaitOutcome::Ready(value));
            }

            let waited = clock.now().saturating_sub(start);
            if waited >= self.timeout {
                return Ok(WaitOutcome::TimedOut { waited });
            }

            clock.pause(self.interval.min(self.timeout - waited));
        }
    }
}
