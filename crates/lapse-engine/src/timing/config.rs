use std::time::Duration;

use crate::time::BoundedWait;

/// Tuning knobs for the timing engine.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Upper bound on how long `end_frame` may block waiting for the disjoint
    /// query of the frame it just closed.
    ///
    /// On timeout the frame is skipped and every duration keeps its value.
    pub readback_timeout: Duration,

    /// Pause between polls while waiting. Zero yields instead of sleeping.
    pub poll_interval: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            readback_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl TimingConfig {
    pub(crate) fn readback_wait(&self) -> BoundedWait {
        BoundedWait::new(self.readback_timeout, self.poll_interval)
    }
}
