use crate::device::{DeviceError, QueryKind, TimingContext, TimingDevice};
use crate::time::{BoundedWait, Clock, WaitOutcome};

use super::slot::SlotMark;
use super::Slot;

/// Verdict on one bracketed frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DisjointStatus {
    /// The clock was stable; timestamps convert with `frequency` ticks per second.
    Stable { frequency: u64 },
    /// The clock changed during the frame. No timestamp from it can be trusted.
    Disjoint,
    /// The result did not arrive before the readback deadline.
    TimedOut,
    /// The query could not be read (released, never bracketed, or device error).
    Failed,
}

impl DisjointStatus {
    /// Frequency to convert this frame's timestamps with, if it may be trusted.
    pub fn frequency(self) -> Option<u64> {
        match self {
            DisjointStatus::Stable { frequency } => Some(frequency),
            _ => None,
        }
    }
}

/// One disjoint query per slot, bracketing each frame.
pub struct DisjointTracker<Q> {
    queries: Option<[Q; 2]>,
    marks: [SlotMark; 2],
}

impl<Q> DisjointTracker<Q> {
    pub fn create<D>(device: &D) -> Result<Self, DeviceError>
    where
        D: TimingDevice<Query = Q> + ?Sized,
    {
        let even = device.create_query(QueryKind::Disjoint)?;
        let odd = device.create_query(QueryKind::Disjoint)?;

        Ok(Self {
            queries: Some([even, odd]),
            marks: [SlotMark::Empty; 2],
        })
    }

    pub fn is_live(&self) -> bool {
        self.queries.is_some()
    }

    /// Opens the frame bracket for `slot`.
    pub fn begin<C>(&mut self, ctx: &mut C, slot: Slot)
    where
        C: TimingContext<Query = Q> + ?Sized,
    {
        let Some(queries) = &self.queries else {
            return;
        };
        ctx.begin(&queries[slot.index()]);
        self.marks[slot.index()] = SlotMark::Begun;
    }

    /// Closes the frame bracket for `slot`.
    pub fn end<C>(&mut self, ctx: &mut C, slot: Slot)
    where
        C: TimingContext<Query = Q> + ?Sized,
    {
        let Some(queries) = &self.queries else {
            return;
        };
        ctx.end(&queries[slot.index()]);
        self.marks[slot.index()] = self.marks[slot.index()].ended();
    }

    /// Waits for the bracket of `slot` to resolve.
    ///
    /// This is the only place the engine blocks. The wait is bounded by `wait`;
    /// a late result yields [`DisjointStatus::TimedOut`] rather than a stall.
    pub fn update<C, K>(&self, ctx: &mut C, slot: Slot, wait: &BoundedWait, clock: &K) -> DisjointStatus
    where
        C: TimingContext<Query = Q> + ?Sized,
        K: Clock + ?Sized,
    {
        let Some(queries) = &self.queries else {
            return DisjointStatus::Failed;
        };
        if self.marks[slot.index()] != SlotMark::Ended {
            log::trace!("disjoint query for {slot:?} was never bracketed");
            return DisjointStatus::Failed;
        }

        let query = &queries[slot.index()];
        match wait.run(clock, || ctx.poll_disjoint(query)) {
            Ok(WaitOutcome::Ready(data)) if data.disjoint || data.frequency == 0 => {
                DisjointStatus::Disjoint
            }
            Ok(WaitOutcome::Ready(data)) => DisjointStatus::Stable {
                frequency: data.frequency,
            },
            Ok(WaitOutcome::TimedOut { waited }) => {
                log::warn!("disjoint readback for {slot:?} timed out after {waited:?}");
                DisjointStatus::TimedOut
            }
            Err(err) => {
                log::warn!("disjoint readback for {slot:?} failed: {err}");
                DisjointStatus::Failed
            }
        }
    }

    /// Frees both queries. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.queries = None;
        self.marks = [SlotMark::Empty; 2];
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::device::fake::FakeDevice;
    use crate::time::ManualClock;

    fn wait() -> BoundedWait {
        BoundedWait::new(Duration::from_millis(10), Duration::from_millis(1))
    }

    #[test]
    fn stable_bracket_reports_frequency() {
        let device = FakeDevice::new();
        device.set_frequency(25_000_000);
        let mut ctx = device.immediate_context();
        let mut tracker = DisjointTracker::create(&device).unwrap();

        tracker.begin(&mut ctx, Slot::Even);
        tracker.end(&mut ctx, Slot::Even);

        let status = tracker.update(&mut ctx, Slot::Even, &wait(), &ManualClock::new());
        assert_eq!(status, DisjointStatus::Stable { frequency: 25_000_000 });
        assert_eq!(status.frequency(), Some(25_000_000));
    }

    #[test]
    fn disjoint_bracket_has_no_frequency() {
        let device = FakeDevice::new();
        device.set_disjoint(true);
        let mut ctx = device.immediate_context();
        let mut tracker = DisjointTracker::create(&device).unwrap();

        tracker.begin(&mut ctx, Slot::Odd);
        tracker.end(&mut ctx, Slot::Odd);

        let status = tracker.update(&mut ctx, Slot::Odd, &wait(), &ManualClock::new());
        assert_eq!(status, DisjointStatus::Disjoint);
        assert_eq!(status.frequency(), None);
    }

    #[test]
    fn stalled_gpu_times_out_on_the_clock() {
        let device = FakeDevice::new();
        device.set_stalled(true);
        let mut ctx = device.immediate_context();
        let mut tracker = DisjointTracker::create(&device).unwrap();
        let clock = ManualClock::new();

        tracker.begin(&mut ctx, Slot::Even);
        tracker.end(&mut ctx, Slot::Even);

        let status = tracker.update(&mut ctx, Slot::Even, &wait(), &clock);
        assert_eq!(status, DisjointStatus::TimedOut);
        assert_eq!(clock.now(), Duration::from_millis(10));
    }

    #[test]
    fn unbracketed_slot_fails_without_waiting() {
        let device = FakeDevice::new();
        device.set_stalled(true);
        let mut ctx = device.immediate_context();
        let mut tracker = DisjointTracker::create(&device).unwrap();
        let clock = ManualClock::new();

        tracker.begin(&mut ctx, Slot::Even);

        let status = tracker.update(&mut ctx, Slot::Even, &wait(), &clock);
        assert_eq!(status, DisjointStatus::Failed);
        assert_eq!(clock.pauses(), 0);
    }

    #[test]
    fn stray_end_after_a_full_bracket_fails_without_waiting() {
        let device = FakeDevice::new();
        let mut ctx = device.immediate_context();
        let mut tracker = DisjointTracker::create(&device).unwrap();
        let clock = ManualClock::new();

        tracker.begin(&mut ctx, Slot::Even);
        tracker.end(&mut ctx, Slot::Even);
        assert!(tracker.update(&mut ctx, Slot::Even, &wait(), &clock).frequency().is_some());

        device.set_stalled(true);
        tracker.end(&mut ctx, Slot::Even);

        let status = tracker.update(&mut ctx, Slot::Even, &wait(), &clock);
        assert_eq!(status, DisjointStatus::Failed);
        assert_eq!(clock.pauses(), 0);
    }

    #[test]
    fn release_frees_both_queries_once() {
        let device = FakeDevice::new();
        let mut tracker = DisjointTracker::create(&device).unwrap();
        assert_eq!(device.live_queries(), 2);
        tracker.release();
        tracker.release();
        assert!(!tracker.is_live());
        assert_eq!(device.live_queries(), 0);
    }

    #[test]
    fn partial_create_frees_the_first_query() {
        let device = FakeDevice::new();
        device.fail_after(1);
        assert!(DisjointTracker::create(&device).is_err());
        assert_eq!(device.live_queries(), 0);
    }
}
