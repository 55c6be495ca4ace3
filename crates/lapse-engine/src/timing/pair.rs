use crate::device::{DeviceError, QueryKind, TimingContext, TimingDevice};

use super::slot::SlotMark;
use super::Slot;

/// Duration reported by a timer that never completed a readback, and by
/// lookups with an invalid handle.
pub const UNMEASURED: f32 = -1.0;

/// Frame duration reported while the engine is not ready.
pub const FRAME_NOT_READY: f32 = 0.0;

struct Stamps<Q> {
    start: Q,
    end: Q,
}

impl<Q> Stamps<Q> {
    fn create<D>(device: &D) -> Result<Self, DeviceError>
    where
        D: TimingDevice<Query = Q> + ?Sized,
    {
        Ok(Self {
            start: device.create_query(QueryKind::Timestamp)?,
            end: device.create_query(QueryKind::Timestamp)?,
        })
    }
}

/// Start/end timestamp queries for both slots plus the last measured duration.
///
/// Allocation is all-or-nothing: if any of the four queries fails, the ones
/// already created are dropped before the error is returned.
pub struct QueryPair<Q> {
    stamps: Option<[Stamps<Q>; 2]>,
    marks: [SlotMark; 2],
    duration: f32,
}

impl<Q> QueryPair<Q> {
    pub fn create<D>(device: &D) -> Result<Self, DeviceError>
    where
        D: TimingDevice<Query = Q> + ?Sized,
    {
        let even = Stamps::create(device)?;
        let odd = Stamps::create(device)?;

        Ok(Self {
            stamps: Some([even, odd]),
            marks: [SlotMark::Empty; 2],
            duration: UNMEASURED,
        })
    }

    /// Whether the queries are still allocated.
    pub fn is_live(&self) -> bool {
        self.stamps.is_some()
    }

    /// Writes the start timestamp for `slot`.
    pub fn begin<C>(&mut self, ctx: &mut C, slot: Slot)
    where
        C: TimingContext<Query = Q> + ?Sized,
    {
        let Some(stamps) = &self.stamps else {
            return;
        };
        ctx.end(&stamps[slot.index()].start);
        self.marks[slot.index()] = SlotMark::Begun;
    }

    /// Writes the end timestamp for `slot`.
    ///
    /// Without a prior `begin` the command is still issued, but the slot is
    /// never read back.
    pub fn end<C>(&mut self, ctx: &mut C, slot: Slot)
    where
        C: TimingContext<Query = Q> + ?Sized,
    {
        let Some(stamps) = &self.stamps else {
            return;
        };
        ctx.end(&stamps[slot.index()].end);
        self.marks[slot.index()] = self.marks[slot.index()].ended();
    }

    /// Tries to read both timestamps of `slot` without blocking.
    ///
    /// Returns `true` when the cached duration was refreshed. An unavailable
    /// result leaves the previous duration in place.
    pub fn update<C>(&mut self, ctx: &mut C, slot: Slot, frequency: u64) -> bool
    where
        C: TimingContext<Query = Q> + ?Sized,
    {
        let Some(stamps) = &self.stamps else {
            return false;
        };
        if frequency == 0 || self.marks[slot.index()] != SlotMark::Ended {
            return false;
        }

        let stamps = &stamps[slot.index()];
        let Some(start) = poll(ctx, &stamps.start) else {
            return false;
        };
        let Some(end) = poll(ctx, &stamps.end) else {
            return false;
        };

        let Some(ticks) = end.checked_sub(start) else {
            log::trace!("end timestamp {end} precedes start {start}; keeping previous duration");
            return false;
        };

        self.duration = (ticks as f64 / frequency as f64) as f32;
        true
    }

    /// Last measured duration in seconds, or [`UNMEASURED`].
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Frees all four queries. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.stamps = None;
        self.marks = [SlotMark::Empty; 2];
    }
}

fn poll<C, Q>(ctx: &mut C, query: &Q) -> Option<u64>
where
    C: TimingContext<Query = Q> + ?Sized,
{
    match ctx.poll_timestamp(query) {
        Ok(ticks) => ticks,
        Err(err) => {
            log::trace!("timestamp readback failed: {err}");
            None
        }
    }
}
