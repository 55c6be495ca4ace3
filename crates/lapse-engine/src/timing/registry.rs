use std::fmt;

use super::QueryPair;

/// Stable index of a user timer.
///
/// Handles are handed out in creation order starting at 0 and are never
/// recycled; only a bulk clear of the registry invalidates them. The raw value
/// is always non-negative so it round-trips through the `i32` surface, where
/// `-1` means "no timer".
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TimerHandle(i32);

impl TimerHandle {
    /// Converts a raw id from the exported surface. Negative ids map to `None`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        (raw >= 0).then_some(Self(raw))
    }

    pub fn to_raw(self) -> i32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer #{}", self.0)
    }
}

/// Append-only arena of user timers.
pub struct TimerRegistry<Q> {
    timers: Vec<QueryPair<Q>>,
}

impl<Q> Default for TimerRegistry<Q> {
    fn default() -> Self {
        Self { timers: Vec::new() }
    }
}

impl<Q> TimerRegistry<Q> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Handle the next `push` will return, or `None` once ids are exhausted.
    pub fn next_handle(&self) -> Option<TimerHandle> {
        i32::try_from(self.timers.len()).ok().map(TimerHandle)
    }

    /// Appends a timer. Returns `None` (dropping the pair) once ids are exhausted.
    pub fn push(&mut self, timer: QueryPair<Q>) -> Option<TimerHandle> {
        let handle = self.next_handle()?;
        self.timers.push(timer);
        Some(handle)
    }

    pub fn get(&self, handle: TimerHandle) -> Option<&QueryPair<Q>> {
        self.timers.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: TimerHandle) -> Option<&mut QueryPair<Q>> {
        self.timers.get_mut(handle.index())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut QueryPair<Q>> {
        self.timers.iter_mut()
    }

    /// Releases every timer and forgets all handles. Numbering restarts at 0.
    pub fn clear(&mut self) {
        for timer in &mut self.timers {
            timer.release();
        }
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::FakeDevice;

    #[test]
    fn negative_raw_ids_are_not_handles() {
        assert_eq!(TimerHandle::from_raw(-1), None);
        assert_eq!(TimerHandle::from_raw(i32::MIN), None);
        assert_eq!(TimerHandle::from_raw(3).map(TimerHandle::index), Some(3));
    }

    #[test]
    fn handles_follow_insertion_order() {
        let device = FakeDevice::new();
        let mut registry = TimerRegistry::new();
        for expected in 0..3 {
            let handle = registry.push(QueryPair::create(&device).unwrap()).unwrap();
            assert_eq!(handle.to_raw(), expected);
        }
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn lookup_out_of_range_is_none() {
        let device = FakeDevice::new();
        let mut registry = TimerRegistry::new();
        registry.push(QueryPair::create(&device).unwrap());
        let past_end = TimerHandle::from_raw(1).unwrap();
        assert!(registry.get(past_end).is_none());
        assert!(registry.get_mut(past_end).is_none());
    }

    #[test]
    fn clear_releases_and_restarts_numbering() {
        let device = FakeDevice::new();
        let mut registry = TimerRegistry::new();
        registry.push(QueryPair::create(&device).unwrap());
        registry.push(QueryPair::create(&device).unwrap());
        assert_eq!(device.live_queries(), 8);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(device.live_queries(), 0);
        assert_eq!(registry.next_handle().map(TimerHandle::to_raw), Some(0));
    }
}
