use super::DeviceError;

/// Kind of hardware query a timing device can allocate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum QueryKind {
    /// Samples the GPU clock when the command reaches the pipeline.
    ///
    /// Timestamp queries are instantaneous: they are only ever ended, never begun.
    Timestamp,
    /// Brackets an interval and reports whether the GPU clock stayed stable
    /// over it, together with the tick frequency.
    Disjoint,
}

impl QueryKind {
    /// Timestamps a backend writes per query of this kind: one sample for a
    /// timestamp, a begin/end pair for a disjoint bracket.
    pub fn sample_count(self) -> u32 {
        match self {
            QueryKind::Timestamp => 1,
            QueryKind::Disjoint => 2,
        }
    }
}

/// Result of a completed disjoint query.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DisjointData {
    /// Clock ticks per second over the bracketed interval.
    pub frequency: u64,
    /// Set when the clock changed during the interval. `frequency` is then meaningless.
    pub disjoint: bool,
}

/// Allocates query objects.
///
/// Query handles are owned values. Dropping a handle frees the underlying GPU
/// object, so a handle must never outlive the device that created it.
pub trait TimingDevice {
    type Query;
    type Context: TimingContext<Query = Self::Query>;

    /// Whether this device exposes both timestamp and disjoint queries.
    ///
    /// Drivers leave the engine uninitialized for devices that return `false`.
    fn supports_timing(&self) -> bool;

    /// Allocates one query object.
    fn create_query(&self, kind: QueryKind) -> Result<Self::Query, DeviceError>;

    /// Returns the context that records commands into the device's queue.
    fn immediate_context(&self) -> Self::Context;
}

/// Issues and polls queries on the command stream.
///
/// Every call is non-blocking. `poll_*` return `Ok(None)` while the GPU has not
/// produced the result yet; that is the common case, not a failure.
pub trait TimingContext {
    type Query;

    /// Opens an interval query (disjoint).
    fn begin(&mut self, query: &Self::Query);

    /// Closes an interval query or writes a timestamp.
    fn end(&mut self, query: &Self::Query);

    /// Polls a timestamp query for its tick value.
    fn poll_timestamp(&mut self, query: &Self::Query) -> Result<Option<u64>, DeviceError>;

    /// Polls a disjoint query.
    fn poll_disjoint(&mut self, query: &Self::Query) -> Result<Option<DisjointData>, DeviceError>;
}
