use std::cell::RefCell;
use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};

use super::{DeviceError, DisjointData, QueryKind, TimingContext, TimingDevice};

/// Size of every resolve/readback buffer: room for two resolved timestamps.
const QUERY_BYTES: wgpu::BufferAddress = std::mem::size_of::<QueryTicks>() as wgpu::BufferAddress;

/// Features a wgpu device must expose for GPU timing.
pub fn required_features() -> wgpu::Features {
    wgpu::Features::TIMESTAMP_QUERY | wgpu::Features::TIMESTAMP_QUERY_INSIDE_ENCODERS
}

/// Raw ticks as written by `resolve_query_set`.
///
/// Timestamp queries only fill `first`. Disjoint queries bracket an interval:
/// `first` is written on begin and `second` on end.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
struct QueryTicks {
    first: u64,
    second: u64,
}

enum Readback {
    /// Nothing written since creation or since the last begin.
    Idle,
    /// Resolve + copy submitted; the readback buffer is not mapped yet.
    Submitted,
    /// `map_async` issued; the callback reports through the receiver.
    Mapping(mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>),
    /// Result copied out and the buffer unmapped again.
    Resolved(QueryTicks),
}

/// One query object: a query set plus its resolve and readback buffers.
///
/// Dropping the handle drops the wgpu objects.
pub struct WgpuQuery {
    kind: QueryKind,
    set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    state: RefCell<Readback>,
}

impl WgpuQuery {
    /// Returns the readback buffer to a writable state before reuse.
    fn rearm(&self) {
        let mut state = self.state.borrow_mut();
        // Unmapping aborts a map that is still pending.
        if matches!(*state, Readback::Mapping(_)) {
            self.readback.unmap();
        }
        *state = Readback::Idle;
    }
}

/// Timing device over a wgpu device/queue pair.
///
/// Timestamps are written with `CommandEncoder::write_timestamp`, so the device
/// must have been created with [`required_features`]. wgpu has no native
/// disjoint query; it is emulated by bracketing the frame with two timestamps
/// and using the queue's timestamp period as the frequency.
#[derive(Clone)]
pub struct WgpuTimingDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuTimingDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl TimingDevice for WgpuTimingDevice {
    type Query = WgpuQuery;
    type Context = WgpuTimingContext;

    fn supports_timing(&self) -> bool {
        self.device.features().contains(required_features())
    }

    fn create_query(&self, kind: QueryKind) -> Result<WgpuQuery, DeviceError> {
        if !self.supports_timing() {
            return Err(DeviceError::Unsupported);
        }

        let label = match kind {
            QueryKind::Timestamp => "lapse timestamp query",
            QueryKind::Disjoint => "lapse disjoint query",
        };
        let set = self.device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some(label),
            ty: wgpu::QueryType::Timestamp,
            count: kind.sample_count(),
        });
        let resolve = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lapse query resolve"),
            size: QUERY_BYTES,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lapse query readback"),
            size: QUERY_BYTES,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(WgpuQuery {
            kind,
            set,
            resolve,
            readback,
            state: RefCell::new(Readback::Idle),
        })
    }

    fn immediate_context(&self) -> WgpuTimingContext {
        let period_ns = self.queue.get_timestamp_period();
        let frequency = frequency_from_period(period_ns);
        log::debug!("wgpu timestamp period {period_ns} ns, {frequency} ticks/s");

        WgpuTimingContext {
            device: self.device.clone(),
            queue: self.queue.clone(),
            frequency,
        }
    }
}

/// Records query commands straight into the queue, one small submission each.
pub struct WgpuTimingContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    frequency: u64,
}

impl WgpuTimingContext {
    fn write(&self, query: &WgpuQuery, index: u32, resolve: bool) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lapse query encoder"),
            });
        encoder.write_timestamp(&query.set, index);
        if resolve {
            let count = query.kind.sample_count();
            encoder.resolve_query_set(&query.set, 0..count, &query.resolve, 0);
            encoder.copy_buffer_to_buffer(
                &query.resolve,
                0,
                &query.readback,
                0,
                u64::from(count) * 8,
            );
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn poll_ticks(&mut self, query: &WgpuQuery) -> Result<Option<QueryTicks>, DeviceError> {
        let mut state = query.state.borrow_mut();

        match &*state {
            Readback::Idle => return Ok(None),
            Readback::Resolved(ticks) => return Ok(Some(*ticks)),
            Readback::Submitted => {
                let (sender, receiver) = mpsc::channel();
                query
                    .readback
                    .slice(..)
                    .map_async(wgpu::MapMode::Read, move |result| {
                        // The receiver is gone when the query was re-armed or dropped.
                        let _ = sender.send(result);
                    });
                *state = Readback::Mapping(receiver);
            }
            Readback::Mapping(_) => {}
        }

        if let Err(err) = self.device.poll(wgpu::PollType::Poll) {
            return Err(DeviceError::Backend(err.to_string()));
        }

        let received = match &*state {
            Readback::Mapping(receiver) => receiver.try_recv(),
            _ => return Ok(None),
        };

        match received {
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => {
                *state = Readback::Idle;
                Err(DeviceError::Backend("readback mapping dropped".to_string()))
            }
            Ok(Err(err)) => {
                *state = Readback::Idle;
                Err(DeviceError::Backend(err.to_string()))
            }
            Ok(Ok(())) => {
                let ticks = {
                    let view = query.readback.slice(..).get_mapped_range();
                    decode_ticks(&view)
                };
                query.readback.unmap();
                *state = Readback::Resolved(ticks);
                Ok(Some(ticks))
            }
        }
    }
}

impl TimingContext for WgpuTimingContext {
    type Query = WgpuQuery;

    fn begin(&mut self, query: &WgpuQuery) {
        match query.kind {
            QueryKind::Disjoint => {
                query.rearm();
                self.write(query, 0, false);
            }
            // Timestamps have no begin.
            QueryKind::Timestamp => {}
        }
    }

    fn end(&mut self, query: &WgpuQuery) {
        let index = match query.kind {
            QueryKind::Timestamp => {
                query.rearm();
                0
            }
            QueryKind::Disjoint => 1,
        };
        self.write(query, index, true);
        *query.state.borrow_mut() = Readback::Submitted;
    }

    fn poll_timestamp(&mut self, query: &WgpuQuery) -> Result<Option<u64>, DeviceError> {
        Ok(self.poll_ticks(query)?.map(|ticks| ticks.first))
    }

    fn poll_disjoint(&mut self, query: &WgpuQuery) -> Result<Option<DisjointData>, DeviceError> {
        let frequency = self.frequency;
        Ok(self.poll_ticks(query)?.map(|ticks| disjoint_data(ticks, frequency)))
    }
}

/// Ticks per second for a timestamp period given in nanoseconds per tick.
///
/// A non-positive period means the queue cannot report one; the result is 0,
/// which every disjoint read turns into a disjoint verdict.
fn frequency_from_period(period_ns: f32) -> u64 {
    if period_ns > 0.0 {
        (1.0e9 / f64::from(period_ns)).round() as u64
    } else {
        0
    }
}

/// Reads the resolved ticks from the start of a mapped readback range.
fn decode_ticks(bytes: &[u8]) -> QueryTicks {
    bytemuck::pod_read_unaligned::<QueryTicks>(&bytes[..QUERY_BYTES as usize])
}

/// Verdict for an emulated disjoint bracket.
///
/// The interval is untrustworthy when the frequency is unknown or the end
/// tick precedes the begin tick.
fn disjoint_data(ticks: QueryTicks, frequency: u64) -> DisjointData {
    DisjointData {
        frequency,
        disjoint: frequency == 0 || ticks.second < ticks.first,
    }
}
