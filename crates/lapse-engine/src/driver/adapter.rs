use crate::device::TimingDevice;
use crate::time::{Clock, SystemClock};
use crate::timing::{TimerHandle, TimingConfig, TimingEngine, UNMEASURED};

use super::{DeviceEvent, RenderEvent};

/// Owns a [`TimingEngine`] and exposes it the way a host plugin would.
///
/// Every call is best-effort instrumentation: nothing here fails loudly or
/// panics. While no supported device is bound, calls degrade to their
/// not-ready defaults (`-1` ids, `-1.0` timer durations, `0.0` frame duration).
pub struct TimingDriver<D: TimingDevice, C: Clock = SystemClock> {
    engine: TimingEngine<D, C>,
}

impl<D: TimingDevice> TimingDriver<D> {
    pub fn new(config: TimingConfig) -> Self {
        Self {
            engine: TimingEngine::new(config),
        }
    }
}

impl<D: TimingDevice, C: Clock> TimingDriver<D, C> {
    pub fn with_clock(config: TimingConfig, clock: C) -> Self {
        Self {
            engine: TimingEngine::with_clock(config, clock),
        }
    }

    pub fn engine(&self) -> &TimingEngine<D, C> {
        &self.engine
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_ready()
    }

    /// Handles a device lifecycle event.
    ///
    /// A new device always replaces the previous binding. Devices without
    /// timestamp and disjoint queries leave the engine not ready.
    pub fn on_device_event(&mut self, event: DeviceEvent<D>) {
        match event {
            DeviceEvent::Initialize(device) => {
                self.engine.release();

                if !device.supports_timing() {
                    log::warn!("device lacks timestamp/disjoint queries; GPU timing disabled");
                    return;
                }
                if let Err(err) = self.engine.initialize(device) {
                    log::warn!("GPU timing initialization failed: {err:#}");
                }
            }
            DeviceEvent::Shutdown => self.engine.release(),
        }
    }

    /// Handles a render-thread event. `event_id` is the timer id for timer events.
    pub fn on_render_event(&mut self, event: RenderEvent, event_id: i32) {
        if !self.engine.is_ready() {
            return;
        }

        match event {
            RenderEvent::BeginFrame => self.engine.begin_frame(),
            RenderEvent::EndFrame => self.engine.end_frame(),
            RenderEvent::BeginTimer => {
                if let Some(handle) = TimerHandle::from_raw(event_id) {
                    self.engine.begin_timer(handle);
                }
            }
            RenderEvent::EndTimer => {
                if let Some(handle) = TimerHandle::from_raw(event_id) {
                    self.engine.end_timer(handle);
                }
            }
        }
    }

    /// Creates a timer and returns its id, or `-1`.
    pub fn create_timer(&mut self) -> i32 {
        match self.engine.create_timer() {
            Ok(handle) => handle.to_raw(),
            Err(err) => {
                log::debug!("timer not created: {err}");
                -1
            }
        }
    }

    /// Seconds measured by timer `id`, or `-1.0`.
    pub fn timer_duration(&self, id: i32) -> f32 {
        TimerHandle::from_raw(id).map_or(UNMEASURED, |handle| self.engine.timer_duration(handle))
    }

    /// Seconds of the last measured frame, or `0.0` when not ready.
    pub fn frame_duration(&self) -> f32 {
        self.engine.frame_duration()
    }

    /// Drops every timer id. The frame measurement keeps running.
    pub fn release_timers(&mut self) {
        self.engine.release_all_timers();
    }
}
