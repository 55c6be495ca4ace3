use anyhow::{Context, Result};

use crate::device::TimingDevice;
use crate::time::{Clock, SystemClock};

use super::{
    DisjointStatus, DisjointTracker, QueryPair, Slot, TimerHandle, TimerRegistry, TimingConfig,
    TimingError, FRAME_NOT_READY, UNMEASURED,
};

/// Completed frames required before a slot holds data from its own frame.
///
/// With two slots, slot `s` at frame `n` is the same physical queries as at
/// frame `n - 2`.
pub const MIN_COMPLETED_FRAMES: u64 = 2;

/// Lifecycle of a [`TimingEngine`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EngineState {
    Uninitialized,
    /// Initialized, between frames.
    Ready,
    /// Between `begin_frame` and `end_frame`.
    Recording,
    /// Torn down; behaves exactly like `Uninitialized`.
    Released,
}

/// Device-bound resources, present only while the engine is initialized.
struct Bound<D: TimingDevice> {
    device: D,
    context: D::Context,
    disjoint: DisjointTracker<D::Query>,
    frame_timer: QueryPair<D::Query>,
}

/// Double-buffered GPU timing engine.
///
/// All calls come from the render thread in per-frame order: `begin_frame`,
/// any number of `begin_timer`/`end_timer` pairs, `end_frame`. Misuse never
/// panics: calls on an engine that is not ready, extra frame calls and
/// unknown timer handles are ignored, and lookups return sentinels.
///
/// The frame timer brackets the whole frame and lives as long as the device
/// binding. User timers live in a separate registry that can be cleared on its
/// own without touching the frame bracket.
pub struct TimingEngine<D: TimingDevice, C: Clock = SystemClock> {
    config: TimingConfig,
    clock: C,
    state: EngineState,
    bound: Option<Bound<D>>,
    timers: TimerRegistry<D::Query>,
    slot: Slot,
    frame_counter: u64,
    last_readback: Option<DisjointStatus>,
}

impl<D: TimingDevice> TimingEngine<D> {
    /// Creates an uninitialized engine using the wall clock.
    pub fn new(config: TimingConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<D: TimingDevice, C: Clock> TimingEngine<D, C> {
    /// Creates an uninitialized engine with a custom clock for the readback wait.
    pub fn with_clock(config: TimingConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            state: EngineState::Uninitialized,
            bound: None,
            timers: TimerRegistry::new(),
            slot: Slot::default(),
            frame_counter: 0,
            last_readback: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// `true` in `Ready` and `Recording`.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, EngineState::Ready | EngineState::Recording)
    }

    /// Slot the next (or current) frame records into.
    pub fn current_slot(&self) -> Slot {
        self.slot
    }

    /// Frames completed since initialization or the last bulk timer release.
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Disjoint verdict of the most recent readback, if one happened.
    pub fn last_readback(&self) -> Option<DisjointStatus> {
        self.last_readback
    }

    /// Binds the engine to `device` and allocates the disjoint tracker and the
    /// frame timer.
    ///
    /// On failure nothing stays allocated and the engine remains not ready.
    pub fn initialize(&mut self, device: D) -> Result<()> {
        if self.is_ready() {
            return Err(TimingError::AlreadyInitialized.into());
        }

        let context = device.immediate_context();
        let disjoint = DisjointTracker::create(&device).context("failed to create disjoint queries")?;
        let frame_timer = QueryPair::create(&device).context("failed to create frame timer queries")?;

        self.bound = Some(Bound {
            device,
            context,
            disjoint,
            frame_timer,
        });
        self.timers.clear();
        self.slot = Slot::default();
        self.frame_counter = 0;
        self.last_readback = None;
        self.state = EngineState::Ready;

        log::debug!("GPU timing initialized");
        Ok(())
    }

    /// Opens the frame bracket in the current slot.
    pub fn begin_frame(&mut self) {
        if self.state != EngineState::Ready {
            return;
        }
        let Some(bound) = self.bound.as_mut() else {
            return;
        };

        bound.disjoint.begin(&mut bound.context, self.slot);
        bound.frame_timer.begin(&mut bound.context, self.slot);
        self.state = EngineState::Recording;
    }

    /// Writes the start timestamp of a user timer. Unknown handles are ignored.
    pub fn begin_timer(&mut self, handle: TimerHandle) {
        if !self.is_ready() {
            return;
        }
        let Some(bound) = self.bound.as_mut() else {
            return;
        };
        let Some(timer) = self.timers.get_mut(handle) else {
            log::trace!("begin on unknown {handle}");
            return;
        };

        timer.begin(&mut bound.context, self.slot);
    }

    /// Writes the end timestamp of a user timer. Unknown handles are ignored.
    pub fn end_timer(&mut self, handle: TimerHandle) {
        if !self.is_ready() {
            return;
        }
        let Some(bound) = self.bound.as_mut() else {
            return;
        };
        let Some(timer) = self.timers.get_mut(handle) else {
            log::trace!("end on unknown {handle}");
            return;
        };

        timer.end(&mut bound.context, self.slot);
    }

    /// Closes the frame bracket, flips the slot and reads back the frame.
    ///
    /// The readback only happens once [`MIN_COMPLETED_FRAMES`] frames have
    /// completed. It waits (bounded) for the frame's disjoint query and, when
    /// the clock was stable, refreshes the frame timer and every user timer
    /// from the slot just closed. Any other verdict leaves all durations as
    /// they were.
    pub fn end_frame(&mut self) {
        if self.state != EngineState::Recording {
            return;
        }
        let Some(bound) = self.bound.as_mut() else {
            return;
        };

        let recorded = self.slot;
        bound.frame_timer.end(&mut bound.context, recorded);
        bound.disjoint.end(&mut bound.context, recorded);

        self.frame_counter = self.frame_counter.saturating_add(1);
        self.slot = recorded.other();
        self.state = EngineState::Ready;

        if self.frame_counter < MIN_COMPLETED_FRAMES {
            return;
        }

        let wait = self.config.readback_wait();
        let status = bound
            .disjoint
            .update(&mut bound.context, recorded, &wait, &self.clock);
        self.last_readback = Some(status);

        match status {
            DisjointStatus::Stable { frequency } => {
                bound.frame_timer.update(&mut bound.context, recorded, frequency);
                for timer in self.timers.iter_mut() {
                    timer.update(&mut bound.context, recorded, frequency);
                }
            }
            DisjointStatus::Disjoint => {
                log::debug!(
                    "frame {} was disjoint; keeping previous durations",
                    self.frame_counter
                );
            }
            DisjointStatus::TimedOut | DisjointStatus::Failed => {}
        }
    }

    /// Allocates a new user timer and returns its handle.
    pub fn create_timer(&mut self) -> Result<TimerHandle, TimingError> {
        if !self.is_ready() {
            return Err(TimingError::NotReady);
        }
        let Some(bound) = self.bound.as_ref() else {
            return Err(TimingError::NotReady);
        };
        if self.timers.next_handle().is_none() {
            return Err(TimingError::RegistryFull);
        }

        let timer = QueryPair::create(&bound.device).map_err(|err| {
            log::warn!("failed to create GPU timer: {err}");
            TimingError::from(err)
        })?;
        let handle = self.timers.push(timer).ok_or(TimingError::RegistryFull)?;

        log::debug!("created {handle}");
        Ok(handle)
    }

    /// Last measured duration of a user timer in seconds.
    ///
    /// Returns [`UNMEASURED`] for unknown handles, timers without a readback
    /// yet, and while the engine is not ready.
    pub fn timer_duration(&self, handle: TimerHandle) -> f32 {
        if !self.is_ready() {
            return UNMEASURED;
        }
        self.timers
            .get(handle)
            .map_or(UNMEASURED, |timer| timer.duration())
    }

    /// Last measured whole-frame duration in seconds.
    ///
    /// Returns [`FRAME_NOT_READY`] while the engine is not ready and
    /// [`UNMEASURED`] before the first successful readback.
    pub fn frame_duration(&self) -> f32 {
        if !self.is_ready() {
            return FRAME_NOT_READY;
        }
        self.bound
            .as_ref()
            .map_or(FRAME_NOT_READY, |bound| bound.frame_timer.duration())
    }

    /// Ends the open frame, then releases every user timer.
    ///
    /// Handles restart at 0 and the readback delay starts over. The frame
    /// timer and the disjoint tracker are kept.
    pub fn release_all_timers(&mut self) {
        self.end_frame();

        if !self.timers.is_empty() {
            log::debug!("releasing {} GPU timers", self.timers.len());
        }
        self.timers.clear();
        self.frame_counter = 0;
    }

    /// Tears everything down: user timers, frame timer, disjoint tracker,
    /// then the context and device. Safe to call in any state, repeatedly.
    pub fn release(&mut self) {
        self.release_all_timers();

        if let Some(bound) = self.bound.take() {
            let Bound {
                device,
                context,
                mut disjoint,
                mut frame_timer,
            } = bound;

            frame_timer.release();
            disjoint.release();
            drop(context);
            drop(device);

            log::debug!("GPU timing released");
        }

        self.slot = Slot::default();
        self.last_readback = None;
        self.state = EngineState::Released;
    }
}

impl<D: TimingDevice, C: Clock> Drop for TimingEngine<D, C> {
    fn drop(&mut self) {
        self.release();
    }
}
