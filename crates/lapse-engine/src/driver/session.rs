use std::collections::VecDeque;

use crate::device::TimingDevice;
use crate::time::Clock;
use crate::timing::UNMEASURED;

use super::{RenderEvent, TimingDriver};

/// Script-side id of a timer owned by a [`FrameSession`].
///
/// Valid for the session's lifetime. It maps to a driver id once the timer has
/// been created at a frame boundary.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SessionTimer(usize);

#[derive(Debug)]
struct Entry {
    /// Driver id, `-1` until created (or if creation failed).
    id: i32,
    open: bool,
}

impl Entry {
    fn is_created(&self) -> bool {
        self.id >= 0
    }
}

/// Script-side view of GPU timing.
///
/// Timer creation requests are buffered and applied in [`late_update`], between
/// the end of one frame and the beginning of the next, so no query is
/// allocated while a frame is being recorded. Begin/end calls are guarded: a
/// second `begin` without `end`, an `end` without `begin`, and calls on timers
/// that do not exist on the driver yet are dropped before they reach it.
///
/// [`late_update`]: FrameSession::late_update
#[derive(Debug, Default)]
pub struct FrameSession {
    entries: Vec<Entry>,
    pending: VecDeque<SessionTimer>,
}

impl FrameSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a new timer. It becomes usable after the next `late_update`.
    pub fn request_timer(&mut self) -> SessionTimer {
        let timer = SessionTimer(self.entries.len());
        self.entries.push(Entry { id: -1, open: false });
        self.pending.push_back(timer);
        timer
    }

    /// Whether the driver accepted the timer.
    pub fn is_created(&self, timer: SessionTimer) -> bool {
        self.entries.get(timer.0).is_some_and(Entry::is_created)
    }

    pub fn begin<D: TimingDevice, C: Clock>(
        &mut self,
        driver: &mut TimingDriver<D, C>,
        timer: SessionTimer,
    ) {
        let Some(entry) = self.entries.get_mut(timer.0) else {
            return;
        };
        if !entry.is_created() || entry.open {
            return;
        }
        entry.open = true;
        driver.on_render_event(RenderEvent::BeginTimer, entry.id);
    }

    pub fn end<D: TimingDevice, C: Clock>(
        &mut self,
        driver: &mut TimingDriver<D, C>,
        timer: SessionTimer,
    ) {
        let Some(entry) = self.entries.get_mut(timer.0) else {
            return;
        };
        if !entry.is_created() || !entry.open {
            return;
        }
        entry.open = false;
        driver.on_render_event(RenderEvent::EndTimer, entry.id);
    }

    /// Seconds measured by `timer`, or `-1.0`.
    pub fn duration<D: TimingDevice, C: Clock>(
        &self,
        driver: &TimingDriver<D, C>,
        timer: SessionTimer,
    ) -> f32 {
        self.entries
            .get(timer.0)
            .map_or(UNMEASURED, |entry| driver.timer_duration(entry.id))
    }

    pub fn frame_duration<D: TimingDevice, C: Clock>(&self, driver: &TimingDriver<D, C>) -> f32 {
        driver.frame_duration()
    }

    /// Frame boundary: closes the frame, creates queued timers, opens the next frame.
    pub fn late_update<D: TimingDevice, C: Clock>(&mut self, driver: &mut TimingDriver<D, C>) {
        driver.on_render_event(RenderEvent::EndFrame, 0);

        while let Some(timer) = self.pending.pop_front() {
            let id = driver.create_timer();
            if id < 0 {
                log::debug!("session timer {} was not created", timer.0);
            }
            if let Some(entry) = self.entries.get_mut(timer.0) {
                entry.id = id;
                entry.open = false;
            }
        }

        driver.on_render_event(RenderEvent::BeginFrame, 0);
    }

    /// Releases every timer on the driver. Existing session ids stay valid but
    /// measure nothing from now on.
    pub fn shutdown<D: TimingDevice, C: Clock>(&mut self, driver: &mut TimingDriver<D, C>) {
        driver.release_timers();
        for entry in &mut self.entries {
            entry.id = -1;
            entry.open = false;
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::device::fake::FakeDevice;
    use crate::driver::DeviceEvent;
    use crate::time::ManualClock;
    use crate::timing::TimingConfig;

    type Driver = TimingDriver<FakeDevice, Rc<ManualClock>>;

    fn ready() -> (Driver, FakeDevice) {
        let config = TimingConfig {
            readback_timeout: Duration::from_millis(5),
            poll_interval: Duration::from_millis(1),
        };
        let mut driver = Driver::with_clock(config, Rc::new(ManualClock::new()));
        let device = FakeDevice::new();
        device.set_frequency(1_000);
        driver.on_device_event(DeviceEvent::Initialize(device.clone()));
        (driver, device)
    }

    #[test]
    fn timers_are_created_at_the_frame_boundary() {
        let (mut driver, _) = ready();
        let mut session = FrameSession::new();
        let timer = session.request_timer();
        assert!(!session.is_created(timer));
        assert_eq!(driver.engine().timer_count(), 0);

        session.late_update(&mut driver);
        assert!(session.is_created(timer));
        assert_eq!(driver.engine().timer_count(), 1);
    }

    #[test]
    fn begin_before_creation_is_dropped() {
        let (mut driver, device) = ready();
        let mut session = FrameSession::new();
        let timer = session.request_timer();

        session.begin(&mut driver, timer);
        session.end(&mut driver, timer);
        assert!(device.commands().is_empty());
    }

    #[test]
    fn double_begin_and_stray_end_are_dropped() {
        let (mut driver, device) = ready();
        let mut session = FrameSession::new();
        let timer = session.request_timer();
        session.late_update(&mut driver);
        let base = device.commands().len();

        session.end(&mut driver, timer);
        assert_eq!(device.commands().len(), base);

        session.begin(&mut driver, timer);
        session.begin(&mut driver, timer);
        assert_eq!(device.commands().len(), base + 1);

        session.end(&mut driver, timer);
        session.end(&mut driver, timer);
        assert_eq!(device.commands().len(), base + 2);
    }

    #[test]
    fn measures_across_frames() {
        let (mut driver, device) = ready();
        let mut session = FrameSession::new();
        let timer = session.request_timer();
        session.late_update(&mut driver);

        for _ in 0..3 {
            session.begin(&mut driver, timer);
            device.advance(500);
            session.end(&mut driver, timer);
            session.late_update(&mut driver);
        }

        assert_eq!(session.duration(&driver, timer), 0.5);
        assert_eq!(session.frame_duration(&driver), 0.5);
    }

    #[test]
    fn shutdown_invalidates_session_timers() {
        let (mut driver, _) = ready();
        let mut session = FrameSession::new();
        let timer = session.request_timer();
        session.late_update(&mut driver);

        session.shutdown(&mut driver);
        assert!(!session.is_created(timer));
        assert_eq!(session.duration(&driver, timer), UNMEASURED);
        assert_eq!(driver.engine().timer_count(), 0);
    }

    #[test]
    fn unknown_session_timer_reads_unmeasured() {
        let (driver, _) = ready();
        let session = FrameSession::new();
        assert_eq!(session.duration(&driver, SessionTimer(4)), UNMEASURED);
    }
}
