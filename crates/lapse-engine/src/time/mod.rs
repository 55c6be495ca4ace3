//! Time subsystem.
//!
//! Provides the clock abstraction and the bounded polling wait used for GPU
//! readback. Intended usage:
//! - [`SystemClock`] in production
//! - [`ManualClock`] in tests, so timeouts elapse without sleeping

mod clock;
mod wait;

pub use clock::{Clock, ManualClock, SystemClock};
pub use wait::{BoundedWait, WaitOutcome};
