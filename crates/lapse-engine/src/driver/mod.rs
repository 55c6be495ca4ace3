//! Host-facing surface.
//!
//! A host render loop rarely calls the engine directly. It forwards device
//! lifecycle events and render-thread events to a [`TimingDriver`], which owns
//! one engine instance and flattens its API to integer ids and float seconds.
//! [`FrameSession`] sits on the script side of that surface and defers timer
//! creation to frame boundaries.

mod adapter;
mod events;
mod session;

pub use adapter::TimingDriver;
pub use events::{DeviceEvent, RenderEvent};
pub use session::{FrameSession, SessionTimer};
