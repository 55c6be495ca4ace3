//! Lapse engine crate.
//!
//! This crate owns the GPU timing pieces: the device abstraction, the
//! double-buffered timing engine and the driver surface that a host render
//! loop calls into.

pub mod device;
pub mod driver;
pub mod time;
pub mod timing;

pub mod logging;
