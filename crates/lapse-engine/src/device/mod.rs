//! GPU query device abstraction.
//!
//! This module is responsible for:
//! - the capability traits the timing engine is written against
//!   ([`TimingDevice`] allocates queries, [`TimingContext`] issues and polls them)
//! - the wgpu implementation of those traits
//! - headless adapter/device acquisition for tools that have no window

mod backend;
mod error;
mod headless;
mod query;

#[cfg(test)]
pub(crate) mod fake;

pub use backend::{required_features, WgpuQuery, WgpuTimingContext, WgpuTimingDevice};
pub use error::DeviceError;
pub use headless::{HeadlessGpu, HeadlessInit};
pub use query::{DisjointData, QueryKind, TimingContext, TimingDevice};
