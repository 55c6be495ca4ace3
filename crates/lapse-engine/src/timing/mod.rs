//! Double-buffered GPU timing.
//!
//! Every query exists twice, once per [`Slot`]. While one slot records the
//! current frame, the other holds the previous frame's queries, so the GPU is
//! never asked for a result it is still producing. A frame's timestamps are
//! only trusted after its disjoint query confirms the clock was stable.

mod config;
mod disjoint;
mod engine;
mod error;
mod pair;
mod registry;
mod slot;

pub use config::TimingConfig;
pub use disjoint::{DisjointStatus, DisjointTracker};
pub use engine::{EngineState, TimingEngine, MIN_COMPLETED_FRAMES};
pub use error::TimingError;
pub use pair::{QueryPair, FRAME_NOT_READY, UNMEASURED};
pub use registry::{TimerHandle, TimerRegistry};
pub use slot::Slot;
