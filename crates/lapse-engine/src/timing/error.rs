use std::fmt;

use crate::device::DeviceError;

/// Failure of a timing engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimingError {
    /// The engine is uninitialized or was released.
    NotReady,
    /// `initialize` was called on an engine that is already running.
    AlreadyInitialized,
    /// No more timer handles can be represented.
    RegistryFull,
    /// The device refused to allocate queries.
    Device(DeviceError),
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingError::NotReady => write!(f, "GPU timing is not initialized"),
            TimingError::AlreadyInitialized => write!(f, "GPU timing is already initialized"),
            TimingError::RegistryFull => write!(f, "timer registry is full"),
            TimingError::Device(err) => write!(f, "GPU timing device error: {err}"),
        }
    }
}

impl std::error::Error for TimingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimingError::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DeviceError> for TimingError {
    fn from(err: DeviceError) -> Self {
        TimingError::Device(err)
    }
}
