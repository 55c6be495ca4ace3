use std::fmt;

/// Failure reported by a timing device.
///
/// Allocation failures are expected and recoverable: the engine reports them
/// through its return values and the host may retry by reinitializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device lacks timestamp or disjoint query support.
    Unsupported,
    /// The device refused to allocate another query object.
    OutOfQueries,
    /// Backend-specific failure.
    Backend(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Unsupported => write!(f, "device does not support timestamp queries"),
            DeviceError::OutOfQueries => write!(f, "device refused to allocate a query"),
            DeviceError::Backend(msg) => write!(f, "backend error: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}
