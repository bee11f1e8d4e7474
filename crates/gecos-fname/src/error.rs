//! Error types for allocation, formatting and harness configuration.

use thiserror::Error;

/// Result type for gecos-fname operations.
pub type FnameResult<T> = Result<T, FnameError>;

/// Errors that can occur while allocating or formatting a display name.
#[derive(Debug, Error)]
pub enum FnameError {
    /// The underlying allocator returned no memory.
    #[error("out of memory: allocation of {requested} bytes failed")]
    AllocationFailure { requested: usize },

    /// The formatted name (plus NUL) does not fit the destination.
    #[error("capacity exceeded: {required} bytes required, destination holds {capacity}")]
    CapacityExceeded { required: usize, capacity: usize },

    /// Harness configuration is invalid or unreadable.
    #[error("config error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
