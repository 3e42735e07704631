//! Error types
//!
//! Configuration errors abort setup before the scheduler starts. Queue
//! errors are local to the caller and never abort a pass.

use core::fmt;

/// Invalid construction parameters or exhausted fixed-size storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Task period is zero
    InvalidPeriod,
    /// Task priority below [`MIN_PRIORITY`](crate::config::MIN_PRIORITY)
    InvalidPriority(u8),
    /// Queue capacity is zero
    InvalidCapacity,
    /// All task slots are in use
    TaskListFull,
    /// All share registry slots are in use
    RegistryFull,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPeriod => write!(f, "task period must be greater than zero"),
            ConfigError::InvalidPriority(p) => write!(
                f,
                "task priority {} is below the minimum of {}",
                p,
                crate::config::MIN_PRIORITY
            ),
            ConfigError::InvalidCapacity => write!(f, "queue capacity must be greater than zero"),
            ConfigError::TaskListFull => write!(f, "task list is full"),
            ConfigError::RegistryFull => write!(f, "share registry is full"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Recoverable queue access failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Write attempted on a full queue with overwrite disabled
    Full,
    /// Read attempted on an empty queue
    Empty,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full => write!(f, "queue full"),
            QueueError::Empty => write!(f, "queue empty"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for QueueError {}
