//! Monitor errors
//!
//! [`MonitorError`] values returned from [`crate::Monitor::step`] are fatal:
//! the monitor is the only place faults are mediated, so when it cannot
//! attribute or inspect a fault the system stops.

use kaal_bootstrap::BootError;
use sel4_platform::{Badge, CPtr, KernelError};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MonitorError {
    #[error("unknown/invalid badge {badge:#x}")]
    UnknownBadge { badge: Badge },

    #[error("error reading registers of tcb {tcb:#x}: {error}")]
    RegisterRead { tcb: CPtr, error: KernelError },

    #[error("component id {id} exceeds the component table")]
    TooManyComponents { id: usize },

    #[error("component name of {len} bytes is empty or too long")]
    InvalidName { len: usize },

    #[error(transparent)]
    Boot(#[from] BootError),
}

/// Failure loading a system image
#[cfg(feature = "std")]
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("malformed system image: {0}")]
    Decode(#[from] bincode::Error),

    #[error("system image lists {count} components, at most {max} are supported")]
    TooManyComponents { count: usize, max: usize },

    #[error(transparent)]
    Capacity(#[from] kaal_bootstrap::CapacityError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),
}
