//! Dispatch errors
//!
//! None of these stop the dispatch loop. They are returned to the handler
//! that asked for something the loop cannot do.

use crate::message::Channel;
use sel4_platform::KernelError;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// Passivating while a caller waits for a reply would strand the caller
    #[error("cannot request passivation while a reply is owed")]
    ReplyOutstanding,

    #[error("passivation already requested")]
    PassivationPending,

    #[error("channel {channel} out of range (max {max})")]
    InvalidChannel { channel: Channel, max: usize },

    #[error("child {child} out of range (max {max})")]
    InvalidChild { child: usize, max: usize },

    #[error("component name of {len} bytes is empty or too long")]
    InvalidName { len: usize },

    #[error(transparent)]
    Kernel(#[from] KernelError),
}
