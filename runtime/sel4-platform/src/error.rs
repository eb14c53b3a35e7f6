//! seL4 error codes
//!
//! A non-zero label on the reply to an object invocation is one of these.

use crate::Word;
use thiserror::Error;

/// Error returned by the kernel for an object invocation
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u64)]
pub enum KernelError {
    #[error("seL4_InvalidArgument")]
    InvalidArgument = 1,

    #[error("seL4_InvalidCapability")]
    InvalidCapability = 2,

    #[error("seL4_IllegalOperation")]
    IllegalOperation = 3,

    #[error("seL4_RangeError")]
    RangeError = 4,

    #[error("seL4_AlignmentError")]
    AlignmentError = 5,

    #[error("seL4_FailedLookup")]
    FailedLookup = 6,

    #[error("seL4_TruncatedMessage")]
    TruncatedMessage = 7,

    #[error("seL4_DeleteFirst")]
    DeleteFirst = 8,

    #[error("seL4_RevokeFirst")]
    RevokeFirst = 9,

    #[error("seL4_NotEnoughMemory")]
    NotEnoughMemory = 10,

    /// A label outside the known range
    #[error("<unknown seL4 error>")]
    Unknown = Word::MAX,
}

pub type Result<T> = core::result::Result<T, KernelError>;

impl KernelError {
    /// Decode a raw error word. `0` (seL4_NoError) is not an error.
    pub const fn from_word(word: Word) -> Option<Self> {
        Some(match word {
            0 => return None,
            1 => Self::InvalidArgument,
            2 => Self::InvalidCapability,
            3 => Self::IllegalOperation,
            4 => Self::RangeError,
            5 => Self::AlignmentError,
            6 => Self::FailedLookup,
            7 => Self::TruncatedMessage,
            8 => Self::DeleteFirst,
            9 => Self::RevokeFirst,
            10 => Self::NotEnoughMemory,
            _ => Self::Unknown,
        })
    }

    /// Turn a raw error word into a `Result`
    pub const fn check(word: Word) -> Result<()> {
        match Self::from_word(word) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Numeric code
    pub const fn code(self) -> Word {
        self as Word
    }
}
