//! Bootstrap errors
//!
//! Every variant is fatal: the caller logs it and halts. Nothing here is
//! retried or rolled back.

use sel4_platform::{KernelError, Word};
use thiserror::Error;

/// Field of an untyped region that disagreed with the expected layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntypedField {
    Paddr,
    SizeBits,
    IsDevice,
}

impl UntypedField {
    pub const fn name(self) -> &'static str {
        match self {
            UntypedField::Paddr => "paddr",
            UntypedField::SizeBits => "size_bits",
            UntypedField::IsDevice => "is_device",
        }
    }
}

impl core::fmt::Display for UntypedField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kernel-reported untyped memory does not match the build-time layout
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BootMismatch {
    #[error("untyped cap range mismatch: expected {expected} caps, kernel reported {actual}")]
    SlotRange { expected: usize, actual: usize },

    #[error("untyped count mismatch: expected {expected}, kernel reported {actual}")]
    Count { expected: usize, actual: usize },

    #[error("untyped {index} mismatch on {field}: expected {expected:#x}, kernel reported {actual:#x}")]
    Region {
        index: usize,
        field: UntypedField,
        expected: Word,
        actual: Word,
    },
}

/// Failure while decoding or executing an invocation stream
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReplayError {
    #[error("invocation {index}: stream truncated at word {offset} (record needs {needed} more words, {available} left)")]
    Truncated {
        index: usize,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("invocation {index}: message length {length} exceeds the IPC buffer")]
    MessageTooLong { index: usize, length: usize },

    #[error("invocation {index} (iteration {iteration}) failed: {error} ({code})", code = .error.code())]
    Invocation {
        index: usize,
        iteration: usize,
        error: KernelError,
    },
}

/// Stream does not fit the fixed bootstrap capacity
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("bootstrap stream needs {needed} words, capacity is {capacity}")]
pub struct CapacityError {
    pub needed: usize,
    pub capacity: usize,
}

/// Invocation the encoder cannot represent
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{count} extra caps, at most {max} fit a message")]
    TooManyCaps { count: usize, max: usize },

    #[error("{count} message registers, at most {max} fit a message")]
    TooManyRegisters { count: usize, max: usize },

    #[error("label {0:#x} does not fit the 32-bit tag")]
    LabelTooWide(Word),

    #[error("iteration count {0} out of range")]
    Iterations(usize),

    #[error("stride has {actual} entries, invocation has {expected}")]
    StrideShape { expected: usize, actual: usize },
}

/// Failure of the two-phase boot pipeline
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    #[error("untyped reconciliation failed: {0}")]
    Mismatch(#[from] BootMismatch),

    #[error("bootstrap phase: {0}")]
    Bootstrap(ReplayError),

    #[error("system phase: {0}")]
    System(ReplayError),

    #[error("system invocation stream unavailable")]
    SystemStreamUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_invocation_error_report() {
        let err = ReplayError::Invocation {
            index: 4,
            iteration: 2,
            error: KernelError::NotEnoughMemory,
        };
        assert_eq!(
            err.to_string(),
            "invocation 4 (iteration 2) failed: seL4_NotEnoughMemory (10)"
        );
    }

    #[test]
    fn test_region_mismatch_report() {
        let err = BootMismatch::Region {
            index: 1,
            field: UntypedField::SizeBits,
            expected: 21,
            actual: 20,
        };
        assert_eq!(
            err.to_string(),
            "untyped 1 mismatch on size_bits: expected 0x15, kernel reported 0x14"
        );
    }
}
