//! Basic kernel ABI types
//!
//! All KaaL targets are 64-bit, so a machine word is always `u64`.

/// Machine word
pub type Word = u64;

/// Capability pointer (index into a CSpace)
pub type CPtr = Word;

/// Badge attached to a received message by the kernel
pub type Badge = Word;

const LENGTH_BITS: u32 = 7;
const EXTRA_CAPS_BITS: u32 = 2;
const CAPS_UNWRAPPED_BITS: u32 = 3;

const LENGTH_SHIFT: u32 = 0;
const EXTRA_CAPS_SHIFT: u32 = LENGTH_SHIFT + LENGTH_BITS;
const CAPS_UNWRAPPED_SHIFT: u32 = EXTRA_CAPS_SHIFT + EXTRA_CAPS_BITS;
const LABEL_SHIFT: u32 = CAPS_UNWRAPPED_SHIFT + CAPS_UNWRAPPED_BITS;

/// Largest label that fits the tag
pub const MAX_LABEL: Word = (1 << (64 - LABEL_SHIFT)) - 1;

/// Maximum number of message registers a single message can carry
pub const MAX_LENGTH: Word = (1 << LENGTH_BITS) - 1;

/// Maximum number of extra capabilities a single message can carry
pub const MAX_EXTRA_CAPS: Word = (1 << EXTRA_CAPS_BITS) - 1;

/// Message registers in the IPC buffer (`seL4_MsgMaxLength`)
pub const MSG_MAX_LENGTH: usize = 120;

/// Packed seL4 message tag
///
/// Layout (low to high): `length:7 | extra_caps:2 | caps_unwrapped:3 | label:52`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct MessageInfo(Word);

impl MessageInfo {
    /// Pack a new tag. Fields wider than their slot are truncated.
    pub const fn new(label: Word, caps_unwrapped: Word, extra_caps: Word, length: Word) -> Self {
        Self(
            (label << LABEL_SHIFT)
                | ((caps_unwrapped & ((1 << CAPS_UNWRAPPED_BITS) - 1)) << CAPS_UNWRAPPED_SHIFT)
                | ((extra_caps & MAX_EXTRA_CAPS) << EXTRA_CAPS_SHIFT)
                | (length & MAX_LENGTH),
        )
    }

    /// Reinterpret a raw word as a tag
    pub const fn from_word(word: Word) -> Self {
        Self(word)
    }

    /// Raw word
    pub const fn into_word(self) -> Word {
        self.0
    }

    pub const fn label(self) -> Word {
        self.0 >> LABEL_SHIFT
    }

    pub const fn caps_unwrapped(self) -> Word {
        (self.0 >> CAPS_UNWRAPPED_SHIFT) & ((1 << CAPS_UNWRAPPED_BITS) - 1)
    }

    pub const fn extra_caps(self) -> Word {
        (self.0 >> EXTRA_CAPS_SHIFT) & MAX_EXTRA_CAPS
    }

    /// Number of message registers
    pub const fn length(self) -> Word {
        self.0 & MAX_LENGTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_info_packing() {
        let info = MessageInfo::new(21, 0, 1, 5);
        assert_eq!(info.into_word(), 21 << 12 | 1 << 7 | 5);
        assert_eq!(info.label(), 21);
        assert_eq!(info.extra_caps(), 1);
        assert_eq!(info.length(), 5);
        assert_eq!(info.caps_unwrapped(), 0);
    }

    #[test]
    fn test_message_info_truncates_fields() {
        let info = MessageInfo::new(1, 0, 7, 0x80);
        assert_eq!(info.extra_caps(), 3);
        assert_eq!(info.length(), 0);
        assert_eq!(info.label(), 1);
    }

    #[test]
    fn test_empty_message_info() {
        assert_eq!(MessageInfo::default().into_word(), 0);
        assert_eq!(MessageInfo::new(0, 0, 0, 0), MessageInfo::default());
    }
}
