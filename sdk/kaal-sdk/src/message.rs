//! Message tags
//!
//! Components exchange a label and up to [`MSG_MAX_LENGTH`] message
//! registers. Capabilities are never transferred between components, so
//! the helpers here only build and read label/count tags.

use sel4_platform::{MessageInfo, Word};

pub use sel4_platform::types::MSG_MAX_LENGTH;

/// Index of a channel in a component's capability ranges
pub type Channel = usize;

/// Tag carrying `label` and `count` message registers
pub const fn msginfo_new(label: Word, count: u16) -> MessageInfo {
    MessageInfo::new(label, 0, 0, count as Word)
}

pub const fn msginfo_label(info: MessageInfo) -> Word {
    info.label()
}

/// Number of message registers the tag carries
pub const fn msginfo_count(info: MessageInfo) -> Word {
    info.length()
}

/// Label-zero, zero-length reply
pub const fn empty() -> MessageInfo {
    msginfo_new(0, 0)
}
