//! x86_64 page-fault error code decoding

use bitflags::bitflags;
use sel4_platform::Word;

bitflags! {
    /// Page-fault error code pushed by the CPU
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFaultFlags: Word {
        /// Protection violation (clear: page not present)
        const PRESENT = 1 << 0;
        const WRITE = 1 << 1;
        /// Access from ring 3
        const USER = 1 << 2;
        const RESERVED_WRITE = 1 << 3;
        const INSTRUCTION_FETCH = 1 << 4;
    }
}

/// Description of a page-fault error code.
///
/// Only the user-mode combinations seL4 can deliver are named.
pub fn page_fault_description(fsr: Word) -> &'static str {
    match fsr {
        4 => "read to a non-present page at ring 3",
        5 => "page-protection violation from read at ring 3",
        6 => "write to a non-present page at ring 3",
        7 => "page-protection violation from write at ring 3",
        // seL4 does not set NX, so this is not seen in practice.
        16 => "instruction fetch from non-executable page",
        _ => "invalid FSR or unimplemented decoding",
    }
}
