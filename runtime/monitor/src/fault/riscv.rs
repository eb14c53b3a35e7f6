//! RISC-V fault cause decoding
//!
//! The FSR of a VM fault is `scause`.

use sel4_platform::Word;

/// Description of an `scause` value
pub fn scause_description(scause: Word) -> &'static str {
    match scause {
        0 => "Instruction address misaligned",
        1 => "Instruction access fault",
        2 => "Illegal instruction",
        3 => "Breakpoint",
        4 => "Load address misaligned",
        5 => "Load access fault",
        6 => "Store/AMO address misaligned",
        7 => "Store/AMO access fault",
        8 => "Environment call from U-mode",
        9 => "Environment call from S-mode",
        12 => "Instruction page fault",
        13 => "Load page fault",
        15 => "Store/AMO page fault",
        18 => "Software check",
        19 => "Hardware error",
        _ => "<Unexpected FSR>",
    }
}

/// Whether the cause is a store
pub fn is_store(scause: Word) -> bool {
    matches!(scause, 6 | 7 | 15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_faults() {
        assert_eq!(scause_description(12), "Instruction page fault");
        assert_eq!(scause_description(13), "Load page fault");
        assert_eq!(scause_description(15), "Store/AMO page fault");
        assert!(is_store(15));
        assert!(!is_store(13));
    }

    #[test]
    fn test_gaps_are_unexpected() {
        for cause in [10, 11, 14, 16, 17, 20] {
            assert_eq!(scause_description(cause), "<Unexpected FSR>");
        }
    }
}
