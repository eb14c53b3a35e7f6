//! AArch64 syndrome decoding
//!
//! The FSR delivered with a VM fault is the ESR: exception class in bits
//! [31:26], instruction length in bit 25, instruction-specific syndrome in
//! bits [24:0]. Data aborts additionally carry a fault status code and a
//! few flags in the ISS.

use bitflags::bitflags;
use core::fmt;
use sel4_platform::Word;

/// Exception class of a data abort from a lower exception level
pub const EC_DATA_ABORT_LOWER_EL: Word = 0x24;

/// Exception class of a BRK instruction in AArch64 state
pub const EC_BRK_AARCH64: Word = 60;

const UBSAN_BRK_IMM: Word = 0x5500;
const UBSAN_BRK_MASK: Word = 0x00ff;
const ESR_COMMENT_MASK: Word = (1 << 16) - 1;

bitflags! {
    /// Flags in the ISS of a data abort
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataAbortFlags: Word {
        /// Write not read
        const WNR = 1 << 6;
        /// Stage 2 fault for a stage 1 page table walk
        const S1PTW = 1 << 7;
        /// Cache maintenance
        const CM = 1 << 8;
        /// External abort
        const EA = 1 << 9;
    }
}

impl DataAbortFlags {
    /// Human-readable notes, in the order the monitor prints them
    pub fn notes(self) -> impl Iterator<Item = &'static str> {
        [
            (Self::EA, "external abort"),
            (Self::CM, "cache maint"),
            (Self::S1PTW, "stage 2 fault for stage 1 page table walk"),
            (Self::WNR, "write not read"),
        ]
        .into_iter()
        .filter(move |(flag, _)| self.contains(*flag))
        .map(|(_, note)| note)
    }
}

/// Data abort details (EC 0x24)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataAbort {
    pub dfsc: Word,
    pub flags: DataAbortFlags,
}

impl DataAbort {
    pub fn description(&self) -> &'static str {
        dfsc_description(self.dfsc)
    }

    pub fn is_write(&self) -> bool {
        self.flags.contains(DataAbortFlags::WNR)
    }
}

/// Decoded exception syndrome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Syndrome {
    pub ec: Word,
    pub il: bool,
    pub iss: Word,
    pub data_abort: Option<DataAbort>,
}

impl Syndrome {
    pub fn decode(esr: Word) -> Self {
        let ec = esr >> 26;
        let il = (esr >> 25) & 1 == 1;
        let iss = esr & 0x1ff_ffff;
        let data_abort = (ec == EC_DATA_ABORT_LOWER_EL).then(|| DataAbort {
            dfsc: iss & 0x3f,
            flags: DataAbortFlags::from_bits_truncate(iss),
        });
        Self {
            ec,
            il,
            iss,
            data_abort,
        }
    }

    pub fn description(&self) -> &'static str {
        ec_description(self.ec)
    }
}

impl fmt::Display for Syndrome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ec: {:#010x}  {}   il: {}   iss: {:#010x}",
            self.ec,
            self.description(),
            self.il as u8,
            self.iss
        )?;
        if let Some(abort) = &self.data_abort {
            write!(f, "\n  dfsc = {} ({:#010x})", abort.description(), abort.dfsc)?;
            for note in abort.flags.notes() {
                write!(f, " -- {note}")?;
            }
        }
        Ok(())
    }
}

/// Exception class descriptions (ARM ARM D17.2.37)
pub fn ec_description(ec: Word) -> &'static str {
    match ec {
        0 => "Unknown reason",
        1 => "Trapped WFI or WFE instruction execution",
        3 => "Trapped MCR or MRC access with (coproc==0b1111) this is not reported using EC 0b000000",
        4 => "Trapped MCRR or MRRC access with (coproc==0b1111) this is not reported using EC 0b000000",
        5 => "Trapped MCR or MRC access with (coproc==0b1110)",
        6 => "Trapped LDC or STC access",
        7 => "Access to SVC, Advanced SIMD or floating-point functionality trapped",
        12 => "Trapped MRRC access with (coproc==0b1110)",
        13 => "Branch Target Exception",
        17 => "SVC instruction execution in AArch32 state",
        21 => "SVC instruction execution in AArch64 state",
        24 => "Trapped MSR, MRS or System instruction execution in AArch64 state, this is not reported using EC 0b000000, 0b000001 or 0b000111",
        25 => "Access to SVE functionality trapped",
        28 => "Exception from a Pointer Authentication instruction authentication failure",
        32 => "Instruction Abort from a lower Exception level",
        33 => "Instruction Abort taken without a change in Exception level",
        34 => "PC alignment fault exception",
        36 => "Data Abort from a lower Exception level",
        37 => "Data Abort taken without a change in Exception level",
        38 => "SP alignment fault exception",
        40 => "Trapped floating-point exception taken from AArch32 state",
        44 => "Trapped floating-point exception taken from AArch64 state",
        47 => "SError interrupt",
        48 => "Breakpoint exception from a lower Exception level",
        49 => "Breakpoint exception taken without a change in Exception level",
        50 => "Software Step exception from a lower Exception level",
        51 => "Software Step exception taken without a change in Exception level",
        52 => "Watchpoint exception from a lower Exception level",
        53 => "Watchpoint exception taken without a change in Exception level",
        56 => "BKPT instruction execution in AArch32 state",
        60 => "BRK instruction execution in AArch64 state",
        _ => "<invalid EC>",
    }
}

/// Data fault status code descriptions
pub fn dfsc_description(dfsc: Word) -> &'static str {
    match dfsc {
        0x00 => "address size fault, level 0",
        0x01 => "address size fault, level 1",
        0x02 => "address size fault, level 2",
        0x03 => "address size fault, level 3",
        0x04 => "translation fault, level 0",
        0x05 => "translation fault, level 1",
        0x06 => "translation fault, level 2",
        0x07 => "translation fault, level 3",
        0x09 => "access flag fault, level 1",
        0x0a => "access flag fault, level 2",
        0x0b => "access flag fault, level 3",
        0x0d => "permission fault, level 1",
        0x0e => "permission fault, level 2",
        0x0f => "permission fault, level 3",
        0x10 => "synchronous external abort",
        0x11 => "synchronous tag check fault",
        0x14 => "synchronous external abort, level 0",
        0x15 => "synchronous external abort, level 1",
        0x16 => "synchronous external abort, level 2",
        0x17 => "synchronous external abort, level 3",
        0x18 => "synchronous parity or ECC error",
        0x1c => "synchronous parity or ECC error, level 0",
        0x1d => "synchronous parity or ECC error, level 1",
        0x1e => "synchronous parity or ECC error, level 2",
        0x1f => "synchronous parity or ECC error, level 3",
        0x21 => "alignment fault",
        0x30 => "tlb conflict abort",
        0x31 => "unsupported atomic hardware update fault",
        _ => "<unexpected DFSC>",
    }
}

/// Clang UBSAN check, numbered as in its `SanitizerHandler` enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UbsanCheck {
    AddOverflow = 0,
    BuiltinUnreachable,
    CfiCheckFail,
    DivremOverflow,
    DynamicTypeCacheMiss,
    FloatCastOverflow,
    FunctionTypeMismatch,
    ImplicitConversion,
    InvalidBuiltin,
    InvalidObjcCast,
    LoadInvalidValue,
    MissingReturn,
    MulOverflow,
    NegateOverflow,
    NullabilityArg,
    NullabilityReturn,
    NonnullArg,
    NonnullReturn,
    OutOfBounds,
    PointerOverflow,
    ShiftOutOfBounds,
    SubOverflow,
    TypeMismatch,
    AlignmentAssumption,
    VlaBoundNotPositive,
}

impl UbsanCheck {
    const ALL: [UbsanCheck; 25] = [
        Self::AddOverflow,
        Self::BuiltinUnreachable,
        Self::CfiCheckFail,
        Self::DivremOverflow,
        Self::DynamicTypeCacheMiss,
        Self::FloatCastOverflow,
        Self::FunctionTypeMismatch,
        Self::ImplicitConversion,
        Self::InvalidBuiltin,
        Self::InvalidObjcCast,
        Self::LoadInvalidValue,
        Self::MissingReturn,
        Self::MulOverflow,
        Self::NegateOverflow,
        Self::NullabilityArg,
        Self::NullabilityReturn,
        Self::NonnullArg,
        Self::NonnullReturn,
        Self::OutOfBounds,
        Self::PointerOverflow,
        Self::ShiftOutOfBounds,
        Self::SubOverflow,
        Self::TypeMismatch,
        Self::AlignmentAssumption,
        Self::VlaBoundNotPositive,
    ];

    pub fn from_code(code: Word) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::AddOverflow => "add overflow",
            Self::BuiltinUnreachable => "builtin unreachable",
            Self::CfiCheckFail => "control-flow-integrity check fail",
            Self::DivremOverflow => "division remainder overflow",
            Self::DynamicTypeCacheMiss => "dynamic type cache miss",
            Self::FloatCastOverflow => "float cast overflow",
            Self::FunctionTypeMismatch => "function type mismatch",
            Self::ImplicitConversion => "implicit conversion",
            Self::InvalidBuiltin => "invalid builtin",
            Self::InvalidObjcCast => "invalid objc cast",
            Self::LoadInvalidValue => "load invalid value",
            Self::MissingReturn => "missing return",
            Self::MulOverflow => "multiplication overflow",
            Self::NegateOverflow => "negate overflow",
            Self::NullabilityArg => "nullability argument",
            Self::NullabilityReturn => "nullability return",
            Self::NonnullArg => "non-null argument",
            Self::NonnullReturn => "non-null return",
            Self::OutOfBounds => "out of bounds access",
            Self::PointerOverflow => "pointer overflow",
            Self::ShiftOutOfBounds => "shift out of bounds",
            Self::SubOverflow => "subtraction overflow",
            Self::TypeMismatch => "type mismatch",
            Self::AlignmentAssumption => "alignment assumption",
            Self::VlaBoundNotPositive => "variable-length-array bound not positive",
        }
    }
}

/// What a trapped BRK says about undefined behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrkTrap {
    /// Not a UBSAN trap
    NotUbsan,
    /// UBSAN trap with a known check code
    Ubsan(UbsanCheck),
    /// UBSAN trap with a code outside the known table
    UbsanUnknown(Word),
}

impl BrkTrap {
    /// Classify a vCPU fault syndrome (HSR)
    pub fn classify(esr: Word) -> Self {
        let ec = esr >> 26;
        let comment = esr & ESR_COMMENT_MASK;
        if ec != EC_BRK_AARCH64 || comment & !UBSAN_BRK_MASK != UBSAN_BRK_IMM {
            return Self::NotUbsan;
        }
        let code = comment & UBSAN_BRK_MASK;
        match UbsanCheck::from_code(code) {
            Some(check) => Self::Ubsan(check),
            None => Self::UbsanUnknown(code),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::NotUbsan => "Unknown vCPU fault",
            Self::Ubsan(check) => check.description(),
            Self::UbsanUnknown(_) => "unknown reason",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;
    use std::vec::Vec;

    fn esr(ec: Word, il: bool, iss: Word) -> Word {
        (ec << 26) | ((il as Word) << 25) | iss
    }

    #[test]
    fn test_data_abort_decode() {
        // Translation fault level 3 on a write
        let syndrome = Syndrome::decode(esr(0x24, true, (1 << 6) | 0x07));
        assert_eq!(syndrome.ec, 0x24);
        assert!(syndrome.il);
        let abort = syndrome.data_abort.unwrap();
        assert_eq!(abort.dfsc, 0x07);
        assert_eq!(abort.description(), "translation fault, level 3");
        assert!(abort.is_write());
        assert_eq!(abort.flags.notes().collect::<Vec<_>>(), vec!["write not read"]);
    }

    #[test]
    fn test_instruction_abort_has_no_dfsc() {
        let syndrome = Syndrome::decode(esr(0x20, true, 0x0f));
        assert!(syndrome.data_abort.is_none());
        assert_eq!(
            syndrome.description(),
            "Instruction Abort from a lower Exception level"
        );
    }

    #[test]
    fn test_flag_note_order() {
        let flags = DataAbortFlags::all();
        assert_eq!(
            flags.notes().collect::<Vec<_>>(),
            vec![
                "external abort",
                "cache maint",
                "stage 2 fault for stage 1 page table walk",
                "write not read"
            ]
        );
    }

    #[test]
    fn test_unknown_tables() {
        assert_eq!(ec_description(2), "<invalid EC>");
        assert_eq!(dfsc_description(0x08), "<unexpected DFSC>");
    }

    #[test]
    fn test_ubsan_brk() {
        let trap = BrkTrap::classify(esr(60, true, 0x5500 + 18));
        assert_eq!(trap, BrkTrap::Ubsan(UbsanCheck::OutOfBounds));
        assert_eq!(trap.description(), "out of bounds access");

        let last = BrkTrap::classify(esr(60, true, 0x5500 + 24));
        assert_eq!(last.description(), "variable-length-array bound not positive");

        let unknown = BrkTrap::classify(esr(60, true, 0x5500 + 25));
        assert_eq!(unknown, BrkTrap::UbsanUnknown(25));
        assert_eq!(unknown.description(), "unknown reason");
    }

    #[test]
    fn test_non_ubsan_brk() {
        assert_eq!(BrkTrap::classify(esr(60, true, 0x1234)), BrkTrap::NotUbsan);
        assert_eq!(BrkTrap::classify(esr(0x24, true, 0x5501)), BrkTrap::NotUbsan);
    }

    #[test]
    fn test_syndrome_display() {
        let text = Syndrome::decode(esr(0x24, false, (1 << 9) | 0x21)).to_string();
        assert!(text.contains("dfsc = alignment fault"));
        assert!(text.contains(" -- external abort"));
        assert!(text.contains("il: 0"));
    }
}
