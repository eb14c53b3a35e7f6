//! Message labels
//!
//! Fault labels are what the kernel puts on a fault message delivered to a
//! fault endpoint. Invocation labels select the method of an object
//! invocation. Numbering follows the aarch64 MCS kernel configuration that
//! the build tool targets.

use crate::Word;

/// Label of a fault message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FaultLabel {
    /// Not a fault. Sent by a component asking to become passive.
    NullFault,
    CapFault,
    UnknownSyscall,
    UserException,
    Timeout,
    VmFault,
    VgicMaintenance,
    VcpuFault,
    VppiEvent,
    /// Label the decoder does not know
    Other(Word),
}

impl FaultLabel {
    pub const fn from_word(label: Word) -> Self {
        match label {
            0 => Self::NullFault,
            1 => Self::CapFault,
            2 => Self::UnknownSyscall,
            3 => Self::UserException,
            5 => Self::Timeout,
            6 => Self::VmFault,
            7 => Self::VgicMaintenance,
            8 => Self::VcpuFault,
            9 => Self::VppiEvent,
            other => Self::Other(other),
        }
    }

    pub const fn into_word(self) -> Word {
        match self {
            Self::NullFault => 0,
            Self::CapFault => 1,
            Self::UnknownSyscall => 2,
            Self::UserException => 3,
            Self::Timeout => 5,
            Self::VmFault => 6,
            Self::VgicMaintenance => 7,
            Self::VcpuFault => 8,
            Self::VppiEvent => 9,
            Self::Other(label) => label,
        }
    }
}

/// Object invocation label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u64)]
pub enum InvocationLabel {
    UntypedRetype = 1,
    TcbReadRegisters = 2,
    TcbWriteRegisters = 3,
    TcbCopyRegisters = 4,
    TcbConfigure = 5,
    TcbSetPriority = 6,
    TcbSetMcPriority = 7,
    TcbSetSchedParams = 8,
    TcbSetTimeoutEndpoint = 9,
    TcbSetIpcBuffer = 10,
    TcbSetSpace = 11,
    TcbSuspend = 12,
    TcbResume = 13,
    TcbBindNotification = 14,
    TcbUnbindNotification = 15,
    TcbSetTlsBase = 16,
    CnodeRevoke = 17,
    CnodeDelete = 18,
    CnodeCancelBadgedSends = 19,
    CnodeCopy = 20,
    CnodeMint = 21,
    CnodeMove = 22,
    CnodeMutate = 23,
    CnodeRotate = 24,
    IrqIssueIrqHandler = 25,
    IrqAckIrq = 26,
    IrqSetIrqHandler = 27,
    IrqClearIrqHandler = 28,
    DomainSetSet = 29,
    SchedControlConfigureFlags = 30,
    SchedContextBind = 31,
    SchedContextUnbind = 32,
    SchedContextUnbindObject = 33,
    SchedContextConsume = 34,
    SchedContextYieldTo = 35,
    ArmVspaceCleanData = 36,
    ArmVspaceInvalidateData = 37,
    ArmVspaceCleanInvalidateData = 38,
    ArmVspaceUnifyInstruction = 39,
    ArmPageUpperDirectoryMap = 40,
    ArmPageUpperDirectoryUnmap = 41,
    ArmPageDirectoryMap = 42,
    ArmPageDirectoryUnmap = 43,
    ArmPageTableMap = 44,
    ArmPageTableUnmap = 45,
    ArmPageMap = 46,
    ArmPageUnmap = 47,
    ArmPageCleanData = 48,
    ArmPageInvalidateData = 49,
    ArmPageCleanInvalidateData = 50,
    ArmPageUnifyInstruction = 51,
    ArmPageGetAddress = 52,
    ArmAsidControlMakePool = 53,
    ArmAsidPoolAssign = 54,
    ArmIrqIssueIrqHandlerTrigger = 55,
}

impl InvocationLabel {
    pub const fn into_word(self) -> Word {
        self as Word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_label_roundtrip_known() {
        for label in [0, 1, 2, 3, 5, 6, 7, 8, 9] {
            assert_eq!(FaultLabel::from_word(label).into_word(), label);
        }
    }

    #[test]
    fn test_unknown_fault_label_preserved() {
        assert_eq!(FaultLabel::from_word(4), FaultLabel::Other(4));
        assert_eq!(FaultLabel::from_word(77).into_word(), 77);
    }

    #[test]
    fn test_invocation_label_values() {
        assert_eq!(InvocationLabel::CnodeMint.into_word(), 21);
        assert_eq!(InvocationLabel::SchedContextUnbindObject.into_word(), 33);
    }
}
