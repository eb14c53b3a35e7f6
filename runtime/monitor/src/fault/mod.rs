//! Fault decoding
//!
//! A fault arrives as a message whose label is the fault type and whose
//! message registers carry the payload. [`FaultDecoder`] is picked once for
//! the running architecture and turns those registers into a [`FaultKind`].

pub mod aarch64;
pub mod riscv;
pub mod x86;

use core::fmt;
use sel4_platform::{Arch, FaultLabel, Word};

/// Message registers of a capability fault
mod cap_mr {
    pub const IP: usize = 0;
    pub const ADDR: usize = 1;
    pub const IN_RECV_PHASE: usize = 2;
    pub const LOOKUP_FAILURE_TYPE: usize = 3;
    pub const BITS_LEFT: usize = 4;
    pub const DEPTH_MISMATCH_BITS_FOUND: usize = 5;
    pub const GUARD_MISMATCH_GUARD_FOUND: usize = 5;
    pub const GUARD_MISMATCH_BITS_FOUND: usize = 6;
}

/// Message registers of a VM fault
mod vm_mr {
    pub const IP: usize = 0;
    pub const ADDR: usize = 1;
    pub const PREFETCH_FAULT: usize = 2;
    pub const FSR: usize = 3;
}

/// Message register of a vCPU fault
const VCPU_MR_HSR: usize = 0;

/// Why a capability lookup failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailure {
    NoFailure,
    InvalidRoot,
    MissingCapability { bits_left: Word },
    DepthMismatch { bits_left: Word, bits_found: Word },
    GuardMismatch { bits_left: Word, guard_found: Word, bits_found: Word },
    /// Type the kernel ABI does not define
    Other(Word),
}

impl LookupFailure {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NoFailure => "seL4_NoFailure",
            Self::InvalidRoot => "seL4_InvalidRoot",
            Self::MissingCapability { .. } => "seL4_MissingCapability",
            Self::DepthMismatch { .. } => "seL4_DepthMismatch",
            Self::GuardMismatch { .. } => "seL4_GuardMismatch",
            Self::Other(_) => "<unknown lookup failure>",
        }
    }
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(kind) => write!(f, "{kind:#018x}"),
            Self::NoFailure | Self::InvalidRoot => f.write_str(self.name()),
            Self::MissingCapability { bits_left } => {
                write!(f, "{}  bits_left={bits_left:#018x}", self.name())
            }
            Self::DepthMismatch {
                bits_left,
                bits_found,
            } => write!(
                f,
                "{}  bits_left={bits_left:#018x}  depth_bits_found={bits_found:#018x}",
                self.name()
            ),
            Self::GuardMismatch {
                bits_left,
                guard_found,
                bits_found,
            } => write!(
                f,
                "{}  bits_left={bits_left:#018x}  guard_found={guard_found:#018x}  guard_bits_found={bits_found:#018x}",
                self.name()
            ),
        }
    }
}

/// Invalid capability use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapFault {
    pub ip: Word,
    pub addr: Word,
    pub in_recv_phase: bool,
    pub lookup: LookupFailure,
}

impl fmt::Display for CapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CapFault: ip={:#018x}  fault_addr={:#018x}  in_recv_phase={}  lookup_failure_type={}",
            self.ip, self.addr, self.in_recv_phase, self.lookup
        )
    }
}

/// Architecture-specific meaning of a VM fault's FSR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmSyndrome {
    Aarch64(aarch64::Syndrome),
    Riscv64 { scause: Word },
    X86_64(x86::PageFaultFlags),
}

impl VmSyndrome {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Aarch64(syndrome) => syndrome.description(),
            Self::Riscv64 { scause } => riscv::scause_description(*scause),
            Self::X86_64(flags) => x86::page_fault_description(flags.bits()),
        }
    }
}

/// Memory access fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmFault {
    pub ip: Word,
    pub addr: Word,
    /// Instruction fetch rather than data access
    pub instruction: bool,
    pub fsr: Word,
    pub syndrome: VmSyndrome,
}

impl VmFault {
    /// Whether the faulting access was a write, when the syndrome says so
    pub fn is_write(&self) -> Option<bool> {
        match &self.syndrome {
            VmSyndrome::Aarch64(s) => s.data_abort.map(|abort| abort.is_write()),
            VmSyndrome::Riscv64 { scause } => Some(riscv::is_store(*scause)),
            VmSyndrome::X86_64(flags) => Some(flags.contains(x86::PageFaultFlags::WRITE)),
        }
    }
}

impl fmt::Display for VmFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VMFault: ip={:#018x}  fault_addr={:#018x}  fsr={:#018x}  {}",
            self.ip,
            self.addr,
            self.fsr,
            if self.instruction {
                "(instruction fault)"
            } else {
                "(data fault)"
            }
        )?;
        match &self.syndrome {
            VmSyndrome::Aarch64(syndrome) => write!(f, "\n  {syndrome}"),
            other => write!(f, "\n  description of fault: {}", other.description()),
        }
    }
}

/// Trapped instruction in a virtual CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VcpuFault {
    pub hsr: Word,
    pub trap: aarch64::BrkTrap,
}

impl fmt::Display for VcpuFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "received vCPU fault with ESR: {:#018x}", self.hsr)?;
        match self.trap {
            aarch64::BrkTrap::NotUbsan => write!(f, "\n  Unknown vCPU fault"),
            trap => write!(
                f,
                "\n  potential undefined behaviour detected by UBSAN for: '{}'",
                trap.description()
            ),
        }
    }
}

/// Decoded fault payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Cap(CapFault),
    Vm(VmFault),
    UserException,
    Vcpu(VcpuFault),
    /// A label this monitor does not decode
    Unknown(Word),
}

impl FaultKind {
    pub fn vm(&self) -> Option<&VmFault> {
        match self {
            Self::Vm(vm) => Some(vm),
            _ => None,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cap(cap) => fmt::Display::fmt(cap, f),
            Self::Vm(vm) => fmt::Display::fmt(vm, f),
            Self::UserException => f.write_str("UserException"),
            Self::Vcpu(vcpu) => fmt::Display::fmt(vcpu, f),
            Self::Unknown(label) => write!(f, "Unknown fault {label:#x}"),
        }
    }
}

/// One fault, attributed to a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultEvent {
    pub component: usize,
    pub kind: FaultKind,
}

/// Architecture-polymorphic fault decoder, chosen once at start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultDecoder {
    Aarch64 {
        /// Kernel built with hypervisor support (vCPU faults exist)
        hypervisor: bool,
    },
    Riscv64,
    X86_64,
}

impl FaultDecoder {
    pub const fn new(arch: Arch, hypervisor: bool) -> Self {
        match arch {
            Arch::Aarch64 => Self::Aarch64 { hypervisor },
            Arch::Riscv64 => Self::Riscv64,
            Arch::X86_64 => Self::X86_64,
        }
    }

    pub const fn arch(&self) -> Arch {
        match self {
            Self::Aarch64 { .. } => Arch::Aarch64,
            Self::Riscv64 => Arch::Riscv64,
            Self::X86_64 => Arch::X86_64,
        }
    }

    /// Decode the payload of a fault with `label`, reading message
    /// registers through `mr`.
    ///
    /// The null fault (a passivation request) is not a fault and decodes as
    /// `Unknown(0)`; the monitor handles it before decoding.
    pub fn decode(&self, label: Word, mr: impl Fn(usize) -> Word) -> FaultKind {
        match FaultLabel::from_word(label) {
            FaultLabel::CapFault => FaultKind::Cap(decode_cap_fault(&mr)),
            FaultLabel::UserException => FaultKind::UserException,
            FaultLabel::VmFault => FaultKind::Vm(self.decode_vm_fault(&mr)),
            FaultLabel::VcpuFault if matches!(self, Self::Aarch64 { hypervisor: true }) => {
                let hsr = mr(VCPU_MR_HSR);
                FaultKind::Vcpu(VcpuFault {
                    hsr,
                    trap: aarch64::BrkTrap::classify(hsr),
                })
            }
            _ => FaultKind::Unknown(label),
        }
    }

    /// Decode the fault `component` just delivered
    pub fn event(&self, component: usize, label: Word, mr: impl Fn(usize) -> Word) -> FaultEvent {
        FaultEvent {
            component,
            kind: self.decode(label, mr),
        }
    }

    fn decode_vm_fault(&self, mr: &impl Fn(usize) -> Word) -> VmFault {
        let fsr = mr(vm_mr::FSR);
        let syndrome = match self {
            Self::Aarch64 { .. } => VmSyndrome::Aarch64(aarch64::Syndrome::decode(fsr)),
            Self::Riscv64 => VmSyndrome::Riscv64 { scause: fsr },
            Self::X86_64 => VmSyndrome::X86_64(x86::PageFaultFlags::from_bits_retain(fsr)),
        };
        VmFault {
            ip: mr(vm_mr::IP),
            addr: mr(vm_mr::ADDR),
            instruction: mr(vm_mr::PREFETCH_FAULT) != 0,
            fsr,
            syndrome,
        }
    }
}

fn decode_cap_fault(mr: &impl Fn(usize) -> Word) -> CapFault {
    let bits_left = mr(cap_mr::BITS_LEFT);
    let lookup = match mr(cap_mr::LOOKUP_FAILURE_TYPE) {
        0 => LookupFailure::NoFailure,
        1 => LookupFailure::InvalidRoot,
        2 => LookupFailure::MissingCapability { bits_left },
        3 => LookupFailure::DepthMismatch {
            bits_left,
            bits_found: mr(cap_mr::DEPTH_MISMATCH_BITS_FOUND),
        },
        4 => LookupFailure::GuardMismatch {
            bits_left,
            guard_found: mr(cap_mr::GUARD_MISMATCH_GUARD_FOUND),
            bits_found: mr(cap_mr::GUARD_MISMATCH_BITS_FOUND),
        },
        other => LookupFailure::Other(other),
    };
    CapFault {
        ip: mr(cap_mr::IP),
        addr: mr(cap_mr::ADDR),
        in_recv_phase: mr(cap_mr::IN_RECV_PHASE) != 0,
        lookup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    fn regs(words: &[Word]) -> impl Fn(usize) -> Word + '_ {
        move |idx| words.get(idx).copied().unwrap_or(0)
    }

    #[test]
    fn test_guard_mismatch() {
        let decoder = FaultDecoder::new(Arch::Aarch64, false);
        let kind = decoder.decode(1, regs(&[0x20_0040, 0x99, 0, 4, 12, 0x3, 8]));
        let FaultKind::Cap(cap) = kind else {
            panic!("expected a cap fault, got {kind:?}");
        };
        assert_eq!(
            cap.lookup,
            LookupFailure::GuardMismatch {
                bits_left: 12,
                guard_found: 3,
                bits_found: 8
            }
        );
        assert!(!cap.in_recv_phase);
        let text = cap.to_string();
        assert!(text.contains("seL4_GuardMismatch"));
        assert!(text.contains("guard_bits_found=0x0000000000000008"));
    }

    #[test]
    fn test_depth_mismatch_fields() {
        let decoder = FaultDecoder::new(Arch::Riscv64, false);
        let kind = decoder.decode(1, regs(&[0, 0, 1, 3, 5, 9]));
        assert_eq!(
            kind,
            FaultKind::Cap(CapFault {
                ip: 0,
                addr: 0,
                in_recv_phase: true,
                lookup: LookupFailure::DepthMismatch {
                    bits_left: 5,
                    bits_found: 9
                }
            })
        );
        let text = kind.to_string();
        assert!(text.contains("depth_bits_found"));
        assert!(!text.contains("guard_found"));
    }

    #[test]
    fn test_invalid_root_has_no_extras() {
        let decoder = FaultDecoder::new(Arch::X86_64, false);
        let kind = decoder.decode(1, regs(&[0, 0, 0, 1, 5]));
        assert!(!kind.to_string().contains("bits_left"));
    }

    #[test]
    fn test_vm_fault_per_arch() {
        let arm = FaultDecoder::new(Arch::Aarch64, false);
        let esr = (0x24 << 26) | (1 << 25) | (1 << 6) | 0x07;
        let kind = arm.decode(6, regs(&[0x1000, 0xdead_0000, 0, esr]));
        let vm = kind.vm().unwrap();
        assert_eq!(vm.addr, 0xdead_0000);
        assert_eq!(vm.is_write(), Some(true));

        let rv = FaultDecoder::new(Arch::Riscv64, false);
        let vm = *rv.decode(6, regs(&[0x1000, 0x10, 1, 12])).vm().unwrap();
        assert!(vm.instruction);
        assert_eq!(vm.syndrome.description(), "Instruction page fault");

        let x86 = FaultDecoder::new(Arch::X86_64, false);
        let vm = *x86.decode(6, regs(&[0x1000, 0x10, 0, 6])).vm().unwrap();
        assert_eq!(vm.is_write(), Some(true));
        assert_eq!(vm.syndrome.description(), "write to a non-present page at ring 3");
    }

    #[test]
    fn test_vcpu_fault_needs_hypervisor() {
        let hsr = (60 << 26) | 0x5500;
        let plain = FaultDecoder::new(Arch::Aarch64, false);
        assert_eq!(plain.decode(8, regs(&[hsr])), FaultKind::Unknown(8));

        let hyp = FaultDecoder::new(Arch::Aarch64, true);
        let kind = hyp.decode(8, regs(&[hsr]));
        assert!(kind.to_string().contains("'add overflow'"));
    }

    #[test]
    fn test_unknown_labels() {
        let decoder = FaultDecoder::new(Arch::Aarch64, true);
        assert_eq!(decoder.decode(2, regs(&[])), FaultKind::Unknown(2));
        assert_eq!(decoder.decode(5, regs(&[])), FaultKind::Unknown(5));
        assert_eq!(decoder.decode(3, regs(&[])), FaultKind::UserException);
    }

    #[test]
    fn test_event_carries_component() {
        let decoder = FaultDecoder::new(Arch::Riscv64, false);
        let event = decoder.event(5, 3, regs(&[]));
        assert_eq!(event.component, 5);
        assert_eq!(event.kind, FaultKind::UserException);
    }
}
