//! Fault reports
//!
//! The monitor logs every fault and also hands it back as a value, so
//! recovery policies and tests look at data instead of console text.

use crate::component::ComponentName;
use crate::fault::{FaultEvent, FaultKind};
use crate::STACK_GUARD_SIZE;
use sel4_platform::{Badge, CPtr, UserContext, Word};

/// Everything known about one decoded fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultReport {
    pub component: usize,
    pub name: ComponentName,
    pub label: Word,
    pub badge: Badge,
    pub tcb_cap: CPtr,
    pub registers: UserContext,
    pub kind: FaultKind,
    /// Fault address within the guard page just below the stack
    pub suspected_stack_overflow: bool,
}

/// Whether `fault_addr` lies in the page directly below `stack_bottom`
pub fn in_stack_guard(fault_addr: Word, stack_bottom: Word) -> bool {
    fault_addr < stack_bottom && fault_addr >= stack_bottom.saturating_sub(STACK_GUARD_SIZE)
}

impl FaultReport {
    pub fn event(&self) -> FaultEvent {
        FaultEvent {
            component: self.component,
            kind: self.kind,
        }
    }

    /// Write the register dump and decoded fault to the log
    pub fn log(&self) {
        log::error!("Registers:");
        for (name, value) in self.registers.registers() {
            log::error!("  {name} : {value:#018x}");
        }
        log::error!("{}", self.kind);
        if self.suspected_stack_overflow {
            log::error!(
                "potential stack overflow, fault address within one page outside of stack region"
            );
        }
    }
}
