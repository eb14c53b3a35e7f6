//! Child control
//!
//! A component that is the fault handler of other components holds their
//! TCBs at `BASE_PD_TCB_CAP + child` and can restart or stop them.

use crate::context::Context;
use crate::error::DispatchError;
use sel4_platform::caps::component::BASE_PD_TCB_CAP;
use sel4_platform::caps::MAX_COMPONENTS;
use sel4_platform::{CPtr, Kernel, ObjectInvocations, Word};

pub(crate) fn child_tcb(child: usize) -> Result<CPtr, DispatchError> {
    if child >= MAX_COMPONENTS {
        return Err(DispatchError::InvalidChild {
            child,
            max: MAX_COMPONENTS,
        });
    }
    Ok(BASE_PD_TCB_CAP + child as CPtr)
}

impl<K: Kernel> Context<K> {
    /// Set the child's program counter to `entry` and resume it
    pub fn pd_restart(&mut self, child: usize, entry: Word) -> Result<(), DispatchError> {
        let tcb = child_tcb(child)?;
        // The program counter is the first register on every architecture.
        self.kernel.tcb_write_registers(tcb, true, &[entry])?;
        Ok(())
    }

    /// Suspend the child until something restarts it
    pub fn pd_stop(&mut self, child: usize) -> Result<(), DispatchError> {
        let tcb = child_tcb(child)?;
        self.kernel.tcb_suspend(tcb)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sel4_mock::MockKernel;
    use sel4_platform::{Arch, KernelError};

    #[test]
    fn test_restart_sets_pc_and_resumes() {
        let mut ctx = Context::new(MockKernel::new(Arch::Riscv64), "parent").unwrap();
        ctx.pd_stop(2).unwrap();
        assert!(ctx.kernel().is_suspended(BASE_PD_TCB_CAP + 2));

        ctx.pd_restart(2, 0x1000).unwrap();
        let regs = ctx.kernel().registers(BASE_PD_TCB_CAP + 2).unwrap();
        assert_eq!(regs.pc(), 0x1000);
        assert!(!ctx.kernel().is_suspended(BASE_PD_TCB_CAP + 2));
    }

    #[test]
    fn test_child_range() {
        let mut ctx = Context::new(MockKernel::new(Arch::Aarch64), "parent").unwrap();
        assert_eq!(
            ctx.pd_stop(MAX_COMPONENTS),
            Err(DispatchError::InvalidChild {
                child: MAX_COMPONENTS,
                max: MAX_COMPONENTS
            })
        );
    }

    #[test]
    fn test_kernel_error_propagates() {
        let mut ctx = Context::new(MockKernel::new(Arch::Aarch64), "parent").unwrap();
        ctx.kernel_mut().fail_call(0, KernelError::InvalidCapability);
        assert_eq!(
            ctx.pd_stop(0),
            Err(DispatchError::Kernel(KernelError::InvalidCapability))
        );
    }
}
