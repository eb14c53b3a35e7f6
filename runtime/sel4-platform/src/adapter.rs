//! Typed object invocations
//!
//! Adapts the handful of TCB, scheduling-context and IRQ methods the runtime
//! needs onto the primitive [`Kernel::call`]. Arguments are staged in the
//! IPC buffer the way libsel4's generated stubs do it, and a non-zero reply
//! label is surfaced as a [`KernelError`].

use crate::{Arch, CPtr, InvocationLabel, Kernel, KernelError, MessageInfo, Result, UserContext, Word};

/// Object invocations available on every [`Kernel`]
pub trait ObjectInvocations: Kernel {
    /// Generic invocation: stage `caps` and `mrs`, call `service`, check the
    /// reply label.
    fn invoke(
        &mut self,
        service: CPtr,
        label: InvocationLabel,
        caps: &[CPtr],
        mrs: &[Word],
    ) -> Result<()> {
        for (idx, cap) in caps.iter().enumerate() {
            self.set_cap(idx, *cap);
        }
        for (idx, mr) in mrs.iter().enumerate() {
            self.set_mr(idx, *mr);
        }
        let info = MessageInfo::new(label.into_word(), 0, caps.len() as Word, mrs.len() as Word);
        KernelError::check(self.call(service, info).label())
    }

    /// `seL4_TCB_ReadRegisters` for the full user context of `arch`
    fn tcb_read_registers(&mut self, tcb: CPtr, arch: Arch, suspend_source: bool) -> Result<UserContext> {
        let count = arch.user_context_words();
        self.invoke(
            tcb,
            InvocationLabel::TcbReadRegisters,
            &[],
            &[suspend_source as Word, count as Word],
        )?;
        let mut words = [0; crate::MAX_USER_CONTEXT_WORDS];
        for (idx, word) in words.iter_mut().enumerate().take(count) {
            *word = self.mr(idx);
        }
        Ok(UserContext::from_words(arch, &words[..count]))
    }

    /// `seL4_TCB_WriteRegisters` writing the first `regs.len()` registers
    fn tcb_write_registers(&mut self, tcb: CPtr, resume: bool, regs: &[Word]) -> Result<()> {
        self.set_mr(0, resume as Word);
        self.set_mr(1, regs.len() as Word);
        for (idx, reg) in regs.iter().enumerate() {
            self.set_mr(2 + idx, *reg);
        }
        let info = MessageInfo::new(
            InvocationLabel::TcbWriteRegisters.into_word(),
            0,
            0,
            2 + regs.len() as Word,
        );
        KernelError::check(self.call(tcb, info).label())
    }

    fn tcb_suspend(&mut self, tcb: CPtr) -> Result<()> {
        self.invoke(tcb, InvocationLabel::TcbSuspend, &[], &[])
    }

    fn tcb_resume(&mut self, tcb: CPtr) -> Result<()> {
        self.invoke(tcb, InvocationLabel::TcbResume, &[], &[])
    }

    /// Bind a scheduling context to a TCB or notification object
    fn sched_context_bind(&mut self, sched_context: CPtr, object: CPtr) -> Result<()> {
        self.invoke(sched_context, InvocationLabel::SchedContextBind, &[object], &[])
    }

    /// Detach a scheduling context from `object`
    fn sched_context_unbind_object(&mut self, sched_context: CPtr, object: CPtr) -> Result<()> {
        self.invoke(sched_context, InvocationLabel::SchedContextUnbindObject, &[object], &[])
    }

    fn irq_handler_ack(&mut self, irq_handler: CPtr) -> Result<()> {
        self.invoke(irq_handler, InvocationLabel::IrqAckIrq, &[], &[])
    }
}

impl<K: Kernel + ?Sized> ObjectInvocations for K {}
