//! Monitor event loop
//!
//! One blocking receive on the shared fault endpoint per step. A null fault
//! from a known component is a passivation request; anything else is a
//! fault that gets decoded, reported and handed to the recovery policy.

use crate::component::{ComponentIdentity, ComponentTable};
use crate::error::MonitorError;
use crate::fault::{FaultDecoder, FaultEvent};
use crate::recovery::{Recovery, RecoveryAction};
use crate::report::{in_stack_guard, FaultReport};
use crate::{MonitorConfig, MAX_COMPONENTS};
use sel4_platform::caps::monitor::{BASE_PD_TCB_CAP, FAULT_EP_CAP, REPLY_CAP};
use sel4_platform::{Badge, CPtr, FaultLabel, Kernel, KernelError, MessageInfo, ObjectInvocations};

/// Result of one monitor step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Scheduling context moved from the TCB to the notification object
    Passivated { component: usize },
    /// Repeated request from a component that is already passive; ignored
    AlreadyPassive { component: usize },
    /// The kernel refused to move the scheduling context
    PassivationFailed { component: usize, error: KernelError },
    /// A fault was reported and `action` applied
    Fault {
        report: FaultReport,
        action: RecoveryAction,
        /// Set when applying `action` failed
        error: Option<KernelError>,
    },
}

/// The fault monitor
pub struct Monitor<K, R> {
    kernel: K,
    table: ComponentTable,
    decoder: FaultDecoder,
    config: MonitorConfig,
    recovery: R,
    passive: [bool; MAX_COMPONENTS],
    /// Resume chosen for the last fault: answer it on the next receive
    reply_owed: bool,
}

impl<K: Kernel, R: Recovery> Monitor<K, R> {
    pub fn new(kernel: K, table: ComponentTable, config: MonitorConfig, recovery: R) -> Self {
        Self {
            kernel,
            table,
            decoder: FaultDecoder::new(config.arch, config.hypervisor),
            config,
            recovery,
            passive: [false; MAX_COMPONENTS],
            reply_owed: false,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    pub fn table(&self) -> &ComponentTable {
        &self.table
    }

    pub fn recovery(&self) -> &R {
        &self.recovery
    }

    pub fn decoder(&self) -> FaultDecoder {
        self.decoder
    }

    pub fn is_passive(&self, component: usize) -> bool {
        self.passive.get(component).copied().unwrap_or(false)
    }

    /// Name threads for the kernel's debug output and announce startup
    pub fn start(&mut self) {
        if self.config.name_threads {
            for pd in self.table.iter() {
                self.kernel.debug_name_thread(pd.tcb_cap(), pd.name.as_str());
            }
            for (tcb, name) in self.table.vms() {
                self.kernel.debug_name_thread(tcb, name.as_str());
            }
        }
        log::info!("Monitor started!");
    }

    /// Handle faults forever; a fatal error halts the monitor
    pub fn run(&mut self) -> ! {
        loop {
            if let Err(err) = self.step() {
                log::error!("{err}");
                self.kernel.halt();
            }
        }
    }

    /// Receive and handle exactly one message
    pub fn step(&mut self) -> Result<Outcome, MonitorError> {
        let (info, badge) = if core::mem::take(&mut self.reply_owed) {
            self.kernel
                .reply_recv(FAULT_EP_CAP, MessageInfo::new(0, 0, 0, 0), REPLY_CAP)
        } else {
            self.kernel.recv(FAULT_EP_CAP, REPLY_CAP)
        };
        let label = info.label();

        if FaultLabel::from_word(label) == FaultLabel::NullFault {
            if let Some(pd) = self.table.by_badge(badge).copied() {
                return Ok(self.passivate(&pd));
            }
        }

        let tcb_cap = BASE_PD_TCB_CAP.wrapping_add(badge.wrapping_sub(1));
        log::error!("received message {label:#x}  badge: {badge:#x}  tcb cap: {tcb_cap:#x}");
        let pd = *self
            .table
            .by_badge(badge)
            .ok_or(MonitorError::UnknownBadge { badge })?;
        log::error!("faulting PD: {}", pd.name);

        // Reading registers replaces the message, so decode first.
        let kernel = &self.kernel;
        let event = self.decoder.event(pd.id, label, |idx| kernel.mr(idx));

        let report = self.inspect(&pd, label, badge, event)?;
        report.log();

        let action = self.recovery.on_fault(&report);
        let error = self.apply(&pd, action).err();
        if let Some(err) = error {
            log::error!("could not apply {action:?} to PD '{}': {err}", pd.name);
        }

        Ok(Outcome::Fault {
            report,
            action,
            error,
        })
    }

    fn inspect(
        &mut self,
        pd: &ComponentIdentity,
        label: sel4_platform::Word,
        badge: Badge,
        event: FaultEvent,
    ) -> Result<FaultReport, MonitorError> {
        let tcb = pd.tcb_cap();
        let registers = self
            .kernel
            .tcb_read_registers(tcb, self.config.arch, false)
            .map_err(|error| MonitorError::RegisterRead { tcb, error })?;
        let suspected_stack_overflow = event
            .kind
            .vm()
            .is_some_and(|vm| in_stack_guard(vm.addr, pd.stack_bottom));

        Ok(FaultReport {
            component: event.component,
            name: pd.name,
            label,
            badge,
            tcb_cap: tcb,
            registers,
            kind: event.kind,
            suspected_stack_overflow,
        })
    }

    fn passivate(&mut self, pd: &ComponentIdentity) -> Outcome {
        if self.is_passive(pd.id) {
            log::warn!("PD '{}' is already passive, ignoring request", pd.name);
            return Outcome::AlreadyPassive { component: pd.id };
        }

        let sched_context = pd.sched_context_cap();
        let result = self
            .kernel
            .sched_context_unbind_object(sched_context, pd.tcb_cap())
            .and_then(|()| {
                self.kernel
                    .sched_context_bind(sched_context, pd.notification_cap())
            });

        match result {
            Ok(()) => {
                self.passive[pd.id] = true;
                log::info!("PD '{}' is now passive!", pd.name);
                Outcome::Passivated { component: pd.id }
            }
            Err(error) => {
                log::error!("could not bind scheduling context to notification object: {error}");
                Outcome::PassivationFailed {
                    component: pd.id,
                    error,
                }
            }
        }
    }

    fn apply(&mut self, pd: &ComponentIdentity, action: RecoveryAction) -> Result<(), KernelError> {
        let tcb: CPtr = pd.tcb_cap();
        match action {
            RecoveryAction::Report => Ok(()),
            RecoveryAction::Restart { entry } => {
                log::info!("restarting PD '{}' at {entry:#x}", pd.name);
                self.kernel.tcb_write_registers(tcb, true, &[entry])
            }
            RecoveryAction::Stop => {
                log::warn!("stopping PD '{}'", pd.name);
                self.kernel.tcb_suspend(tcb)
            }
            RecoveryAction::Resume => {
                self.reply_owed = true;
                Ok(())
            }
        }
    }
}
