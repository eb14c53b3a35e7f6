//! Capability index layout
//!
//! Every capability a component or the monitor uses lives at a fixed slot
//! chosen by the build tool: a small set of singletons followed by ranges of
//! `BASE_<KIND> + id`. This is ABI between the build tool, the monitor and
//! the SDK.

use crate::CPtr;
use static_assertions::const_assert;

/// Maximum number of components in a system
pub const MAX_COMPONENTS: usize = 64;

/// Maximum number of virtual machines in a system
pub const MAX_VMS: usize = 64;

/// Maximum number of channels per component
pub const MAX_CHANNELS: usize = 63;

/// Width of each `BASE_<KIND>` range
pub const RANGE_SIZE: CPtr = 64;

/// Slots inside a component's own CSpace
pub mod component {
    use super::{CPtr, RANGE_SIZE};

    /// Endpoint or notification the dispatch loop receives on
    pub const INPUT_CAP: CPtr = 1;
    /// Fault endpoint to the component's parent or the monitor
    pub const FAULT_EP_CAP: CPtr = 2;
    pub const VSPACE_CAP: CPtr = 3;
    pub const REPLY_CAP: CPtr = 4;
    /// Badged endpoint to the monitor (passivation requests)
    pub const MONITOR_EP: CPtr = 5;
    pub const TCB_CAP: CPtr = 6;
    pub const SMC_CAP: CPtr = 7;

    pub const BASE_OUTPUT_NOTIFICATION_CAP: CPtr = 10;
    pub const BASE_ENDPOINT_CAP: CPtr = BASE_OUTPUT_NOTIFICATION_CAP + RANGE_SIZE;
    pub const BASE_IRQ_CAP: CPtr = BASE_ENDPOINT_CAP + RANGE_SIZE;
    /// TCBs of child components (for restart/stop)
    pub const BASE_PD_TCB_CAP: CPtr = BASE_IRQ_CAP + RANGE_SIZE;
    pub const BASE_VM_TCB_CAP: CPtr = BASE_PD_TCB_CAP + RANGE_SIZE;
    pub const BASE_VCPU_CAP: CPtr = BASE_VM_TCB_CAP + RANGE_SIZE;
}

/// Slots inside the monitor's CSpace
pub mod monitor {
    use super::{CPtr, RANGE_SIZE};

    /// Endpoint every component's faults and passivation requests arrive on
    pub const FAULT_EP_CAP: CPtr = 1;
    pub const REPLY_CAP: CPtr = 2;

    pub const BASE_PD_TCB_CAP: CPtr = 10;
    pub const BASE_VM_TCB_CAP: CPtr = BASE_PD_TCB_CAP + RANGE_SIZE;
    pub const BASE_SCHED_CONTEXT_CAP: CPtr = BASE_VM_TCB_CAP + RANGE_SIZE;
    pub const BASE_NOTIFICATION_CAP: CPtr = BASE_SCHED_CONTEXT_CAP + RANGE_SIZE;
}

const_assert!(MAX_COMPONENTS as CPtr <= RANGE_SIZE);
const_assert!(MAX_VMS as CPtr <= RANGE_SIZE);
const_assert!(MAX_CHANNELS as CPtr <= RANGE_SIZE);
const_assert!(component::SMC_CAP < component::BASE_OUTPUT_NOTIFICATION_CAP);
const_assert!(monitor::REPLY_CAP < monitor::BASE_PD_TCB_CAP);
