//! # seL4 Platform Layer
//!
//! The kernel-facing ABI shared by every KaaL runtime crate:
//! - **Types**: machine words, capability pointers, badges and the packed
//!   `MessageInfo` tag
//! - **Errors**: seL4 error codes with their symbolic names
//! - **Labels**: fault labels and object invocation labels
//! - **Capability layout**: the fixed `BASE_<KIND> + id` slot ABI
//! - **Registers**: per-architecture user contexts
//! - **Syscalls**: the [`Kernel`] trait, the only seam to the microkernel
//!   (synchronous call and blocking receive)
//! - **Adapter**: typed TCB / scheduling-context / IRQ invocations built on
//!   [`Kernel::call`]
//! - **Logging**: a `log` backend writing to the kernel debug console
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sel4_platform::{Kernel, ObjectInvocations, caps};
//!
//! fn stop(kernel: &mut impl Kernel, pd: u64) {
//!     kernel
//!         .tcb_suspend(caps::monitor::BASE_PD_TCB_CAP + pd)
//!         .expect("suspend");
//! }
//! ```

#![no_std]

#[cfg(any(test, feature = "std"))]
#[macro_use]
extern crate std;

pub mod adapter;
pub mod caps;
pub mod context;
pub mod error;
pub mod labels;
pub mod logging;
pub mod syscalls;
pub mod types;

pub use adapter::ObjectInvocations;
pub use context::{Arch, UserContext, MAX_USER_CONTEXT_WORDS};
pub use error::{KernelError, Result};
pub use labels::{FaultLabel, InvocationLabel};
pub use syscalls::Kernel;
pub use types::{Badge, CPtr, MessageInfo, Word};

/// Platform configuration and detection
pub mod config {
    use crate::Arch;

    /// Architecture this crate was compiled for, if it is one seL4 supports.
    ///
    /// Host builds (tests, tooling) return `None` and pick an architecture
    /// explicitly.
    pub const fn native_arch() -> Option<Arch> {
        if cfg!(target_arch = "aarch64") {
            Some(Arch::Aarch64)
        } else if cfg!(target_arch = "riscv64") {
            Some(Arch::Riscv64)
        } else if cfg!(target_arch = "x86_64") {
            Some(Arch::X86_64)
        } else {
            None
        }
    }

    /// Check if this is a debug build (thread naming, verbose dumps)
    pub const fn is_debug_build() -> bool {
        cfg!(debug_assertions)
    }
}
