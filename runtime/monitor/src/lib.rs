//! # KaaL Fault Monitor
//!
//! The single place every component fault is handled. All components share
//! one fault endpoint; the badge a fault arrives with names the sender.
//!
//! ## Responsibilities
//! - **Passivation**: a null fault is a request from a component to give
//!   its scheduling context to its notification object
//! - **Diagnosis**: decode the fault for the running architecture, dump
//!   the registers, flag likely stack overflows
//! - **Recovery**: consult a [`Recovery`] policy (report only, restart,
//!   stop or resume)
//!
//! Faults are handled strictly one at a time in the order they are received.
//! Failing to attribute or inspect a fault is fatal: [`Monitor::run`] logs the
//! error and halts.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kaal_monitor::{Monitor, MonitorConfig, ComponentTable, ReportOnly};
//!
//! let mut table = ComponentTable::new();
//! table.insert(0, "serial_driver", 0x0000_0080_0000_0000)?;
//! let mut monitor = Monitor::new(kernel, table, MonitorConfig::default(), ReportOnly);
//! monitor.start();
//! monitor.run()
//! ```

#![no_std]

#[cfg(any(test, feature = "std"))]
#[macro_use]
extern crate std;

extern crate alloc;

use static_assertions::const_assert;

pub mod boot;
pub mod component;
pub mod error;
pub mod fault;
#[cfg(feature = "std")]
pub mod image;
pub mod monitor;
pub mod recovery;
pub mod report;

pub use boot::{boot, run_system, BootImage};
pub use component::{ComponentIdentity, ComponentName, ComponentSpec, ComponentTable};
pub use error::MonitorError;
#[cfg(feature = "std")]
pub use error::ImageError;
pub use fault::{FaultDecoder, FaultEvent, FaultKind};
#[cfg(feature = "std")]
pub use image::SystemImage;
pub use monitor::{Monitor, Outcome};
pub use recovery::{Recovery, RecoveryAction, ReportOnly};
pub use report::FaultReport;

pub use sel4_platform::caps::MAX_COMPONENTS;

/// Longest component name the monitor stores, terminator included
pub const MAX_NAME_LEN: usize = 64;

/// Size of the unmapped guard page below every component stack
pub const STACK_GUARD_SIZE: sel4_platform::Word = 0x1000;

// Badges are id + 1 and must not reach the fault/call bits a component's
// own dispatch loop would interpret.
const_assert!(MAX_COMPONENTS < (1 << 8));
const_assert!(MAX_NAME_LEN >= kaal_sdk::PD_NAME_LEN);

/// Monitor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Architecture used to decode faults and register sets
    pub arch: sel4_platform::Arch,
    /// Kernel built with hypervisor support (vCPU faults)
    pub hypervisor: bool,
    /// Name component threads through the kernel debug interface at start
    pub name_threads: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            arch: sel4_platform::config::native_arch().unwrap_or(sel4_platform::Arch::Aarch64),
            hypervisor: false,
            name_threads: sel4_platform::config::is_debug_build(),
        }
    }
}

/// Install the debug console logger with the `MON` prefix
pub fn init_logging(
    put_char: sel4_platform::logging::PutChar,
    level: log::LevelFilter,
) -> Result<(), log::SetLoggerError> {
    let logger = alloc::boxed::Box::leak(alloc::boxed::Box::new(
        sel4_platform::logging::DebugConsoleLogger::new("MON", level, put_char),
    ));
    logger.install()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_names_threads_in_debug() {
        let config = MonitorConfig::default();
        assert_eq!(config.name_threads, cfg!(debug_assertions));
        assert!(!config.hypervisor);
    }
}
