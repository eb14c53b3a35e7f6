//! System start
//!
//! The monitor is the first thread of a KaaL system. It builds every other
//! component from the invocation streams, then spends the rest of its life
//! in the fault loop.

use crate::component::ComponentTable;
use crate::error::MonitorError;
use crate::monitor::Monitor;
use crate::recovery::Recovery;
use crate::MonitorConfig;
use kaal_bootstrap::{BootInfoUntypeds, BootSummary, BootstrapStream, SystemStreamSource, UntypedInfo};
use sel4_platform::Kernel;

/// What the initial image hands the monitor
#[derive(Debug, Clone, Copy)]
pub struct BootImage<'a> {
    /// Untyped memory as reported in the kernel's boot info
    pub untypeds: BootInfoUntypeds<'a>,
    /// Untyped memory the build tool planned for
    pub expected: &'a UntypedInfo,
    pub bootstrap: &'a BootstrapStream,
}

/// Reconcile untypeds and replay both invocation streams
pub fn boot<K, S>(kernel: &mut K, image: &BootImage<'_>, source: &mut S) -> Result<BootSummary, MonitorError>
where
    K: Kernel + ?Sized,
    S: SystemStreamSource + ?Sized,
{
    let summary = kaal_bootstrap::boot(
        kernel,
        &image.untypeds,
        image.expected,
        image.bootstrap,
        source,
    )?;
    Ok(summary)
}

/// Boot the system and run the monitor. A boot failure halts before any
/// component runs.
pub fn run_system<K, S, R>(
    mut kernel: K,
    image: &BootImage<'_>,
    source: &mut S,
    table: ComponentTable,
    config: MonitorConfig,
    recovery: R,
) -> !
where
    K: Kernel,
    S: SystemStreamSource + ?Sized,
    R: Recovery,
{
    if let Err(err) = boot(&mut kernel, image, source) {
        log::error!("{err}");
        kernel.halt();
    }

    let mut monitor = Monitor::new(kernel, table, config, recovery);
    monitor.start();
    monitor.run()
}
