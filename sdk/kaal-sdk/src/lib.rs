//! KaaL Component SDK
//!
//! Everything a component links against to run under KaaL.
//!
//! # Modules
//! - [`badge`]: decoding the kernel badge into a [`DispatchEvent`]
//! - [`context`]: per-component state and the channel API
//! - [`component`]: the callbacks a component implements
//! - [`dispatch`]: the receive loop driving those callbacks
//! - [`child`]: restarting and stopping child components
//! - [`restart`]: bounded restart policy and a ready-made restarter
//!
//! # Example
//! ```rust,ignore
//! use kaal_sdk::{Component, Context, Dispatcher, DispatchConfig, Kernel, Channel};
//!
//! struct Timer;
//!
//! impl Component for Timer {
//!     const PASSIVE: bool = true;
//!
//!     fn init<K: Kernel>(&mut self, _ctx: &mut Context<K>) {}
//!
//!     fn notified<K: Kernel>(&mut self, ctx: &mut Context<K>, channel: Channel) {
//!         let _ = ctx.deferred_irq_ack(channel);
//!     }
//! }
//!
//! Dispatcher::new(kernel, "timer", Timer, DispatchConfig::default())?.run()
//! ```

#![no_std]

#[cfg(any(test, feature = "std"))]
#[macro_use]
extern crate std;

extern crate alloc;

use static_assertions::const_assert;

pub mod badge;
pub mod child;
pub mod component;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod restart;

pub use badge::{ChannelSet, DispatchEvent, FAULT_CHANNEL_LIMIT};
pub use component::Component;
pub use context::{Context, DeferredSignal, PdName};
pub use dispatch::{DispatchConfig, Dispatcher};
pub use error::DispatchError;
pub use message::Channel;
pub use restart::{RestartDecision, RestartPolicy, Restarter, DEFAULT_MAX_RESTARTS};
pub use sel4_platform::{Kernel, MessageInfo};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest component name, terminator included
pub const PD_NAME_LEN: usize = 16;

// Every channel must fit in the notification bitmap below the call bit.
const_assert!(sel4_platform::caps::MAX_CHANNELS <= 63);
// Fault badges take bit 62 away from the bitmap.
const_assert!(badge::FAULT_CHANNEL_LIMIT < sel4_platform::caps::MAX_CHANNELS);
// Call badges carry the channel in 6 bits.
const_assert!(sel4_platform::caps::MAX_CHANNELS <= 1 << 6);

/// Install the debug console logger, prefixed with the component's name
pub fn init_logging(
    name: &'static str,
    put_char: sel4_platform::logging::PutChar,
    level: log::LevelFilter,
) -> Result<(), log::SetLoggerError> {
    let logger = alloc::boxed::Box::leak(alloc::boxed::Box::new(
        sel4_platform::logging::DebugConsoleLogger::new(name, level, put_char),
    ));
    logger.install()
}
