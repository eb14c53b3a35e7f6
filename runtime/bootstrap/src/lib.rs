//! # KaaL Bootstrap
//!
//! Builds the whole capability space of a static KaaL system by replaying
//! the kernel invocations the build tool recorded.
//!
//! ## Pipeline
//!
//! 1. **Untyped reconciliation**: the kernel's boot-time untyped list must
//!    match the layout the build tool assumed, or every hardcoded physical
//!    address in the stream is wrong ([`untyped::reconcile`])
//! 2. **Bootstrap phase**: a small stream embedded in the image, bounded by
//!    [`BOOTSTRAP_INVOCATION_WORDS`], maps in the system stream
//! 3. **System phase**: the rest of the system, arbitrarily large
//!
//! Replay is strictly sequential and any failed invocation is fatal.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kaal_bootstrap::{replay, StreamBuilder, Invocation};
//! use sel4_platform::InvocationLabel;
//!
//! let mut builder = StreamBuilder::new();
//! builder.push(Invocation::new(InvocationLabel::TcbResume, 10))?;
//! let stream = builder.finish();
//! replay::replay_all(&mut kernel, &stream.stream())?;
//! ```

#![no_std]

#[cfg(any(test, feature = "std"))]
#[macro_use]
extern crate std;

extern crate alloc;

use static_assertions::const_assert;

pub mod builder;
pub mod error;
pub mod replay;
pub mod stream;
pub mod untyped;

pub use builder::{BootstrapStream, Increments, Invocation, StreamBuf, StreamBuilder};
pub use error::{BootError, BootMismatch, CapacityError, EncodeError, ReplayError, UntypedField};
pub use replay::{boot, replay_all, replay_one, BootSummary, ReplayStats, SystemStreamSource};
pub use stream::{InvocationRecord, InvocationStream};
pub use untyped::{reconcile, BootInfoUntypeds, SlotRegion, UntypedInfo, UntypedRegion};

/// Capacity of the bootstrap stream, in words
pub const BOOTSTRAP_INVOCATION_WORDS: usize = 150;

/// Bytes of the initial image reserved for the bootstrap stream
pub const BOOTSTRAP_IMAGE_BUDGET: usize = 0x1000;

const_assert!(BOOTSTRAP_INVOCATION_WORDS * core::mem::size_of::<sel4_platform::Word>() <= BOOTSTRAP_IMAGE_BUDGET);
// The smallest record (tag + service) must fit.
const_assert!(BOOTSTRAP_INVOCATION_WORDS >= 2);
