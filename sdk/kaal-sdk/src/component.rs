//! Component callbacks
//!
//! Implement [`Component`] for your driver or service and hand it to a
//! [`crate::Dispatcher`]. The dispatcher owns the receive loop; the
//! component only reacts to events.
//!
//! # Example
//! ```rust,ignore
//! use kaal_sdk::{Channel, Component, Context, Kernel};
//!
//! struct Echo;
//!
//! impl Component for Echo {
//!     fn init<K: Kernel>(&mut self, _ctx: &mut Context<K>) {}
//!
//!     fn notified<K: Kernel>(&mut self, ctx: &mut Context<K>, channel: Channel) {
//!         let _ = ctx.deferred_notify(channel);
//!     }
//! }
//! ```

use crate::context::Context;
use crate::message::{self, Channel};
use sel4_platform::{Kernel, MessageInfo};

/// Component lifecycle and event callbacks
pub trait Component {
    /// Give up the scheduling context after `init` and run only when
    /// signalled
    const PASSIVE: bool = false;

    /// Called exactly once, before the first receive
    fn init<K: Kernel>(&mut self, ctx: &mut Context<K>);

    /// `channel` was signalled
    fn notified<K: Kernel>(&mut self, ctx: &mut Context<K>, channel: Channel);

    /// Protected procedure call on `channel`. The returned tag, with the
    /// message registers set through `ctx`, is the reply.
    fn protected<K: Kernel>(
        &mut self,
        _ctx: &mut Context<K>,
        _channel: Channel,
        _msg: MessageInfo,
    ) -> MessageInfo {
        message::empty()
    }

    /// Child `child` faulted. Return a reply to resume it, or `None` to
    /// leave it blocked (e.g. after restarting or stopping it).
    fn fault<K: Kernel>(&mut self, ctx: &mut Context<K>, child: usize, msg: MessageInfo) -> Option<MessageInfo> {
        log::error!(
            "{}: unhandled fault {:#x} from child {child}",
            ctx.name(),
            msg.label()
        );
        None
    }
}
