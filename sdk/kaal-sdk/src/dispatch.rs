//! Event dispatch loop
//!
//! ```text
//!   init() ──► [deferred passivation]
//!                 │
//!   ┌─────────────▼──────────────────────────────┐
//!   │ receive                                     │
//!   │   reply owed      ─► ReplyRecv              │
//!   │   signal deferred ─► NBSendRecv (folded)    │
//!   │   otherwise       ─► Recv                   │
//!   └─────────────┬──────────────────────────────┘
//!                 ▼
//!        decode badge ─► Call / Fault / Notifications
//!                 │
//!                 └──► handlers, then back to receive
//! ```
//!
//! Exactly one received event is handled per [`Dispatcher::step`].

use crate::badge::{self, DispatchEvent};
use crate::component::Component;
use crate::context::Context;
use crate::error::DispatchError;
use sel4_platform::caps::component::{INPUT_CAP, REPLY_CAP};
use sel4_platform::{Badge, Kernel, MessageInfo};

/// Dispatch loop configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Badge bit 62 marks faults from child components. Channel 62 is then
    /// unusable for notifications.
    pub faults: bool,
    /// Send a deferred signal in the same syscall as the next receive.
    /// When off it is sent first, then a plain receive follows.
    pub fold_deferred: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            faults: true,
            fold_deferred: true,
        }
    }
}

/// Drives one component: receive, decode, call back, repeat
pub struct Dispatcher<K, C> {
    ctx: Context<K>,
    component: C,
    config: DispatchConfig,
    started: bool,
}

impl<K: Kernel, C: Component> Dispatcher<K, C> {
    pub fn new(kernel: K, name: &str, component: C, config: DispatchConfig) -> Result<Self, DispatchError> {
        let mut ctx = Context::new(kernel, name)?;
        ctx.limit_channels(badge::channel_limit(config.faults));
        Ok(Self {
            ctx,
            component,
            config,
            started: false,
        })
    }

    pub fn context(&self) -> &Context<K> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context<K> {
        &mut self.ctx
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub fn component_mut(&mut self) -> &mut C {
        &mut self.component
    }

    /// Run `init` (once) and queue the passivation request of a passive
    /// component
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.component.init(&mut self.ctx);
        if C::PASSIVE {
            if let Err(err) = self.ctx.request_passivation() {
                log::warn!("{}: passivation not requested: {err}", self.ctx.name());
            }
        }
    }

    /// Handle events forever
    pub fn run(&mut self) -> ! {
        self.start();
        loop {
            self.step();
        }
    }

    /// Receive once and handle the event that arrived
    pub fn step(&mut self) -> DispatchEvent {
        self.start();
        let (info, badge) = self.receive();
        let event = DispatchEvent::decode(badge, self.config.faults);
        self.handle(event, info);
        event
    }

    fn receive(&mut self) -> (MessageInfo, Badge) {
        let reply = self.ctx.take_pending_reply();
        let deferred = self.ctx.take_deferred();
        match (reply, deferred) {
            (Some(reply), deferred) => {
                // The reply needs the receive; a deferred signal goes first.
                if let Some(signal) = deferred {
                    self.ctx.send_now(signal);
                }
                self.ctx.kernel.reply_recv(INPUT_CAP, reply, REPLY_CAP)
            }
            (None, Some(signal)) if self.config.fold_deferred => {
                signal.stage(&mut self.ctx.kernel);
                self.ctx
                    .kernel
                    .nb_send_recv(signal.dest(), signal.info(), INPUT_CAP, REPLY_CAP)
            }
            (None, Some(signal)) => {
                self.ctx.send_now(signal);
                self.ctx.kernel.recv(INPUT_CAP, REPLY_CAP)
            }
            (None, None) => self.ctx.kernel.recv(INPUT_CAP, REPLY_CAP),
        }
    }

    fn handle(&mut self, event: DispatchEvent, info: MessageInfo) {
        match event {
            DispatchEvent::Call { channel } => {
                self.ctx.begin_answer();
                let reply = self.component.protected(&mut self.ctx, channel, info);
                self.ctx.finish_answer(Some(reply));
            }
            DispatchEvent::Fault { child } => {
                self.ctx.begin_answer();
                let reply = self.component.fault(&mut self.ctx, child, info);
                self.ctx.finish_answer(reply);
            }
            DispatchEvent::Notifications(channels) => {
                for channel in channels {
                    self.component.notified(&mut self.ctx, channel);
                }
            }
        }
    }
}
