//! Per-component dispatch state
//!
//! A [`Context`] is owned by the component's one thread and handed to every
//! callback. It carries the component's name, the reply owed to a caller
//! and at most one deferred signal that the next receive can carry.

use crate::error::DispatchError;
use crate::message::Channel;
use crate::PD_NAME_LEN;
use core::fmt;
use sel4_platform::caps::component::{
    BASE_ENDPOINT_CAP, BASE_IRQ_CAP, BASE_OUTPUT_NOTIFICATION_CAP, MONITOR_EP,
};
use sel4_platform::caps::MAX_CHANNELS;
use sel4_platform::{CPtr, FaultLabel, InvocationLabel, Kernel, MessageInfo, ObjectInvocations, Word};

/// A signal postponed until the next receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredSignal {
    Notify(Channel),
    IrqAck(Channel),
    /// Ask the monitor to move our scheduling context to our notification
    Passivate,
}

impl DeferredSignal {
    pub const fn dest(&self) -> CPtr {
        match self {
            Self::Notify(channel) => BASE_OUTPUT_NOTIFICATION_CAP + *channel as CPtr,
            Self::IrqAck(channel) => BASE_IRQ_CAP + *channel as CPtr,
            Self::Passivate => MONITOR_EP,
        }
    }

    pub const fn info(&self) -> MessageInfo {
        match self {
            Self::Notify(_) => MessageInfo::new(0, 0, 0, 0),
            Self::IrqAck(_) => MessageInfo::new(InvocationLabel::IrqAckIrq.into_word(), 0, 0, 0),
            Self::Passivate => MessageInfo::new(FaultLabel::NullFault.into_word(), 0, 0, 1),
        }
    }

    /// Write the message registers, right before sending
    pub(crate) fn stage<K: Kernel + ?Sized>(&self, kernel: &mut K) {
        if let Self::Passivate = self {
            kernel.set_mr(0, 0);
        }
    }
}

/// Component name stored inline, at most `PD_NAME_LEN - 1` bytes
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PdName {
    bytes: [u8; PD_NAME_LEN],
    len: usize,
}

impl PdName {
    pub fn new(name: &str) -> Result<Self, DispatchError> {
        if name.is_empty() || name.len() >= PD_NAME_LEN {
            return Err(DispatchError::InvalidName { len: name.len() });
        }
        let mut bytes = [0; PD_NAME_LEN];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            bytes,
            len: name.len(),
        })
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("<invalid name>")
    }
}

impl fmt::Debug for PdName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for PdName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn check_channel(channel: Channel, limit: Channel) -> Result<(), DispatchError> {
    if channel >= limit {
        return Err(DispatchError::InvalidChannel { channel, max: limit });
    }
    Ok(())
}

/// Dispatch state of one component
pub struct Context<K> {
    pub(crate) kernel: K,
    name: PdName,
    /// Channels below this are usable
    channels: Channel,
    /// Reply to send with the next receive
    pending_reply: Option<MessageInfo>,
    /// A call or fault handler is running and its caller waits for an answer
    answering: bool,
    deferred: Option<DeferredSignal>,
}

impl<K: Kernel> Context<K> {
    pub fn new(kernel: K, name: &str) -> Result<Self, DispatchError> {
        Ok(Self {
            kernel,
            name: PdName::new(name)?,
            channels: MAX_CHANNELS,
            pending_reply: None,
            answering: false,
            deferred: None,
        })
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Number of usable channels
    pub fn channels(&self) -> Channel {
        self.channels
    }

    pub(crate) fn limit_channels(&mut self, limit: Channel) {
        self.channels = limit.min(MAX_CHANNELS);
    }

    fn check_channel(&self, channel: Channel) -> Result<(), DispatchError> {
        check_channel(channel, self.channels)
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    /// Signal the component at the other end of `channel`
    pub fn notify(&mut self, channel: Channel) -> Result<(), DispatchError> {
        self.check_channel(channel)?;
        self.kernel
            .signal(BASE_OUTPUT_NOTIFICATION_CAP + channel as CPtr);
        Ok(())
    }

    /// Acknowledge the interrupt delivered on `channel`
    pub fn irq_ack(&mut self, channel: Channel) -> Result<(), DispatchError> {
        self.check_channel(channel)?;
        self.kernel
            .irq_handler_ack(BASE_IRQ_CAP + channel as CPtr)?;
        Ok(())
    }

    /// Protected procedure call into the component at the other end of
    /// `channel`. Message registers must be staged with [`Self::set_mr`].
    pub fn ppcall(&mut self, channel: Channel, info: MessageInfo) -> Result<MessageInfo, DispatchError> {
        self.check_channel(channel)?;
        Ok(self.kernel.call(BASE_ENDPOINT_CAP + channel as CPtr, info))
    }

    /// Like [`Self::notify`], sent together with the next receive
    pub fn deferred_notify(&mut self, channel: Channel) -> Result<(), DispatchError> {
        self.check_channel(channel)?;
        self.defer(DeferredSignal::Notify(channel));
        Ok(())
    }

    /// Like [`Self::irq_ack`], sent together with the next receive
    pub fn deferred_irq_ack(&mut self, channel: Channel) -> Result<(), DispatchError> {
        self.check_channel(channel)?;
        self.defer(DeferredSignal::IrqAck(channel));
        Ok(())
    }

    /// Give up the scheduling context once this step's receive is reached.
    ///
    /// Refused while a caller waits for a reply.
    pub fn request_passivation(&mut self) -> Result<(), DispatchError> {
        if self.reply_owed() {
            return Err(DispatchError::ReplyOutstanding);
        }
        if self.deferred == Some(DeferredSignal::Passivate) {
            return Err(DispatchError::PassivationPending);
        }
        self.defer(DeferredSignal::Passivate);
        Ok(())
    }

    pub fn mr(&self, index: usize) -> Word {
        self.kernel.mr(index)
    }

    pub fn set_mr(&mut self, index: usize, value: Word) {
        self.kernel.set_mr(index, value);
    }

    /// A caller is blocked waiting for this component to answer
    pub fn reply_owed(&self) -> bool {
        self.answering || self.pending_reply.is_some()
    }

    pub fn deferred(&self) -> Option<DeferredSignal> {
        self.deferred
    }

    /// Only one signal can ride on a receive. The earlier one goes out now,
    /// unless it is a passivation request, which must stay last.
    fn defer(&mut self, signal: DeferredSignal) {
        match self.deferred {
            Some(DeferredSignal::Passivate) if signal != DeferredSignal::Passivate => {
                self.send_now(signal);
            }
            _ => {
                if let Some(previous) = self.deferred.replace(signal) {
                    self.send_now(previous);
                }
            }
        }
    }

    pub(crate) fn send_now(&mut self, signal: DeferredSignal) {
        signal.stage(&mut self.kernel);
        self.kernel.nb_send(signal.dest(), signal.info());
    }

    pub(crate) fn begin_answer(&mut self) {
        self.answering = true;
    }

    pub(crate) fn finish_answer(&mut self, reply: Option<MessageInfo>) {
        self.answering = false;
        self.pending_reply = reply;
    }

    pub(crate) fn take_pending_reply(&mut self) -> Option<MessageInfo> {
        self.pending_reply.take()
    }

    pub(crate) fn take_deferred(&mut self) -> Option<DeferredSignal> {
        self.deferred.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sel4_mock::{MockKernel, Op};
    use sel4_platform::Arch;

    fn context() -> Context<MockKernel> {
        Context::new(MockKernel::new(Arch::Aarch64), "client").unwrap()
    }

    #[test]
    fn test_name_limits() {
        assert!(PdName::new("").is_err());
        assert_eq!(
            PdName::new("sixteen-chars-xx").unwrap_err(),
            DispatchError::InvalidName { len: 16 }
        );
        assert_eq!(PdName::new("fifteen-chars-x").unwrap().as_str(), "fifteen-chars-x");
    }

    #[test]
    fn test_notify_targets_output_notification() {
        let mut ctx = context();
        ctx.notify(3).unwrap();
        assert_eq!(ctx.kernel().ops(), &[Op::Signal { dest: 13 }]);
        assert_eq!(
            ctx.notify(63),
            Err(DispatchError::InvalidChannel {
                channel: 63,
                max: 63
            })
        );
    }

    #[test]
    fn test_irq_ack_invokes_handler() {
        let mut ctx = context();
        ctx.irq_ack(2).unwrap();
        let (dest, label, ..) = ctx.kernel().calls().next().unwrap();
        assert_eq!(dest, BASE_IRQ_CAP + 2);
        assert_eq!(label, InvocationLabel::IrqAckIrq.into_word());
    }

    #[test]
    fn test_ppcall_returns_reply() {
        let mut ctx = context();
        ctx.kernel_mut()
            .set_call_reply(BASE_ENDPOINT_CAP + 1, MessageInfo::new(7, 0, 0, 2));
        ctx.set_mr(0, 42);
        let reply = ctx.ppcall(1, MessageInfo::new(1, 0, 0, 1)).unwrap();
        assert_eq!(reply.label(), 7);
        assert_eq!(ctx.kernel().calls().next().unwrap().3, &[42]);
    }

    #[test]
    fn test_second_deferred_flushes_first() {
        let mut ctx = context();
        ctx.deferred_notify(1).unwrap();
        ctx.deferred_irq_ack(4).unwrap();
        assert_eq!(ctx.deferred(), Some(DeferredSignal::IrqAck(4)));
        assert!(matches!(ctx.kernel().ops(), [Op::NbSend { dest: 11, .. }]));
    }

    #[test]
    fn test_passivation_stays_deferred() {
        let mut ctx = context();
        ctx.request_passivation().unwrap();
        ctx.deferred_notify(1).unwrap();
        assert_eq!(ctx.deferred(), Some(DeferredSignal::Passivate));
        assert!(matches!(ctx.kernel().ops(), [Op::NbSend { dest: 11, .. }]));
        assert_eq!(ctx.request_passivation(), Err(DispatchError::PassivationPending));
    }

    #[test]
    fn test_passivation_refused_while_answering() {
        let mut ctx = context();
        ctx.begin_answer();
        assert_eq!(ctx.request_passivation(), Err(DispatchError::ReplyOutstanding));
        ctx.finish_answer(Some(MessageInfo::default()));
        assert_eq!(ctx.request_passivation(), Err(DispatchError::ReplyOutstanding));
        ctx.take_pending_reply();
        assert_eq!(ctx.request_passivation(), Ok(()));
    }

    #[test]
    fn test_passivation_message() {
        assert_eq!(DeferredSignal::Passivate.dest(), MONITOR_EP);
        let info = DeferredSignal::Passivate.info();
        assert_eq!(info.label(), 0);
        assert_eq!(info.length(), 1);
    }
}
