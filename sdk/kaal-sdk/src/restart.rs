//! Bounded restart policy
//!
//! A faulting child is restarted at its entry point until it has been
//! restarted `max_restarts` times in a row; the next fault stops it. The
//! count starts over when the owner calls [`RestartPolicy::reset`], e.g.
//! once the child reports that it is healthy again.

use crate::component::Component;
use crate::badge::FAULT_CHANNEL_LIMIT;
use crate::child::child_tcb;
use crate::context::{check_channel, Context};
use crate::error::DispatchError;
use crate::message::Channel;
use sel4_platform::caps::{MAX_CHANNELS, MAX_COMPONENTS};
use sel4_platform::{Kernel, MessageInfo, Word};

/// Consecutive restarts allowed before a child is stopped
pub const DEFAULT_MAX_RESTARTS: u32 = 10;

/// What to do with a faulting child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Restart { entry: Word },
    Stop,
}

/// Per-child consecutive restart counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    max_restarts: u32,
    entry: Word,
    restarts: [u32; MAX_COMPONENTS],
}

impl RestartPolicy {
    pub const fn new(entry: Word) -> Self {
        Self::with_max_restarts(entry, DEFAULT_MAX_RESTARTS)
    }

    pub const fn with_max_restarts(entry: Word, max_restarts: u32) -> Self {
        Self {
            max_restarts,
            entry,
            restarts: [0; MAX_COMPONENTS],
        }
    }

    pub const fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    pub const fn entry(&self) -> Word {
        self.entry
    }

    /// Record a fault from `child` and decide its fate
    pub fn decide(&mut self, child: usize) -> RestartDecision {
        let Some(count) = self.restarts.get_mut(child) else {
            return RestartDecision::Stop;
        };
        if *count < self.max_restarts {
            *count += 1;
            RestartDecision::Restart { entry: self.entry }
        } else {
            RestartDecision::Stop
        }
    }

    /// Restarts of `child` since its last reset
    pub fn restarts(&self, child: usize) -> u32 {
        self.restarts.get(child).copied().unwrap_or(0)
    }

    pub fn reset(&mut self, child: usize) {
        if let Some(count) = self.restarts.get_mut(child) {
            *count = 0;
        }
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Ready-made parent component that applies a [`RestartPolicy`] to the
/// faults of its children.
///
/// Notifications leave the counters alone unless the channel was registered
/// with [`Restarter::health_channel`]; a signal on such a channel resets the
/// counter of the child it belongs to.
#[derive(Debug, Clone)]
pub struct Restarter {
    policy: RestartPolicy,
    health: [Option<usize>; MAX_CHANNELS],
    decisions: u64,
}

impl Restarter {
    pub const fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            health: [None; MAX_CHANNELS],
            decisions: 0,
        }
    }

    /// Treat a signal on `channel` as `child` reporting healthy
    pub fn health_channel(mut self, channel: Channel, child: usize) -> Result<Self, DispatchError> {
        // A restarter always receives fault badges.
        check_channel(channel, FAULT_CHANNEL_LIMIT)?;
        child_tcb(child)?;
        self.health[channel] = Some(child);
        Ok(self)
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut RestartPolicy {
        &mut self.policy
    }

    /// Faults handled so far
    pub fn decisions(&self) -> u64 {
        self.decisions
    }
}

impl Component for Restarter {
    fn init<K: Kernel>(&mut self, ctx: &mut Context<K>) {
        log::info!(
            "{}: restarting children up to {} times",
            ctx.name(),
            self.policy.max_restarts()
        );
    }

    fn notified<K: Kernel>(&mut self, ctx: &mut Context<K>, channel: Channel) {
        if let Some(child) = self.health.get(channel).copied().flatten() {
            log::debug!("{}: child {child} healthy, restart count cleared", ctx.name());
            self.policy.reset(child);
        }
    }

    fn fault<K: Kernel>(&mut self, ctx: &mut Context<K>, child: usize, msg: MessageInfo) -> Option<MessageInfo> {
        self.decisions += 1;
        let result = match self.policy.decide(child) {
            RestartDecision::Restart { entry } => {
                log::warn!(
                    "{}: child {child} faulted (label {:#x}), restart {}/{}",
                    ctx.name(),
                    msg.label(),
                    self.policy.restarts(child),
                    self.policy.max_restarts()
                );
                ctx.pd_restart(child, entry)
            }
            RestartDecision::Stop => {
                log::error!("{}: child {child} keeps faulting, stopping it", ctx.name());
                ctx.pd_stop(child)
            }
        };
        if let Err(err) = result {
            log::error!("{}: could not control child {child}: {err}", ctx.name());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn test_eleven_faults_give_ten_restarts_then_stop() {
        let mut policy = RestartPolicy::new(0x20_0000);
        let decisions: Vec<_> = (0..11).map(|_| policy.decide(4)).collect();
        let mut expected = vec![RestartDecision::Restart { entry: 0x20_0000 }; 10];
        expected.push(RestartDecision::Stop);
        assert_eq!(decisions, expected);
        assert_eq!(policy.decide(4), RestartDecision::Stop);
    }

    #[test]
    fn test_counters_are_per_child() {
        let mut policy = RestartPolicy::with_max_restarts(0x100, 1);
        assert_eq!(policy.decide(0), RestartDecision::Restart { entry: 0x100 });
        assert_eq!(policy.decide(1), RestartDecision::Restart { entry: 0x100 });
        assert_eq!(policy.decide(0), RestartDecision::Stop);
        assert_eq!(policy.restarts(1), 1);
    }

    #[test]
    fn test_reset() {
        let mut policy = RestartPolicy::with_max_restarts(0x100, 1);
        policy.decide(3);
        policy.reset(3);
        assert_eq!(policy.restarts(3), 0);
        assert_eq!(policy.decide(3), RestartDecision::Restart { entry: 0x100 });
    }

    #[test]
    fn test_health_channel_bounds() {
        let restarter = Restarter::new(RestartPolicy::default());
        assert!(matches!(
            restarter.clone().health_channel(62, 0),
            Err(DispatchError::InvalidChannel { channel: 62, max: 62 })
        ));
        assert!(matches!(
            restarter.clone().health_channel(3, MAX_COMPONENTS),
            Err(DispatchError::InvalidChild { .. })
        ));
        let restarter = restarter.health_channel(3, 7).unwrap();
        assert_eq!(restarter.health[3], Some(7));
        assert_eq!(restarter.health[7], None);
    }

    #[test]
    fn test_out_of_range_child_stops() {
        let mut policy = RestartPolicy::default();
        assert_eq!(policy.decide(MAX_COMPONENTS), RestartDecision::Stop);
        assert_eq!(policy.restarts(MAX_COMPONENTS), 0);
    }
}
