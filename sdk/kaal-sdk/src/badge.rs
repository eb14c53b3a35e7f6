//! Badge decoding
//!
//! The kernel hands every receive a single badge word. Its top bits say
//! what kind of event arrived:
//!
//! ```text
//!  63   62   61 .................................. 0
//! +----+----+-------------------------------------+
//! |PPC |FLT |  notification bitmap / channel / id |
//! +----+----+-------------------------------------+
//! ```
//!
//! - **PPC** set: a protected procedure call, channel in the low 6 bits
//! - **FLT** set (when the system routes child faults here): a fault from
//!   child `id`, in the low byte
//! - otherwise every set bit is a notified channel

use crate::message::Channel;
use sel4_platform::caps::MAX_CHANNELS;
use sel4_platform::{Badge, Word};

/// Badge bit marking a protected procedure call
pub const PPC_BIT: Badge = 1 << 63;

/// Badge bit marking a fault from a child component
pub const FAULT_BIT: Badge = 1 << 62;

/// Notification channels left when bit 62 marks faults
pub const FAULT_CHANNEL_LIMIT: Channel = 62;

const PPC_CHANNEL_MASK: Badge = 0x3f;

/// Number of usable notification channels for a badge layout
pub const fn channel_limit(faults: bool) -> Channel {
    if faults {
        FAULT_CHANNEL_LIMIT
    } else {
        MAX_CHANNELS
    }
}
const FAULT_CHILD_MASK: Badge = 0xff;

/// Set of notified channels from one badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSet(Word);

impl ChannelSet {
    pub const fn from_bits(bits: Word) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> Word {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn contains(&self, channel: Channel) -> bool {
        channel < Word::BITS as Channel && self.0 & (1 << channel) != 0
    }

    /// Channels in ascending order
    pub fn iter(&self) -> Channels {
        Channels(self.0)
    }
}

impl IntoIterator for ChannelSet {
    type Item = Channel;
    type IntoIter = Channels;

    fn into_iter(self) -> Channels {
        Channels(self.0)
    }
}

/// Ascending iterator over a [`ChannelSet`]
#[derive(Debug, Clone)]
pub struct Channels(Word);

impl Iterator for Channels {
    type Item = Channel;

    fn next(&mut self) -> Option<Channel> {
        if self.0 == 0 {
            return None;
        }
        let channel = self.0.trailing_zeros() as Channel;
        self.0 &= self.0 - 1;
        Some(channel)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Channels {}

/// One received event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Protected procedure call on `channel`; a reply is owed
    Call { channel: Channel },
    /// Fault from child component `child`
    Fault { child: usize },
    /// Notifications, one per set channel
    Notifications(ChannelSet),
}

impl DispatchEvent {
    /// Decode a badge. With `faults` off, bit 62 is an ordinary channel.
    pub const fn decode(badge: Badge, faults: bool) -> Self {
        if badge & PPC_BIT != 0 {
            Self::Call {
                channel: (badge & PPC_CHANNEL_MASK) as Channel,
            }
        } else if faults && badge & FAULT_BIT != 0 {
            Self::Fault {
                child: (badge & FAULT_CHILD_MASK) as usize,
            }
        } else {
            Self::Notifications(ChannelSet(badge))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn test_notification_bits_ascend() {
        let badge = (1 << 7) | (1 << 2) | (1 << 5);
        let DispatchEvent::Notifications(set) = DispatchEvent::decode(badge, true) else {
            panic!("expected notifications");
        };
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![2, 5, 7]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(5));
        assert!(!set.contains(6));
    }

    #[test]
    fn test_call_channel_in_low_bits() {
        assert_eq!(
            DispatchEvent::decode(PPC_BIT | 0x45, true),
            DispatchEvent::Call { channel: 5 }
        );
    }

    #[test]
    fn test_fault_bit_depends_on_config() {
        assert_eq!(
            DispatchEvent::decode(FAULT_BIT | 3, true),
            DispatchEvent::Fault { child: 3 }
        );
        let DispatchEvent::Notifications(set) = DispatchEvent::decode(FAULT_BIT | 3, false) else {
            panic!("expected notifications");
        };
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 1, 62]);
    }

    #[test]
    fn test_call_wins_over_fault() {
        assert_eq!(
            DispatchEvent::decode(PPC_BIT | FAULT_BIT | 1, true),
            DispatchEvent::Call { channel: 1 }
        );
    }

    #[test]
    fn test_empty_badge() {
        let DispatchEvent::Notifications(set) = DispatchEvent::decode(0, true) else {
            panic!("expected notifications");
        };
        assert!(set.is_empty());
        assert_eq!(set.iter().next(), None);
    }
}
