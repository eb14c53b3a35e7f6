//! Integration tests for the component dispatch loop
//!
//! Each test drives a [`Dispatcher`] against the recording mock kernel and
//! checks both the callbacks that ran and the syscalls that were issued.

use kaal_sdk::badge::{FAULT_BIT, PPC_BIT};
use kaal_sdk::*;
use sel4_mock::{Incoming, MockKernel, Op};
use sel4_platform::caps::component::{
    BASE_OUTPUT_NOTIFICATION_CAP, BASE_PD_TCB_CAP, INPUT_CAP, MONITOR_EP,
};
use sel4_platform::{Arch, InvocationLabel, Word};

#[derive(Default)]
struct Recorder {
    inits: usize,
    notified: Vec<Channel>,
    calls: Vec<(Channel, Word)>,
    passivation: Option<Result<(), DispatchError>>,
}

impl Component for Recorder {
    fn init<K: Kernel>(&mut self, _ctx: &mut Context<K>) {
        self.inits += 1;
    }

    fn notified<K: Kernel>(&mut self, ctx: &mut Context<K>, channel: Channel) {
        self.notified.push(channel);
        if channel == 9 {
            ctx.deferred_notify(1).unwrap();
        }
    }

    fn protected<K: Kernel>(&mut self, ctx: &mut Context<K>, channel: Channel, msg: MessageInfo) -> MessageInfo {
        self.calls.push((channel, ctx.mr(0)));
        self.passivation = Some(ctx.request_passivation());
        let doubled = ctx.mr(0) * 2;
        ctx.set_mr(0, doubled);
        message::msginfo_new(msg.label() + 1, 1)
    }
}

#[derive(Default)]
struct Passive(Recorder);

impl Component for Passive {
    const PASSIVE: bool = true;

    fn init<K: Kernel>(&mut self, ctx: &mut Context<K>) {
        self.0.init(ctx);
    }

    fn notified<K: Kernel>(&mut self, ctx: &mut Context<K>, channel: Channel) {
        self.0.notified(ctx, channel);
    }
}

fn dispatcher<C: Component>(component: C, config: DispatchConfig) -> Dispatcher<MockKernel, C> {
    Dispatcher::new(MockKernel::new(Arch::Aarch64), "client", component, config).unwrap()
}

fn receives(kernel: &MockKernel) -> Vec<&Op> {
    kernel
        .ops()
        .iter()
        .filter(|op| matches!(op, Op::Recv { .. } | Op::ReplyRecv { .. } | Op::NbSendRecv { .. }))
        .collect()
}

/// Bits {2,5,7}: notified(2), notified(5), notified(7), one receive
#[test]
fn test_notification_fan_out_in_one_step() {
    let mut d = dispatcher(Recorder::default(), DispatchConfig::default());
    d.context().kernel().push(Incoming::notification((1 << 2) | (1 << 5) | (1 << 7)));

    let event = d.step();
    assert!(matches!(event, DispatchEvent::Notifications(set) if set.len() == 3));
    assert_eq!(d.component().notified, vec![2, 5, 7]);
    assert_eq!(receives(d.context().kernel()).len(), 1);
}

#[test]
fn test_init_runs_once() {
    let mut d = dispatcher(Recorder::default(), DispatchConfig::default());
    d.context().kernel().push(Incoming::notification(1));
    d.context().kernel().push(Incoming::notification(2));
    d.start();
    d.step();
    d.step();
    assert_eq!(d.component().inits, 1);
    assert_eq!(d.component().notified, vec![0, 1]);
}

#[test]
fn test_call_reply_sent_with_next_receive() {
    let mut d = dispatcher(Recorder::default(), DispatchConfig::default());
    d.context().kernel().push(Incoming::message(4, PPC_BIT | 3, &[21]));
    d.context().kernel().push(Incoming::notification(1));

    assert_eq!(d.step(), DispatchEvent::Call { channel: 3 });
    assert_eq!(d.component().calls, vec![(3, 21)]);
    assert!(d.context().reply_owed());

    d.step();
    let ops = receives(d.context().kernel());
    assert!(matches!(ops[0], Op::Recv { src: INPUT_CAP }));
    let Op::ReplyRecv { src, info, mrs } = ops[1] else {
        panic!("expected a reply, got {:?}", ops[1]);
    };
    assert_eq!(*src, INPUT_CAP);
    assert_eq!(info.label(), 5);
    assert_eq!(mrs, &[42]);
    assert!(!d.context().reply_owed());
}

#[test]
fn test_passivation_refused_inside_call() {
    let mut d = dispatcher(Recorder::default(), DispatchConfig::default());
    d.context().kernel().push(Incoming::message(0, PPC_BIT, &[1]));
    d.step();
    assert_eq!(d.component().passivation, Some(Err(DispatchError::ReplyOutstanding)));
    assert_eq!(d.context().deferred(), None);
}

#[test]
fn test_passive_component_folds_request_into_first_receive() {
    let mut d = dispatcher(Passive::default(), DispatchConfig::default());
    d.context().kernel().push(Incoming::notification(1 << 4));
    d.step();

    let ops = receives(d.context().kernel());
    assert_eq!(ops.len(), 1);
    let Op::NbSendRecv { dest, info, mrs, src } = ops[0] else {
        panic!("expected NBSendRecv, got {:?}", ops[0]);
    };
    assert_eq!(*dest, MONITOR_EP);
    assert_eq!(*src, INPUT_CAP);
    assert_eq!(info.label(), 0);
    assert_eq!(mrs, &[0]);
    assert_eq!(d.component().0.notified, vec![4]);
}

#[test]
fn test_deferred_notify_folded() {
    let mut d = dispatcher(Recorder::default(), DispatchConfig::default());
    d.context().kernel().push(Incoming::notification(1 << 9));
    d.context().kernel().push(Incoming::notification(1));
    d.step();
    d.step();

    let ops = d.context().kernel().ops();
    assert!(matches!(
        ops.last(),
        Some(Op::NbSendRecv { dest, .. }) if *dest == BASE_OUTPUT_NOTIFICATION_CAP + 1
    ));
    assert!(!ops.iter().any(|op| matches!(op, Op::NbSend { .. } | Op::Signal { .. })));
}

#[test]
fn test_unfolded_signal_precedes_plain_receive() {
    let config = DispatchConfig {
        fold_deferred: false,
        ..DispatchConfig::default()
    };
    let mut d = dispatcher(Passive::default(), config);
    d.context().kernel().push(Incoming::notification(1));
    d.step();

    let ops = d.context().kernel().ops();
    assert!(matches!(ops[0], Op::NbSend { dest: MONITOR_EP, .. }));
    assert!(matches!(ops[1], Op::Recv { src: INPUT_CAP }));
}

/// Eleven faults from one child: ten restarts, then a stop
#[test]
fn test_restarter_bounds_restarts() {
    let policy = RestartPolicy::new(0x20_0000);
    let mut d = dispatcher(Restarter::new(policy), DispatchConfig::default());
    for _ in 0..11 {
        d.context().kernel().push(Incoming::message(6, FAULT_BIT | 2, &[0, 0, 0, 0]));
    }
    for _ in 0..11 {
        assert_eq!(d.step(), DispatchEvent::Fault { child: 2 });
    }

    let labels: Vec<Word> = d
        .context()
        .kernel()
        .calls()
        .filter(|(dest, ..)| *dest == BASE_PD_TCB_CAP + 2)
        .map(|(_, label, ..)| label)
        .collect();
    let mut expected = vec![InvocationLabel::TcbWriteRegisters.into_word(); 10];
    expected.push(InvocationLabel::TcbSuspend.into_word());
    assert_eq!(labels, expected);
    assert!(d.context().kernel().is_suspended(BASE_PD_TCB_CAP + 2));
    assert_eq!(d.component().decisions(), 11);

    // Faults are never replied to: restarting replaces the blocked thread.
    assert!(!receives(d.context().kernel())
        .iter()
        .any(|op| matches!(op, Op::ReplyRecv { .. })));
}

#[test]
fn test_health_signal_resets_counter() {
    let restarter = Restarter::new(RestartPolicy::with_max_restarts(0x100, 1))
        .health_channel(5, 1)
        .unwrap();
    let mut d = dispatcher(restarter, DispatchConfig::default());
    d.context().kernel().push(Incoming::message(6, FAULT_BIT | 1, &[]));
    d.context().kernel().push(Incoming::notification(1 << 5));
    d.context().kernel().push(Incoming::message(6, FAULT_BIT | 1, &[]));
    d.step();
    d.step();
    d.step();
    assert!(!d.context().kernel().is_suspended(BASE_PD_TCB_CAP + 1));
    assert_eq!(d.component().policy().restarts(1), 1);
}

/// A signal on a channel numbered like the child is not a health report
#[test]
fn test_unrelated_notification_keeps_restart_count() {
    let policy = RestartPolicy::new(0x20_0000);
    let mut d = dispatcher(Restarter::new(policy), DispatchConfig::default());
    for _ in 0..11 {
        d.context().kernel().push(Incoming::message(6, FAULT_BIT | 2, &[]));
        d.context().kernel().push(Incoming::notification(1 << 2));
    }
    for _ in 0..22 {
        d.step();
    }
    assert_eq!(d.component().policy().restarts(2), 10);
    assert!(d.context().kernel().is_suspended(BASE_PD_TCB_CAP + 2));
}

#[test]
fn test_channel_62_reserved_for_fault_badges() {
    let mut d = dispatcher(Recorder::default(), DispatchConfig::default());
    assert_eq!(d.context().channels(), FAULT_CHANNEL_LIMIT);
    assert_eq!(
        d.context_mut().notify(62),
        Err(DispatchError::InvalidChannel {
            channel: 62,
            max: 62
        })
    );
    assert_eq!(
        d.context_mut().deferred_notify(62),
        Err(DispatchError::InvalidChannel {
            channel: 62,
            max: 62
        })
    );

    let config = DispatchConfig {
        faults: false,
        ..DispatchConfig::default()
    };
    let mut d = dispatcher(Recorder::default(), config);
    assert_eq!(d.context_mut().notify(62), Ok(()));
    assert!(matches!(
        d.context().kernel().ops(),
        [Op::Signal { dest }] if *dest == BASE_OUTPUT_NOTIFICATION_CAP + 62
    ));
}
