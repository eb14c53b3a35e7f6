//! ⚠️  MOCK seL4 Kernel for host-side testing
//!
//! # WARNING: This is NOT the real seL4!
//!
//! [`MockKernel`] implements [`sel4_platform::Kernel`] on the host so the
//! replay engine, the fault monitor and the dispatch loop can be driven in
//! ordinary `cargo test` runs.
//!
//! ## What it does
//!
//! - Records every syscall in order ([`Op`])
//! - Feeds receives from a crossbeam channel, so tests (or several test
//!   threads standing in for components) script what the kernel delivers
//! - Emulates the few object methods the runtime relies on: TCB register
//!   read/write, suspend/resume, scheduling-context bind/unbind
//! - Injects invocation failures on demand
//!
//! ## What it does not do
//!
//! - No capability space: any slot is a valid object
//! - No real blocking semantics beyond waiting on the inbox channel
//! - `halt` panics so tests can observe fatal paths

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use sel4_platform::{
    Arch, Badge, CPtr, InvocationLabel, Kernel, KernelError, MessageInfo, UserContext, Word,
};
use std::collections::{HashMap, HashSet};
use std::string::String;
use std::time::Duration;
use std::vec::Vec;

/// Number of message registers in the IPC buffer
pub const IPC_BUFFER_WORDS: usize = sel4_platform::types::MSG_MAX_LENGTH;

/// Number of extra-capability slots in the IPC buffer
pub const IPC_BUFFER_CAPS: usize = 4;

/// How long a receive waits for the inbox before the test is declared stuck
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A message the kernel delivers to a receiving thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub info: MessageInfo,
    pub badge: Badge,
    pub mrs: Vec<Word>,
}

impl Incoming {
    /// A pure notification: empty tag, badge carries the bits
    pub fn notification(badge: Badge) -> Self {
        Self {
            info: MessageInfo::default(),
            badge,
            mrs: Vec::new(),
        }
    }

    /// A message with a label and message registers
    pub fn message(label: Word, badge: Badge, mrs: &[Word]) -> Self {
        Self {
            info: MessageInfo::new(label, 0, 0, mrs.len() as Word),
            badge,
            mrs: mrs.to_vec(),
        }
    }
}

/// One recorded syscall
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Call {
        dest: CPtr,
        info: MessageInfo,
        caps: Vec<CPtr>,
        mrs: Vec<Word>,
    },
    Recv {
        src: CPtr,
    },
    ReplyRecv {
        src: CPtr,
        info: MessageInfo,
        mrs: Vec<Word>,
    },
    NbSendRecv {
        dest: CPtr,
        info: MessageInfo,
        mrs: Vec<Word>,
        src: CPtr,
    },
    NbSend {
        dest: CPtr,
        info: MessageInfo,
        mrs: Vec<Word>,
    },
    Signal {
        dest: CPtr,
    },
    NameThread {
        tcb: CPtr,
        name: String,
    },
}

/// Recording kernel
pub struct MockKernel {
    arch: Arch,
    ipc_buffer: [Word; IPC_BUFFER_WORDS],
    staged_caps: [CPtr; IPC_BUFFER_CAPS],
    ops: Vec<Op>,
    inbox: Receiver<Incoming>,
    injector: Sender<Incoming>,
    calls_issued: usize,
    fail_nth_call: HashMap<usize, KernelError>,
    fail_label: HashMap<(CPtr, Word), KernelError>,
    call_replies: HashMap<CPtr, MessageInfo>,
    registers: HashMap<CPtr, UserContext>,
    sched_bindings: HashMap<CPtr, CPtr>,
    suspended: HashSet<CPtr>,
}

impl MockKernel {
    pub fn new(arch: Arch) -> Self {
        let (injector, inbox) = channel::unbounded();
        Self {
            arch,
            ipc_buffer: [0; IPC_BUFFER_WORDS],
            staged_caps: [0; IPC_BUFFER_CAPS],
            ops: Vec::new(),
            inbox,
            injector,
            calls_issued: 0,
            fail_nth_call: HashMap::new(),
            fail_label: HashMap::new(),
            call_replies: HashMap::new(),
            registers: HashMap::new(),
            sched_bindings: HashMap::new(),
            suspended: HashSet::new(),
        }
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// A handle other threads can use to queue deliveries
    pub fn injector(&self) -> Sender<Incoming> {
        self.injector.clone()
    }

    /// Queue a delivery for the next receive
    pub fn push(&self, incoming: Incoming) {
        // The kernel owns the receiving end, so the channel cannot be closed.
        let _ = self.injector.send(incoming);
    }

    /// Number of deliveries still queued
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Fail the `n`th `call` (0-indexed, counting every call) with `err`
    pub fn fail_call(&mut self, n: usize, err: KernelError) {
        self.fail_nth_call.insert(n, err);
    }

    /// Fail every invocation of `label` on `dest` with `err`
    pub fn fail_invocation(&mut self, dest: CPtr, label: InvocationLabel, err: KernelError) {
        self.fail_label.insert((dest, label.into_word()), err);
    }

    /// Tag returned by a plain `call` on `dest` (e.g. a protected procedure)
    pub fn set_call_reply(&mut self, dest: CPtr, reply: MessageInfo) {
        self.call_replies.insert(dest, reply);
    }

    /// Register file `TCB_ReadRegisters` returns for `tcb`
    pub fn set_registers(&mut self, tcb: CPtr, ctx: UserContext) {
        self.registers.insert(tcb, ctx);
    }

    pub fn registers(&self, tcb: CPtr) -> Option<&UserContext> {
        self.registers.get(&tcb)
    }

    /// Bind `sched_context` to `object` as the build tool's replay would
    pub fn bind_sched_context(&mut self, sched_context: CPtr, object: CPtr) {
        self.sched_bindings.insert(sched_context, object);
    }

    /// Object a scheduling context is bound to, if any
    pub fn sched_binding(&self, sched_context: CPtr) -> Option<CPtr> {
        self.sched_bindings.get(&sched_context).copied()
    }

    pub fn is_suspended(&self, tcb: CPtr) -> bool {
        self.suspended.contains(&tcb)
    }

    /// Every recorded syscall
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Recorded `call`s only, as `(dest, label, caps, mrs)`
    pub fn calls(&self) -> impl Iterator<Item = (CPtr, Word, &[CPtr], &[Word])> + '_ {
        self.ops.iter().filter_map(|op| match op {
            Op::Call {
                dest,
                info,
                caps,
                mrs,
            } => Some((*dest, info.label(), caps.as_slice(), mrs.as_slice())),
            _ => None,
        })
    }

    /// Forget recorded syscalls
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    fn message(&self, info: MessageInfo) -> Vec<Word> {
        let len = (info.length() as usize).min(IPC_BUFFER_WORDS);
        self.ipc_buffer[..len].to_vec()
    }

    fn staged_caps(&self, info: MessageInfo) -> Vec<CPtr> {
        let len = (info.extra_caps() as usize).min(IPC_BUFFER_CAPS);
        self.staged_caps[..len].to_vec()
    }

    fn deliver(&mut self) -> (MessageInfo, Badge) {
        match self.inbox.recv_timeout(RECV_TIMEOUT) {
            Ok(incoming) => {
                for (idx, mr) in incoming.mrs.iter().enumerate().take(IPC_BUFFER_WORDS) {
                    self.ipc_buffer[idx] = *mr;
                }
                (incoming.info, incoming.badge)
            }
            Err(RecvTimeoutError::Timeout) => panic!("mock kernel: receive with nothing queued"),
            Err(RecvTimeoutError::Disconnected) => panic!("mock kernel: inbox disconnected"),
        }
    }

    fn emulate(&mut self, dest: CPtr, info: MessageInfo, caps: &[CPtr]) -> Result<(), KernelError> {
        let label = info.label();
        if label == InvocationLabel::TcbReadRegisters.into_word() {
            let ctx = self
                .registers
                .get(&dest)
                .copied()
                .unwrap_or_else(|| UserContext::new(self.arch));
            for (idx, word) in ctx.as_words().iter().enumerate() {
                self.ipc_buffer[idx] = *word;
            }
        } else if label == InvocationLabel::TcbWriteRegisters.into_word() {
            let resume = self.ipc_buffer[0] & 1 == 1;
            let count = self.ipc_buffer[1] as usize;
            let mut ctx = self
                .registers
                .get(&dest)
                .copied()
                .unwrap_or_else(|| UserContext::new(self.arch));
            let mut words = ctx.as_words().to_vec();
            for idx in 0..count.min(words.len()) {
                words[idx] = self.ipc_buffer[2 + idx];
            }
            ctx = UserContext::from_words(self.arch, &words);
            self.registers.insert(dest, ctx);
            if resume {
                self.suspended.remove(&dest);
            }
        } else if label == InvocationLabel::TcbSuspend.into_word() {
            self.suspended.insert(dest);
        } else if label == InvocationLabel::TcbResume.into_word() {
            self.suspended.remove(&dest);
        } else if label == InvocationLabel::SchedContextBind.into_word() {
            if self.sched_bindings.contains_key(&dest) {
                return Err(KernelError::IllegalOperation);
            }
            let object = caps.first().copied().ok_or(KernelError::TruncatedMessage)?;
            self.sched_bindings.insert(dest, object);
        } else if label == InvocationLabel::SchedContextUnbindObject.into_word() {
            let object = caps.first().copied().ok_or(KernelError::TruncatedMessage)?;
            match self.sched_bindings.get(&dest) {
                Some(bound) if *bound == object => {
                    self.sched_bindings.remove(&dest);
                }
                _ => return Err(KernelError::IllegalOperation),
            }
        }
        Ok(())
    }
}

impl Kernel for MockKernel {
    fn call(&mut self, dest: CPtr, info: MessageInfo) -> MessageInfo {
        let caps = self.staged_caps(info);
        let mrs = self.message(info);
        self.ops.push(Op::Call {
            dest,
            info,
            caps: caps.clone(),
            mrs,
        });

        let index = self.calls_issued;
        self.calls_issued += 1;

        if let Some(err) = self.fail_nth_call.get(&index) {
            return MessageInfo::new(err.code(), 0, 0, 0);
        }
        if let Some(err) = self.fail_label.get(&(dest, info.label())) {
            return MessageInfo::new(err.code(), 0, 0, 0);
        }
        if let Some(reply) = self.call_replies.get(&dest) {
            return *reply;
        }
        match self.emulate(dest, info, &caps) {
            Ok(()) => MessageInfo::default(),
            Err(err) => MessageInfo::new(err.code(), 0, 0, 0),
        }
    }

    fn recv(&mut self, src: CPtr, _reply: CPtr) -> (MessageInfo, Badge) {
        self.ops.push(Op::Recv { src });
        self.deliver()
    }

    fn reply_recv(&mut self, src: CPtr, info: MessageInfo, _reply: CPtr) -> (MessageInfo, Badge) {
        let mrs = self.message(info);
        self.ops.push(Op::ReplyRecv { src, info, mrs });
        self.deliver()
    }

    fn nb_send_recv(
        &mut self,
        dest: CPtr,
        info: MessageInfo,
        src: CPtr,
        _reply: CPtr,
    ) -> (MessageInfo, Badge) {
        let mrs = self.message(info);
        self.ops.push(Op::NbSendRecv {
            dest,
            info,
            mrs,
            src,
        });
        self.deliver()
    }

    fn nb_send(&mut self, dest: CPtr, info: MessageInfo) {
        let mrs = self.message(info);
        self.ops.push(Op::NbSend { dest, info, mrs });
    }

    fn signal(&mut self, dest: CPtr) {
        self.ops.push(Op::Signal { dest });
    }

    fn mr(&self, index: usize) -> Word {
        self.ipc_buffer[index]
    }

    fn set_mr(&mut self, index: usize, value: Word) {
        self.ipc_buffer[index] = value;
    }

    fn set_cap(&mut self, index: usize, cap: CPtr) {
        self.staged_caps[index] = cap;
    }

    fn debug_name_thread(&mut self, tcb: CPtr, name: &str) {
        self.ops.push(Op::NameThread {
            tcb,
            name: String::from(name),
        });
    }

    fn halt(&mut self) -> ! {
        log::error!("mock kernel: thread halted");
        panic!("mock kernel: thread halted");
    }
}
