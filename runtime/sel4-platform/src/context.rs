//! Per-architecture user contexts
//!
//! `TCB_ReadRegisters` returns the thread's registers as a flat run of words
//! in the order of the architecture's `seL4_UserContext`. [`UserContext`]
//! keeps that flat form and attaches the register names for the selected
//! architecture, so one type serves aarch64, riscv64 and x86_64.

use crate::Word;
use core::fmt;

/// Largest user context of any supported architecture (aarch64)
pub const MAX_USER_CONTEXT_WORDS: usize = 36;

const AARCH64_REGISTERS: [&str; 36] = [
    "pc", "sp", "spsr", "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x16", "x17",
    "x18", "x29", "x30", "x9", "x10", "x11", "x12", "x13", "x14", "x15", "x19", "x20", "x21",
    "x22", "x23", "x24", "x25", "x26", "x27", "x28", "tpidr_el0", "tpidrro_el0",
];

const RISCV64_REGISTERS: [&str; 32] = [
    "pc", "ra", "sp", "gp", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10",
    "s11", "a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7", "t0", "t1", "t2", "t3", "t4", "t5",
    "t6", "tp",
];

const X86_64_REGISTERS: [&str; 20] = [
    "rip", "rsp", "rflags", "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "r8", "r9", "r10",
    "r11", "r12", "r13", "r14", "r15", "fs_base", "gs_base",
];

/// CPU architecture of the running system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Arch {
    Aarch64,
    Riscv64,
    X86_64,
}

impl Arch {
    /// Register names in `seL4_UserContext` order
    pub const fn register_names(self) -> &'static [&'static str] {
        match self {
            Arch::Aarch64 => &AARCH64_REGISTERS,
            Arch::Riscv64 => &RISCV64_REGISTERS,
            Arch::X86_64 => &X86_64_REGISTERS,
        }
    }

    /// Number of words in a full user context
    pub const fn user_context_words(self) -> usize {
        self.register_names().len()
    }

    /// Index of the program counter. It is the first register on every
    /// supported architecture, which is what lets a restart write a
    /// single-register context.
    pub const fn pc_index(self) -> usize {
        0
    }

    /// Index of the stack pointer
    pub const fn sp_index(self) -> usize {
        match self {
            Arch::Aarch64 => 1,
            Arch::Riscv64 => 2,
            Arch::X86_64 => 1,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Arch::Aarch64 => "aarch64",
            Arch::Riscv64 => "riscv64",
            Arch::X86_64 => "x86_64",
        })
    }
}

/// Register set of a thread
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct UserContext {
    arch: Arch,
    words: [Word; MAX_USER_CONTEXT_WORDS],
}

impl UserContext {
    /// All-zero context for `arch`
    pub const fn new(arch: Arch) -> Self {
        Self {
            arch,
            words: [0; MAX_USER_CONTEXT_WORDS],
        }
    }

    /// Build from words in `seL4_UserContext` order. Extra words are ignored,
    /// missing ones stay zero.
    pub fn from_words(arch: Arch, words: &[Word]) -> Self {
        let mut ctx = Self::new(arch);
        let n = words.len().min(arch.user_context_words());
        ctx.words[..n].copy_from_slice(&words[..n]);
        ctx
    }

    pub const fn arch(&self) -> Arch {
        self.arch
    }

    /// Words in `seL4_UserContext` order
    pub fn as_words(&self) -> &[Word] {
        &self.words[..self.arch.user_context_words()]
    }

    pub fn get(&self, name: &str) -> Option<Word> {
        self.arch
            .register_names()
            .iter()
            .position(|reg| *reg == name)
            .map(|idx| self.words[idx])
    }

    pub const fn pc(&self) -> Word {
        self.words[self.arch.pc_index()]
    }

    pub const fn sp(&self) -> Word {
        self.words[self.arch.sp_index()]
    }

    pub fn set_pc(&mut self, pc: Word) {
        self.words[self.arch.pc_index()] = pc;
    }

    /// Iterate `(name, value)` pairs in dump order
    pub fn registers(&self) -> impl Iterator<Item = (&'static str, Word)> + '_ {
        self.arch
            .register_names()
            .iter()
            .copied()
            .zip(self.as_words().iter().copied())
    }
}

impl fmt::Debug for UserContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.registers() {
            map.entry(&name, &format_args!("{:#018x}", value));
        }
        map.finish()
    }
}
