//! Saved task context
//!
//! Cooperative switches happen at a function call, so only the registers the
//! calling convention requires a callee to preserve are saved. The layout is
//! shared by all architectures:
//!
//! | Word | RISC-V  | AArch64   |
//! |------|---------|-----------|
//! | 0    | ra      | x30 (lr)  |
//! | 1    | sp      | sp        |
//! | 2-13 | s0-s11  | x19-x29   |
//!
//! The switch assembly hard-codes these offsets. DO NOT reorder fields.

use core::mem::size_of;

use static_assertions::const_assert_eq;

use crate::config::STACK_ALIGN;

/// First code a prepared context runs; receives the spawn argument
pub type EntryPoint = extern "C" fn(usize) -> !;

/// Callee-saved register snapshot
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    /// Return address: where the context resumes
    pub ra: usize,

    /// Stack pointer
    pub sp: usize,

    /// Callee-saved general purpose registers
    pub saved: [usize; 12],
}

/// Size of a context in bytes (for assembly offsets)
pub const CONTEXT_SIZE: usize = size_of::<Context>();

const_assert_eq!(CONTEXT_SIZE, 14 * size_of::<usize>());

impl Context {
    /// Index in `saved` of the register holding the entry argument (s0 / x19)
    pub const ARG_REG: usize = 0;

    /// Index in `saved` of the register holding the entry point (s1 / x20)
    pub const ENTRY_REG: usize = 1;

    /// All registers zeroed
    pub const fn new() -> Self {
        Self {
            ra: 0,
            sp: 0,
            saved: [0; 12],
        }
    }

    /// Build a context whose first resumption calls `entry(arg)` on the
    /// stack ending at `stack_top`
    ///
    /// The stack pointer is rounded down to `STACK_ALIGN`.
    pub fn prepare(entry: EntryPoint, arg: usize, stack_top: usize) -> Self {
        let mut context = Self::new();
        context.ra = super::resume_address(entry);
        context.sp = stack_top & !(STACK_ALIGN - 1);
        context.saved[Self::ARG_REG] = arg;
        context.saved[Self::ENTRY_REG] = entry as usize;
        context
    }
}
