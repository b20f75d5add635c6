//! Architecture-specific code
//!
//! Everything that touches registers directly sits behind two items:
//!
//! - [`Context`]: the callee-saved register snapshot stored in every TCB and
//!   in the scheduler
//! - [`ContextSwitch`]: the save-and-resume primitive
//!
//! The hardware implementations (`Hardware`) exist for bare-metal RISC-V
//! (the reference board) and AArch64. Hosted builds share the same context
//! layout but have no hardware switch; tests provide their own
//! `ContextSwitch`.

pub mod context;

#[cfg(all(target_os = "none", any(target_arch = "riscv32", target_arch = "riscv64")))]
pub mod riscv;

#[cfg(all(target_os = "none", target_arch = "aarch64"))]
pub mod aarch64;

pub use context::{Context, EntryPoint, CONTEXT_SIZE};

#[cfg(all(target_os = "none", any(target_arch = "riscv32", target_arch = "riscv64")))]
pub use riscv::context_switch::Hardware;

#[cfg(all(target_os = "none", target_arch = "aarch64"))]
pub use aarch64::context_switch::Hardware;

/// Save-and-resume primitive
///
/// The only operation that moves the CPU between the scheduler and tasks.
pub trait ContextSwitch {
    /// Save the caller's callee-saved registers, stack pointer and return
    /// address into `from`, then resume whatever was saved in `to`
    ///
    /// Returns once some later switch names `from` as its target.
    ///
    /// # Safety
    /// - `from` must be valid for writes and `to` valid for reads
    /// - `to` must hold a context saved by a previous switch or built by
    ///   `Context::prepare`, with a live stack
    unsafe fn switch(&self, from: *mut Context, to: *const Context);
}

impl<S: ContextSwitch + ?Sized> ContextSwitch for &S {
    #[inline]
    unsafe fn switch(&self, from: *mut Context, to: *const Context) {
        (**self).switch(from, to)
    }
}

/// Address a freshly prepared context resumes at
///
/// On hardware this is the entry trampoline, which moves the argument into
/// the first argument register and jumps to the entry point held in the
/// context.
#[cfg(all(target_os = "none", any(target_arch = "riscv32", target_arch = "riscv64")))]
pub(crate) fn resume_address(_entry: EntryPoint) -> usize {
    riscv::context_switch::trampoline_address()
}

#[cfg(all(target_os = "none", target_arch = "aarch64"))]
pub(crate) fn resume_address(_entry: EntryPoint) -> usize {
    aarch64::context_switch::trampoline_address()
}

/// Hosted builds never resume a prepared context, so the entry point itself
/// is recorded
#[cfg(not(all(
    target_os = "none",
    any(target_arch = "riscv32", target_arch = "riscv64", target_arch = "aarch64")
)))]
pub(crate) fn resume_address(entry: EntryPoint) -> usize {
    entry as usize
}
