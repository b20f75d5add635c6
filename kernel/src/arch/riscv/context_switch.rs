//! Context switching for RISC-V
//!
//! `__rvos_switch(from, to)` stores ra, sp and s0-s11 into `from` (a0) and
//! loads them from `to` (a1), then returns through the loaded ra. Word size
//! follows the target: `sw`/`lw` with 4-byte slots on RV32, `sd`/`ld` with
//! 8-byte slots on RV64. Offsets match [`Context`].
//!
//! A prepared context resumes in `__rvos_trampoline`, which passes s0 as
//! the argument and jumps to the entry point in s1.

use core::arch::global_asm;

use crate::arch::{Context, ContextSwitch};

#[cfg(target_arch = "riscv32")]
global_asm!(
    ".section .text",
    ".global __rvos_switch",
    ".align 2",
    "__rvos_switch:",
    "    sw ra, 0(a0)",
    "    sw sp, 4(a0)",
    "    sw s0, 8(a0)",
    "    sw s1, 12(a0)",
    "    sw s2, 16(a0)",
    "    sw s3, 20(a0)",
    "    sw s4, 24(a0)",
    "    sw s5, 28(a0)",
    "    sw s6, 32(a0)",
    "    sw s7, 36(a0)",
    "    sw s8, 40(a0)",
    "    sw s9, 44(a0)",
    "    sw s10, 48(a0)",
    "    sw s11, 52(a0)",
    "    lw ra, 0(a1)",
    "    lw sp, 4(a1)",
    "    lw s0, 8(a1)",
    "    lw s1, 12(a1)",
    "    lw s2, 16(a1)",
    "    lw s3, 20(a1)",
    "    lw s4, 24(a1)",
    "    lw s5, 28(a1)",
    "    lw s6, 32(a1)",
    "    lw s7, 36(a1)",
    "    lw s8, 40(a1)",
    "    lw s9, 44(a1)",
    "    lw s10, 48(a1)",
    "    lw s11, 52(a1)",
    "    ret",
);

#[cfg(target_arch = "riscv64")]
global_asm!(
    ".section .text",
    ".global __rvos_switch",
    ".align 2",
    "__rvos_switch:",
    "    sd ra, 0(a0)",
    "    sd sp, 8(a0)",
    "    sd s0, 16(a0)",
    "    sd s1, 24(a0)",
    "    sd s2, 32(a0)",
    "    sd s3, 40(a0)",
    "    sd s4, 48(a0)",
    "    sd s5, 56(a0)",
    "    sd s6, 64(a0)",
    "    sd s7, 72(a0)",
    "    sd s8, 80(a0)",
    "    sd s9, 88(a0)",
    "    sd s10, 96(a0)",
    "    sd s11, 104(a0)",
    "    ld ra, 0(a1)",
    "    ld sp, 8(a1)",
    "    ld s0, 16(a1)",
    "    ld s1, 24(a1)",
    "    ld s2, 32(a1)",
    "    ld s3, 40(a1)",
    "    ld s4, 48(a1)",
    "    ld s5, 56(a1)",
    "    ld s6, 64(a1)",
    "    ld s7, 72(a1)",
    "    ld s8, 80(a1)",
    "    ld s9, 88(a1)",
    "    ld s10, 96(a1)",
    "    ld s11, 104(a1)",
    "    ret",
);

global_asm!(
    ".section .text",
    ".global __rvos_trampoline",
    ".align 2",
    "__rvos_trampoline:",
    "    mv a0, s0",
    "    jr s1",
);

extern "C" {
    fn __rvos_switch(from: *mut Context, to: *const Context);
    fn __rvos_trampoline();
}

/// The hardware context switch
#[derive(Debug, Clone, Copy, Default)]
pub struct Hardware;

impl ContextSwitch for Hardware {
    #[inline]
    unsafe fn switch(&self, from: *mut Context, to: *const Context) {
        __rvos_switch(from, to);
    }
}

/// Resume address for prepared contexts
pub(crate) fn trampoline_address() -> usize {
    __rvos_trampoline as unsafe extern "C" fn() as usize
}
