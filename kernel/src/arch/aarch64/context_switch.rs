//! Context switching for ARM64
//!
//! `__rvos_switch(from, to)` stores x30 (lr), sp and x19-x29 into `from`
//! (x0) and loads them from `to` (x1), then returns through the loaded lr.
//! sp cannot be the operand of `stp`, so it goes through x9. x29 is the
//! eleventh callee-saved register; the twelfth slot stays unused.
//!
//! A prepared context resumes in `__rvos_trampoline`, which passes x19 as
//! the argument and branches to the entry point in x20.

use core::arch::global_asm;

use crate::arch::{Context, ContextSwitch};

global_asm!(
    ".section .text",
    ".global __rvos_switch",
    ".balign 4",
    "__rvos_switch:",
    "    mov x9, sp",
    "    stp x30, x9, [x0, #0]",
    "    stp x19, x20, [x0, #16]",
    "    stp x21, x22, [x0, #32]",
    "    stp x23, x24, [x0, #48]",
    "    stp x25, x26, [x0, #64]",
    "    stp x27, x28, [x0, #80]",
    "    str x29, [x0, #96]",
    "    ldp x30, x9, [x1, #0]",
    "    mov sp, x9",
    "    ldp x19, x20, [x1, #16]",
    "    ldp x21, x22, [x1, #32]",
    "    ldp x23, x24, [x1, #48]",
    "    ldp x25, x26, [x1, #64]",
    "    ldp x27, x28, [x1, #80]",
    "    ldr x29, [x1, #96]",
    "    ret",
    "",
    ".global __rvos_trampoline",
    ".balign 4",
    "__rvos_trampoline:",
    "    mov x0, x19",
    "    br x20",
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
