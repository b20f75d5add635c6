//! RISC-V (RV32/RV64) support
//!
//! Only the cooperative context switch lives here; traps, UART and paging
//! belong to the surrounding system.

pub mod context_switch;
