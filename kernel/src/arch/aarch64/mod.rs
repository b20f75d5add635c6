//! ARM64 (AArch64) support
//!
//! Only the cooperative context switch lives here.

pub mod context_switch;
