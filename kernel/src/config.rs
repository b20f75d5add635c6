//! Kernel configuration
//!
//! Compile-time constants shared by the memory and scheduling subsystems.
//! The values match the reference QEMU RISC-V board: small pages, a handful
//! of priority classes and a fixed task table.

use static_assertions::const_assert;

/// Size of one page handed out by the page provider (bytes)
pub const PAGE_SIZE: usize = 256;

/// Maximum number of pages a `PagePool` can track
pub const MAX_PAGES: usize = 64 * 1024;

/// Number of priority classes (0 = highest)
pub const PRIO_LEVEL: usize = 8;

/// Capacity of the task table
pub const MAX_TASKS: usize = 16;

/// Size of the scheduler's private stack (bytes)
pub const SCHED_STACK_SIZE: usize = 1024;

/// Stack pointer alignment required by the RISC-V and AArch64 ABIs
pub const STACK_ALIGN: usize = 16;

/// Smallest stack a task may be spawned with
pub const MIN_TASK_STACK: usize = 256;

const_assert!(PAGE_SIZE.is_power_of_two());
const_assert!(PRIO_LEVEL > 0 && PRIO_LEVEL <= 32);
const_assert!(MAX_TASKS > 0);
const_assert!(SCHED_STACK_SIZE % STACK_ALIGN == 0);
const_assert!(MAX_PAGES % 64 == 0);
