//! RVOS kernel resource core
//!
//! The two subsystems of the kernel that carry real invariants:
//!
//! - `memory`: a first-fit heap allocator with splitting and coalescing,
//!   fed by a page provider (`PagePool` on real hardware).
//! - `scheduler`: a cooperative scheduler with fixed priority classes,
//!   round-robin within a class, and a dedicated scheduler context that every
//!   yield transfers into.
//!
//! Everything around them (UART, printf, boot assembly, page tables) lives in
//! the surrounding kernel and is reached through narrow traits:
//! `PageProvider`, `ContextSwitch` and `Console`.
//!
//! # Layout
//!
//! - `arch`: saved register context and the per-architecture switch primitive
//! - `components`: console component trait used for diagnostic output
//! - `config`: compile-time kernel configuration
//! - `debug`: `kprint!` macros and the console-backed `log` sink
//! - `memory`: page pool, block headers, heap
//! - `objects`: task control blocks and the task table
//! - `scheduler`: ready queues and the scheduling loop

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

#[macro_use]
pub mod debug;

pub mod arch;
pub mod components;
pub mod config;
pub mod memory;
pub mod objects;
pub mod scheduler;

pub use memory::{Allocation, Heap, HeapError, LockedHeap, PagePool, PageProvider};
pub use objects::{TaskId, TaskState};
pub use scheduler::{Scheduler, SchedulerError};
