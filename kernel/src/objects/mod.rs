//! Kernel objects
//!
//! The objects the scheduler works on:
//!
//! - **TCB**: Task Control Block, one per task
//! - **TaskTable**: fixed registry owning every TCB
//!
//! Tasks are identified by [`TaskId`], an index into the task table. Ready
//! queues link TCBs through these indices, never through pointers.

pub mod task_table;
pub mod tcb;

pub use task_table::TaskTable;
pub use tcb::{QueueLink, TaskId, TaskState, TCB};
