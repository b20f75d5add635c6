//! Task Control Block (TCB)
//!
//! A TCB holds everything the scheduler needs to suspend and resume a task:
//! - saved register context
//! - state and priority
//! - ready queue linkage
//! - the task's private stack
//!
//! ## Task Lifecycle
//!
//! ```text
//! spawn → Ready ⇄ Running
//!           (yield / selection)
//! ```
//!
//! Tasks never block and never exit.

use core::fmt;

use crate::arch::Context;

/// Index of a task in the task table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// Slot index in the task table
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting in its priority's ready queue
    Ready,

    /// Currently owns the CPU
    Running,
}

/// Intrusive ready queue linkage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueLink {
    /// Next task in the same queue
    pub(crate) next: Option<TaskId>,

    /// Whether the task sits in a ready queue
    pub(crate) queued: bool,
}

/// Task Control Block
#[repr(C)]
pub struct TCB {
    /// Saved registers, valid while the task is not running
    ///
    /// First field, so a TCB pointer is also a context pointer.
    context: Context,

    /// Task ID
    id: TaskId,

    /// Task state
    state: TaskState,

    /// Priority (0 = highest)
    priority: u8,

    /// Ready queue linkage
    link: QueueLink,

    /// Lowest address of the task stack
    stack_base: usize,

    /// Stack size in bytes
    stack_size: usize,
}

impl TCB {
    /// Create a TCB in the Ready state, not yet queued
    ///
    /// # Arguments
    /// * `id` - Slot the TCB occupies in the task table
    /// * `priority` - Priority level, 0 being the highest
    /// * `context` - Initial register state, usually from `Context::prepare`
    /// * `stack_base` - Lowest address of the task stack
    /// * `stack_size` - Stack size in bytes
    pub fn new(id: TaskId, priority: u8, context: Context, stack_base: usize, stack_size: usize) -> Self {
        Self {
            context,
            id,
            state: TaskState::Ready,
            priority,
            link: QueueLink::default(),
            stack_base,
            stack_size,
        }
    }

    /// Get task ID
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Get task state
    #[inline]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Set task state
    #[inline]
    pub fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    /// Get priority
    #[inline]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Get the saved context
    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Raw pointer to the saved context, for the switch primitive
    #[inline]
    pub(crate) fn context_ptr(&mut self) -> *mut Context {
        &mut self.context
    }

    #[inline]
    pub(crate) fn link(&self) -> &QueueLink {
        &self.link
    }

    #[inline]
    pub(crate) fn link_mut(&mut self) -> &mut QueueLink {
        &mut self.link
    }

    /// Stack bounds as `(base, size)`
    #[inline]
    pub fn stack(&self) -> (usize, usize) {
        (self.stack_base, self.stack_size)
    }

    /// Check if the task is running
    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }
}

impl fmt::Debug for TCB {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TCB")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("priority", &self.priority)
            .field("queued", &self.link.queued)
            .field("sp", &format_args!("{:#x}", self.context.sp))
            .finish()
    }
}
