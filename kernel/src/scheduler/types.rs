//! Scheduler types
//!
//! Ready queues and scheduler errors.

use thiserror::Error;

use crate::config::{MAX_TASKS, MIN_TASK_STACK, PRIO_LEVEL};
use crate::objects::{TaskId, TaskTable};

/// Scheduler errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Priority outside `0..PRIO_LEVEL`
    #[error("invalid priority {priority} (levels 0..{})", PRIO_LEVEL)]
    InvalidPriority { priority: u8 },

    /// All task slots are taken
    #[error("task table full ({} tasks)", MAX_TASKS)]
    TaskTableFull,

    /// Stack below the minimum task stack size
    #[error("task stack of {size} bytes is below the minimum of {}", MIN_TASK_STACK)]
    StackTooSmall { size: usize },
}

/// Scheduler result type
pub type Result<T> = core::result::Result<T, SchedulerError>;

/// FIFO of ready tasks at one priority
///
/// Intrusive: the links live in each TCB, the queue only keeps head and
/// tail, so both ends are O(1) and the queue never fills up.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadyQueue {
    head: Option<TaskId>,
    tail: Option<TaskId>,
    len: usize,
}

impl ReadyQueue {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Check if queue is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Get number of tasks in queue
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Task at the head, the next to be selected
    #[inline]
    pub fn front(&self) -> Option<TaskId> {
        self.head
    }

    /// Append a task at the tail
    ///
    /// # Arguments
    /// * `tasks` - Table holding the link fields of every queued task
    /// * `id` - Task to append
    ///
    /// # Returns
    /// `false`, leaving every queue untouched, if the task already sits in a
    /// queue. Relinking it would cut off the tasks queued behind it.
    pub fn push_back(&mut self, tasks: &mut TaskTable, id: TaskId) -> bool {
        if tasks[id].link().queued {
            log::warn!(target: "sched", "{} is already queued", id);
            return false;
        }

        let link = tasks[id].link_mut();
        link.next = None;
        link.queued = true;

        match self.tail {
            Some(tail) => tasks[tail].link_mut().next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
        true
    }

    /// Detach the task at the head
    pub fn pop_front(&mut self, tasks: &mut TaskTable) -> Option<TaskId> {
        let head = self.head?;

        let link = tasks[head].link_mut();
        self.head = link.next.take();
        link.queued = false;

        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(head)
    }

    /// Iterate over queued tasks, head first
    pub fn iter<'a>(&self, tasks: &'a TaskTable) -> impl Iterator<Item = TaskId> + 'a {
        core::iter::successors(self.head, move |&id| tasks[id].link().next)
    }
}

/// One ready queue per priority plus a bitmap of non-empty levels
pub struct ReadyQueues {
    queues: [ReadyQueue; PRIO_LEVEL],

    /// Bit `p` is set while `queues[p]` is non-empty
    bitmap: u32,
}

impl ReadyQueues {
    /// Create empty queues
    pub const fn new() -> Self {
        Self {
            queues: [ReadyQueue::new(); PRIO_LEVEL],
            bitmap: 0,
        }
    }

    /// Append a task to the tail of its priority's queue
    pub fn enqueue(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let priority = tasks[id].priority() as usize;
        if self.queues[priority].push_back(tasks, id) {
            self.bitmap |= 1 << priority;
        }
    }

    /// Detach the head of the highest-priority non-empty queue
    ///
    /// Returns `None` when every queue is empty.
    pub fn dequeue_highest(&mut self, tasks: &mut TaskTable) -> Option<TaskId> {
        let priority = self.highest_priority()? as usize;
        let id = self.queues[priority].pop_front(tasks);

        if self.queues[priority].is_empty() {
            self.bitmap &= !(1 << priority);
        }
        id
    }

    /// Highest (numerically lowest) priority with a ready task
    pub fn highest_priority(&self) -> Option<u8> {
        if self.bitmap == 0 {
            None
        } else {
            Some(self.bitmap.trailing_zeros() as u8)
        }
    }

    /// Queue of one priority level
    pub fn queue(&self, priority: u8) -> Option<&ReadyQueue> {
        self.queues.get(priority as usize)
    }

    /// Number of ready tasks across all levels
    pub fn total(&self) -> usize {
        self.queues.iter().map(ReadyQueue::len).sum()
    }
}

impl Default for ReadyQueues {
    fn default() -> Self {
        Self::new()
    }
}
