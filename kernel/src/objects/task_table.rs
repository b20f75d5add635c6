//! Task table
//!
//! Fixed registry of `MAX_TASKS` TCB slots. Slots are filled in order and
//! never vacated, so a `TaskId` handed out by the table stays valid for the
//! table's lifetime.

use core::ops::{Index, IndexMut};

use crate::config::MAX_TASKS;
use crate::objects::{TaskId, TCB};
use crate::scheduler::SchedulerError;

/// Registry owning every TCB
pub struct TaskTable {
    slots: [Option<TCB>; MAX_TASKS],
    len: usize,
}

impl TaskTable {
    const EMPTY: Option<TCB> = None;

    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            slots: [Self::EMPTY; MAX_TASKS],
            len: 0,
        }
    }

    /// ID the next inserted task will receive, if a slot is left
    pub fn next_id(&self) -> Option<TaskId> {
        (self.len < MAX_TASKS).then_some(TaskId(self.len))
    }

    /// Store a TCB built for the next free slot
    ///
    /// `build` receives the ID the task will have.
    pub fn insert_with(&mut self, build: impl FnOnce(TaskId) -> TCB) -> Result<TaskId, SchedulerError> {
        let id = self.next_id().ok_or(SchedulerError::TaskTableFull)?;
        let tcb = build(id);
        debug_assert_eq!(tcb.id(), id);
        self.slots[id.0] = Some(tcb);
        self.len += 1;
        Ok(id)
    }

    /// Look up a task
    pub fn get(&self, id: TaskId) -> Option<&TCB> {
        self.slots.get(id.0)?.as_ref()
    }

    /// Look up a task mutably
    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut TCB> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no task is registered
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over registered tasks in ID order
    pub fn iter(&self) -> impl Iterator<Item = &TCB> {
        self.slots[..self.len].iter().flatten()
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<TaskId> for TaskTable {
    type Output = TCB;

    fn index(&self, id: TaskId) -> &TCB {
        match self.get(id) {
            Some(tcb) => tcb,
            None => panic!("{} is not registered", id),
        }
    }
}

impl IndexMut<TaskId> for TaskTable {
    fn index_mut(&mut self, id: TaskId) -> &mut TCB {
        match self.get_mut(id) {
            Some(tcb) => tcb,
            None => panic!("{} is not registered", id),
        }
    }
}
