//! Scheduler - Cooperative Task Scheduling & Context Switching
//!
//! This module implements the scheduler which manages:
//! - Task creation and the task table
//! - Per-priority ready queues
//! - Transfers between tasks and the scheduler context
//!
//! ## Architecture
//!
//! The scheduler uses **fixed-priority cooperative scheduling** with
//! **round-robin** within each priority level:
//!
//! - `PRIO_LEVEL` priority levels (0 = highest)
//! - O(1) selection via priority bitmap
//! - Decisions happen only when a task yields; nothing preempts
//!
//! The scheduling loop runs in its own context on a private stack. A
//! yielding task switches into that context; the loop requeues it, picks the
//! next task and switches into it. No scheduling decision is ever made on a
//! task's stack.
//!
//! ## Task States
//!
//! - **Running**: Currently executing on the CPU
//! - **Ready**: Waiting in its priority's ready queue
//!
//! ## Usage
//!
//! ```rust,ignore
//! static SCHEDULER: Scheduler<Hardware> = Scheduler::new(Hardware);
//!
//! unsafe { SCHEDULER.initialize() };
//! SCHEDULER.spawn(worker, 0, 1, stack)?;
//! unsafe { SCHEDULER.start() }
//!
//! // inside a task
//! SCHEDULER.yield_now();
//! ```

use core::cell::UnsafeCell;

use spin::Mutex;

use crate::arch::{Context, ContextSwitch, EntryPoint};
use crate::config::{MIN_TASK_STACK, PRIO_LEVEL, SCHED_STACK_SIZE};
use crate::objects::{TaskId, TaskState, TaskTable, TCB};

mod types;

pub use types::{ReadyQueue, ReadyQueues, Result, SchedulerError};

/// Private stack of the scheduling loop
#[repr(C, align(16))]
struct SchedulerStack([u8; SCHED_STACK_SIZE]);

/// Mutable scheduler state
struct SchedulerState {
    tasks: TaskTable,
    ready: ReadyQueues,

    /// Task selected last; stays set while the loop idles
    current: Option<TaskId>,

    initialized: bool,

    /// Number of transfers into tasks
    dispatches: u64,
}

/// Cooperative priority scheduler
///
/// `S` performs the actual register save and restore. On bare-metal targets
/// that is `arch::Hardware`.
pub struct Scheduler<S: ContextSwitch> {
    /// Held only between switches, never across one
    state: Mutex<SchedulerState>,

    /// Saved context of the scheduling loop
    context: UnsafeCell<Context>,

    stack: UnsafeCell<SchedulerStack>,

    switch: S,
}

// Tasks and queues sit behind the lock. The scheduler context and stack are
// written by `initialize` (under the lock) and otherwise only by the switch
// primitive while it moves in or out of the scheduler context.
unsafe impl<S: ContextSwitch + Sync> Sync for Scheduler<S> {}

impl<S: ContextSwitch> Scheduler<S> {
    /// Create a scheduler with no tasks
    pub const fn new(switch: S) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                tasks: TaskTable::new(),
                ready: ReadyQueues::new(),
                current: None,
                initialized: false,
                dispatches: 0,
            }),
            context: UnsafeCell::new(Context::new()),
            stack: UnsafeCell::new(SchedulerStack([0; SCHED_STACK_SIZE])),
            switch,
        }
    }

    /// Prepare the scheduler context
    ///
    /// Afterwards the scheduler context resumes at the scheduling loop, on the
    /// private stack. Calling it again is a no-op.
    ///
    /// # Safety
    /// The scheduler must not move once initialized (keep it in a `static`):
    /// the scheduler context refers back to it by address.
    pub unsafe fn initialize(&self) {
        let mut state = self.state.lock();
        if state.initialized {
            return;
        }

        let stack_base = self.stack.get() as usize;
        let stack_top = stack_base + SCHED_STACK_SIZE;
        *self.context.get() = Context::prepare(
            scheduler_entry::<S> as EntryPoint,
            self as *const Self as usize,
            stack_top,
        );
        state.initialized = true;
        drop(state);

        log::info!(
            target: "sched",
            "scheduler initialized: stack {:#x}..{:#x}, {} priority levels",
            stack_base,
            stack_top,
            PRIO_LEVEL
        );
    }

    /// Check if `initialize` has run
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Create a task that runs `entry(arg)` on `stack`
    ///
    /// The task is marked Ready and appended to the tail of its priority's
    /// queue. It first runs when the scheduling loop selects it.
    ///
    /// # Arguments
    /// * `entry` - Function the task starts in; it must never return
    /// * `arg` - Value passed to `entry`
    /// * `priority` - Priority level, 0 being the highest
    /// * `stack` - Memory the task runs on, at least `MIN_TASK_STACK` bytes
    ///
    /// # Errors
    /// - `InvalidPriority` if `priority >= PRIO_LEVEL`
    /// - `StackTooSmall` if the stack is shorter than `MIN_TASK_STACK`
    /// - `TaskTableFull` if every task slot is taken
    pub fn spawn(
        &self,
        entry: EntryPoint,
        arg: usize,
        priority: u8,
        stack: &'static mut [u8],
    ) -> Result<TaskId> {
        if priority as usize >= PRIO_LEVEL {
            return Err(SchedulerError::InvalidPriority { priority });
        }
        if stack.len() < MIN_TASK_STACK {
            return Err(SchedulerError::StackTooSmall { size: stack.len() });
        }

        let stack_base = stack.as_mut_ptr() as usize;
        let stack_size = stack.len();
        let context = Context::prepare(entry, arg, stack_base + stack_size);

        let id = {
            let mut state = self.state.lock();
            let state = &mut *state;
            let id = state
                .tasks
                .insert_with(|id| TCB::new(id, priority, context, stack_base, stack_size))?;
            state.ready.enqueue(&mut state.tasks, id);
            id
        };

        log::debug!(
            target: "sched",
            "spawned {} at priority {} (stack {:#x}, {} bytes)",
            id,
            priority,
            stack_base,
            stack_size
        );
        Ok(id)
    }

    /// Give up the CPU
    ///
    /// Saves the calling task's registers into its TCB and resumes the
    /// scheduler context. Returns once the scheduling loop selects this task
    /// again. Does nothing when no task is running, e.g. before `start`.
    pub fn yield_now(&self) {
        let from = {
            let mut state = self.state.lock();
            if !state.initialized {
                return;
            }
            let Some(id) = state.current else {
                return;
            };
            if !state.tasks[id].is_running() {
                return;
            }
            ksched_trace!("{} yields", id);
            state.tasks[id].context_ptr()
        };
        let to = self.context.get() as *const Context;

        // SAFETY: TCBs and the scheduler context live as long as the
        // scheduler; the lock is released.
        unsafe { self.switch.switch(from, to) };
    }

    /// One pass of the scheduling loop
    ///
    /// Requeues the task that was running (if it still is), selects the head
    /// of the highest-priority non-empty queue and transfers into it. Returns
    /// the selected task once control comes back, or `None` without switching
    /// when no task is ready.
    ///
    /// # Safety
    /// Must run in the scheduler context (the loop calls it), since the
    /// caller's registers become the scheduler context.
    pub unsafe fn run_once(&self) -> Option<TaskId> {
        let (next, to) = {
            let mut state = self.state.lock();
            let state = &mut *state;

            if let Some(prev) = state.current {
                if state.tasks[prev].is_running() {
                    state.tasks[prev].set_state(TaskState::Ready);
                    state.ready.enqueue(&mut state.tasks, prev);
                }
            }

            let next = state.ready.dequeue_highest(&mut state.tasks)?;
            state.tasks[next].set_state(TaskState::Running);
            state.current = Some(next);
            state.dispatches += 1;
            ksched_trace!("dispatch {} (priority {})", next, state.tasks[next].priority());

            (next, state.tasks[next].context_ptr() as *const Context)
        };

        self.switch.switch(self.context.get(), to);
        Some(next)
    }

    /// The scheduling loop; never returns
    ///
    /// Spins while no task is ready.
    ///
    /// # Safety
    /// See [`Scheduler::run_once`].
    pub unsafe fn run(&self) -> ! {
        loop {
            if self.run_once().is_none() {
                core::hint::spin_loop();
            }
        }
    }

    /// Hand the CPU from the boot flow to the scheduling loop
    ///
    /// The boot context is saved into a throwaway record and never resumed.
    ///
    /// # Safety
    /// `initialize` must have run, on a scheduler that no longer moves.
    pub unsafe fn start(&self) -> ! {
        log::info!(target: "sched", "starting with {} tasks", self.task_count());

        let mut boot = Context::new();
        self.switch.switch(&mut boot, self.context.get());

        // Only reachable with a switch that does not transfer control.
        loop {
            core::hint::spin_loop();
        }
    }

    /// Task currently holding (or last holding) the CPU
    pub fn current(&self) -> Option<TaskId> {
        self.state.lock().current
    }

    /// State of a task
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.state.lock().tasks.get(id).map(TCB::state)
    }

    /// Priority of a task
    pub fn task_priority(&self, id: TaskId) -> Option<u8> {
        self.state.lock().tasks.get(id).map(TCB::priority)
    }

    /// Number of ready tasks at a priority level
    pub fn ready_count(&self, priority: u8) -> usize {
        self.state.lock().ready.queue(priority).map_or(0, ReadyQueue::len)
    }

    /// Number of spawned tasks
    pub fn task_count(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Number of transfers into tasks so far
    pub fn dispatches(&self) -> u64 {
        self.state.lock().dispatches
    }

    /// Address of a task's saved context
    pub fn task_context(&self, id: TaskId) -> Option<*const Context> {
        self.state.lock().tasks.get(id).map(|tcb| tcb.context() as *const Context)
    }

    /// Address of the scheduler's saved context
    pub fn scheduler_context(&self) -> *const Context {
        self.context.get()
    }
}

/// First code the scheduler context runs
extern "C" fn scheduler_entry<S: ContextSwitch>(scheduler: usize) -> ! {
    // SAFETY: `initialize` stored the address of a scheduler that never moves.
    unsafe {
        let scheduler = &*(scheduler as *const Scheduler<S>);
        scheduler.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_TASKS;
    use std::boxed::Box;
    use std::cell::RefCell;
    use std::vec::Vec;

    /// Performs no transfer; shareable across threads
    struct NullSwitch;

    impl ContextSwitch for NullSwitch {
        unsafe fn switch(&self, _from: *mut Context, _to: *const Context) {}
    }

    /// Records every switch instead of performing it
    #[derive(Default)]
    struct RecordingSwitch {
        log: RefCell<Vec<(usize, usize)>>,
    }

    impl ContextSwitch for RecordingSwitch {
        unsafe fn switch(&self, from: *mut Context, to: *const Context) {
            self.log.borrow_mut().push((from as usize, to as usize));
        }
    }

    extern "C" fn task_entry(_arg: usize) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn stack() -> &'static mut [u8] {
        Box::leak(vec![0u8; MIN_TASK_STACK].into_boxed_slice())
    }

    fn scheduler() -> &'static Scheduler<RecordingSwitch> {
        let scheduler = Box::leak(Box::new(Scheduler::new(RecordingSwitch::default())));
        unsafe { scheduler.initialize() };
        scheduler
    }

    /// Run one loop pass, then let the selected task yield straight back
    fn turn(scheduler: &Scheduler<RecordingSwitch>) -> Option<TaskId> {
        let id = unsafe { scheduler.run_once() }?;
        scheduler.yield_now();
        Some(id)
    }

    #[test]
    fn test_initialize_prepares_scheduler_context() {
        let scheduler = scheduler();
        assert!(scheduler.is_initialized());

        let context = unsafe { *scheduler.scheduler_context() };
        let stack_base = scheduler.stack.get() as usize;
        assert_eq!(context.sp, stack_base + SCHED_STACK_SIZE);
        assert_eq!(context.saved[Context::ARG_REG], scheduler as *const _ as usize);
        assert_eq!(
            context.saved[Context::ENTRY_REG],
            scheduler_entry::<RecordingSwitch> as EntryPoint as usize
        );
    }

    #[test]
    fn test_spawn_enqueues_ready_task() {
        let scheduler = scheduler();
        let id = scheduler.spawn(task_entry, 42, 3, stack()).unwrap();

        assert_eq!(scheduler.task_state(id), Some(TaskState::Ready));
        assert_eq!(scheduler.task_priority(id), Some(3));
        assert_eq!(scheduler.ready_count(3), 1);
        assert_eq!(scheduler.current(), None);

        let context = unsafe { *scheduler.task_context(id).unwrap() };
        assert_eq!(context.saved[Context::ARG_REG], 42);
        assert_eq!(context.saved[Context::ENTRY_REG], task_entry as EntryPoint as usize);
    }

    #[test]
    fn test_spawn_rejects_bad_arguments() {
        let scheduler = scheduler();

        assert_eq!(
            scheduler.spawn(task_entry, 0, PRIO_LEVEL as u8, stack()),
            Err(SchedulerError::InvalidPriority { priority: PRIO_LEVEL as u8 })
        );

        let small = Box::leak(vec![0u8; MIN_TASK_STACK - 1].into_boxed_slice());
        assert_eq!(
            scheduler.spawn(task_entry, 0, 0, small),
            Err(SchedulerError::StackTooSmall { size: MIN_TASK_STACK - 1 })
        );

        for _ in 0..MAX_TASKS {
            scheduler.spawn(task_entry, 0, 0, stack()).unwrap();
        }
        assert_eq!(
            scheduler.spawn(task_entry, 0, 0, stack()),
            Err(SchedulerError::TaskTableFull)
        );
        assert_eq!(scheduler.task_count(), MAX_TASKS);
    }

    #[test]
    fn test_equal_priority_round_robin() {
        let scheduler = scheduler();
        let a = scheduler.spawn(task_entry, 0, 2, stack()).unwrap();
        let b = scheduler.spawn(task_entry, 0, 2, stack()).unwrap();
        let c = scheduler.spawn(task_entry, 0, 2, stack()).unwrap();

        let order: Vec<_> = (0..7).filter_map(|_| turn(scheduler)).collect();
        assert_eq!(order, [a, b, c, a, b, c, a]);
    }

    #[test]
    fn test_higher_priority_always_first() {
        let scheduler = scheduler();
        let low = scheduler.spawn(task_entry, 0, 1, stack()).unwrap();
        let high = scheduler.spawn(task_entry, 0, 0, stack()).unwrap();

        for _ in 0..3 {
            assert_eq!(turn(scheduler), Some(high));
            assert_eq!(scheduler.task_state(low), Some(TaskState::Ready));
        }
        assert_eq!(scheduler.ready_count(1), 1);
    }

    #[test]
    fn test_lower_priority_runs_when_alone() {
        let scheduler = scheduler();
        let low = scheduler.spawn(task_entry, 0, 5, stack()).unwrap();

        assert_eq!(turn(scheduler), Some(low));
        assert_eq!(turn(scheduler), Some(low));
    }

    #[test]
    fn test_spawn_during_turn_preempts_at_next_yield() {
        let scheduler = scheduler();
        let low = scheduler.spawn(task_entry, 0, 4, stack()).unwrap();

        // low runs and creates a higher-priority task before yielding
        assert_eq!(unsafe { scheduler.run_once() }, Some(low));
        let high = scheduler.spawn(task_entry, 0, 1, stack()).unwrap();
        assert_eq!(scheduler.task_state(low), Some(TaskState::Running));
        scheduler.yield_now();

        assert_eq!(turn(scheduler), Some(high));
        assert_eq!(scheduler.task_state(low), Some(TaskState::Ready));
    }

    #[test]
    fn test_switch_targets() {
        let scheduler = scheduler();
        let a = scheduler.spawn(task_entry, 0, 0, stack()).unwrap();
        let sched_ctx = scheduler.scheduler_context() as usize;
        let task_ctx = scheduler.task_context(a).unwrap() as usize;

        turn(scheduler);

        let log = scheduler.switch.log.borrow();
        assert_eq!(*log, [(sched_ctx, task_ctx), (task_ctx, sched_ctx)]);
    }

    #[test]
    fn test_running_task_not_queued() {
        let scheduler = scheduler();
        let a = scheduler.spawn(task_entry, 0, 0, stack()).unwrap();
        scheduler.spawn(task_entry, 0, 0, stack()).unwrap();

        unsafe { scheduler.run_once() };
        assert_eq!(scheduler.current(), Some(a));
        assert_eq!(scheduler.task_state(a), Some(TaskState::Running));
        assert_eq!(scheduler.ready_count(0), 1);
    }

    #[test]
    fn test_idle_does_not_switch() {
        let scheduler = scheduler();

        assert_eq!(unsafe { scheduler.run_once() }, None);
        assert!(scheduler.switch.log.borrow().is_empty());
        assert_eq!(scheduler.dispatches(), 0);
    }

    #[test]
    fn test_single_task_reselected() {
        let scheduler = scheduler();
        let a = scheduler.spawn(task_entry, 0, 0, stack()).unwrap();

        assert_eq!(turn(scheduler), Some(a));
        // a yielded; the pass requeues it and selects it again
        assert_eq!(turn(scheduler), Some(a));
        assert_eq!(scheduler.dispatches(), 2);
        assert_eq!(scheduler.ready_count(0), 0);
    }

    #[test]
    fn test_yield_without_current_task_is_noop() {
        let scheduler = scheduler();
        scheduler.spawn(task_entry, 0, 0, stack()).unwrap();

        scheduler.yield_now();
        assert!(scheduler.switch.log.borrow().is_empty());

        let uninitialized = Scheduler::new(RecordingSwitch::default());
        uninitialized.yield_now();
        assert!(uninitialized.switch.log.borrow().is_empty());
    }

    #[test]
    fn test_initialize_twice_keeps_context() {
        let scheduler = scheduler();
        let before = unsafe { *scheduler.scheduler_context() };
        unsafe { scheduler.initialize() };
        assert_eq!(unsafe { *scheduler.scheduler_context() }, before);
    }

    #[test]
    fn test_concurrent_spawn_keeps_queues_consistent() {
        let scheduler: &'static Scheduler<NullSwitch> =
            Box::leak(Box::new(Scheduler::new(NullSwitch)));

        std::thread::scope(|s| {
            for priority in 0..2u8 {
                s.spawn(move || {
                    for _ in 0..MAX_TASKS / 2 {
                        scheduler.spawn(task_entry, 0, priority, stack()).unwrap();
                    }
                });
            }
        });

        assert_eq!(scheduler.task_count(), MAX_TASKS);
        assert_eq!(scheduler.ready_count(0), MAX_TASKS / 2);
        assert_eq!(scheduler.ready_count(1), MAX_TASKS / 2);

        // every queued task is reachable exactly once
        unsafe { scheduler.initialize() };
        let mut seen: Vec<TaskId> = (0..MAX_TASKS / 2)
            .map(|_| unsafe { scheduler.run_once() }.unwrap())
            .collect();
        assert!(seen.iter().all(|&id| scheduler.task_priority(id) == Some(0)));
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), MAX_TASKS / 2);
    }
}
