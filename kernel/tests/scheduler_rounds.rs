//! End-to-end scheduling tests
//!
//! `Simulated` stands in for the hardware switch: every transfer into a task
//! records the task's argument register, which the tests use as a label.
//! Returning from a switch plays the role of the task yielding back.

use std::cell::{Cell, RefCell};

use rvos_kernel::arch::{Context, ContextSwitch};
use rvos_kernel::config::{MIN_TASK_STACK, PRIO_LEVEL};
use rvos_kernel::{Scheduler, SchedulerError, TaskState};

#[derive(Default)]
struct Simulated {
    scheduler_context: Cell<usize>,
    ran: RefCell<Vec<usize>>,
}

impl ContextSwitch for Simulated {
    unsafe fn switch(&self, _from: *mut Context, to: *const Context) {
        if to as usize != self.scheduler_context.get() {
            self.ran.borrow_mut().push((*to).saved[Context::ARG_REG]);
        }
    }
}

type TestScheduler = Scheduler<&'static Simulated>;

extern "C" fn worker(_label: usize) -> ! {
    loop {
        std::hint::spin_loop();
    }
}

fn stack() -> &'static mut [u8] {
    Box::leak(vec![0u8; MIN_TASK_STACK].into_boxed_slice())
}

fn setup() -> (&'static TestScheduler, &'static Simulated) {
    let switch: &'static Simulated = Box::leak(Box::new(Simulated::default()));
    let scheduler: &'static TestScheduler = Box::leak(Box::new(Scheduler::new(switch)));
    unsafe { scheduler.initialize() };
    switch.scheduler_context.set(scheduler.scheduler_context() as usize);
    (scheduler, switch)
}

/// Let the scheduling loop make `passes` decisions, each selected task
/// yielding straight back; returns the labels of the tasks that ran
fn run(scheduler: &TestScheduler, switch: &Simulated, passes: usize) -> String {
    for _ in 0..passes {
        if unsafe { scheduler.run_once() }.is_some() {
            scheduler.yield_now();
        }
    }
    switch.ran.take().into_iter().map(|label| label as u8 as char).collect()
}

fn spawn(scheduler: &TestScheduler, label: char, priority: u8) {
    scheduler.spawn(worker, label as usize, priority, stack()).unwrap();
}

#[test]
fn test_three_equal_tasks_round_robin() {
    let (scheduler, switch) = setup();
    for label in ['A', 'B', 'C'] {
        spawn(scheduler, label, 3);
    }

    assert_eq!(run(scheduler, switch, 9), "ABCABCABC");
}

#[test]
fn test_strict_priority_across_levels() {
    let (scheduler, switch) = setup();
    spawn(scheduler, 'L', 1);
    spawn(scheduler, 'H', 0);
    spawn(scheduler, 'h', 0);

    // the priority-1 task never runs while priority 0 has ready tasks
    assert_eq!(run(scheduler, switch, 6), "HhHhHh");
    assert_eq!(scheduler.ready_count(1), 1);
}

#[test]
fn test_highest_level_keeps_cpu() {
    let (scheduler, switch) = setup();
    for priority in (0..PRIO_LEVEL as u8).rev() {
        spawn(scheduler, (b'0' + priority) as char, priority);
    }

    assert_eq!(run(scheduler, switch, 3), "000");
}

#[test]
fn test_idle_passes_do_not_dispatch() {
    let (scheduler, switch) = setup();

    assert_eq!(run(scheduler, switch, 5), "");
    assert_eq!(scheduler.current(), None);
    assert_eq!(scheduler.dispatches(), 0);
}

#[test]
fn test_late_spawn_joins_queue_tail() {
    let (scheduler, switch) = setup();
    spawn(scheduler, 'A', 2);
    spawn(scheduler, 'B', 2);
    assert_eq!(run(scheduler, switch, 3), "ABA");

    // A is running; C goes behind B, and A behind C once it yields
    spawn(scheduler, 'C', 2);
    assert_eq!(run(scheduler, switch, 4), "BCAB");
}

#[test]
fn test_states_after_selection() {
    let (scheduler, _switch) = setup();
    let a = scheduler.spawn(worker, 'A' as usize, 0, stack()).unwrap();
    let b = scheduler.spawn(worker, 'B' as usize, 0, stack()).unwrap();

    assert_eq!(unsafe { scheduler.run_once() }, Some(a));
    assert_eq!(scheduler.task_state(a), Some(TaskState::Running));
    assert_eq!(scheduler.task_state(b), Some(TaskState::Ready));
    scheduler.yield_now();

    assert_eq!(unsafe { scheduler.run_once() }, Some(b));
    assert_eq!(scheduler.task_state(a), Some(TaskState::Ready));
    assert_eq!(scheduler.task_state(b), Some(TaskState::Running));
    assert_eq!(scheduler.current(), Some(b));
}

#[test]
fn test_spawn_errors_leave_scheduler_usable() {
    let (scheduler, switch) = setup();

    let err = scheduler.spawn(worker, 0, PRIO_LEVEL as u8, stack()).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidPriority { .. }));
    assert_eq!(scheduler.task_count(), 0);

    spawn(scheduler, 'A', 0);
    assert_eq!(run(scheduler, switch, 2), "AA");
}
