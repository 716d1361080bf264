//! Delayed one-shot tasks on a logical tick clock.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::trace;

use super::bus::lock;

/// Work the scheduler runs once when its delay elapses.
pub type TaskAction = Box<dyn FnOnce() + Send>;

/// Opaque token identifying one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// What the bridge needs from the host's scheduler.
pub trait Scheduler: Send + Sync {
    fn schedule_once_after(&self, delay_ticks: u64, action: TaskAction) -> TaskHandle;

    /// Returns false if the task already fired or was never scheduled.
    fn cancel(&self, handle: TaskHandle) -> bool;
}

struct PendingTask {
    fire_at: u64,
    action: TaskAction,
}

#[derive(Default)]
struct SchedulerState {
    now: u64,
    next_id: u64,
    tasks: HashMap<TaskHandle, PendingTask>,
}

/// Scheduler driven by explicit ticks rather than wall time.
#[derive(Default)]
pub struct TickScheduler {
    state: Mutex<SchedulerState>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick.
    pub fn now(&self) -> u64 {
        lock(&self.state).now
    }

    /// Number of tasks that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        lock(&self.state).tasks.len()
    }

    /// Advance one tick and run everything due. Returns how many tasks fired.
    pub fn tick(&self) -> usize {
        let mut due: Vec<(TaskHandle, PendingTask)> = {
            let mut state = lock(&self.state);
            state.now += 1;
            let now = state.now;
            let ready: Vec<TaskHandle> = state
                .tasks
                .iter()
                .filter(|(_, task)| task.fire_at <= now)
                .map(|(handle, _)| *handle)
                .collect();
            ready
                .into_iter()
                .filter_map(|handle| state.tasks.remove(&handle).map(|task| (handle, task)))
                .collect()
        };

        // Scheduling order within a tick.
        due.sort_by_key(|(handle, _)| handle.0);
        let fired = due.len();
        for (handle, task) in due {
            trace!(target: "host", "Firing task {:?}", handle);
            (task.action)();
        }
        fired
    }

    /// Advance `ticks` ticks. Returns how many tasks fired in total.
    pub fn advance(&self, ticks: u64) -> usize {
        (0..ticks).map(|_| self.tick()).sum()
    }
}

impl Scheduler for TickScheduler {
    fn schedule_once_after(&self, delay_ticks: u64, action: TaskAction) -> TaskHandle {
        let mut state = lock(&self.state);
        let handle = TaskHandle(state.next_id);
        state.next_id += 1;
        // A zero delay still waits for the next tick.
        let fire_at = state.now + delay_ticks.max(1);
        state.tasks.insert(handle, PendingTask { fire_at, action });
        handle
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        lock(&self.state).tasks.remove(&handle).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_task(counter: &Arc<AtomicUsize>) -> TaskAction {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_task_fires_once_after_delay() {
        let scheduler = TickScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        scheduler.schedule_once_after(5, counter_task(&fired));

        assert_eq!(scheduler.advance(4), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.advance(10), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_cancelled_task_never_fires() {
        let scheduler = TickScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule_once_after(5, counter_task(&fired));

        scheduler.advance(2);
        assert!(scheduler.cancel(handle));
        scheduler.advance(5);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!scheduler.cancel(handle));
    }

    #[test]
    fn test_zero_delay_waits_for_next_tick() {
        let scheduler = TickScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        scheduler.schedule_once_after(0, counter_task(&fired));

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(scheduler.now(), 1);
    }

    #[test]
    fn test_action_may_schedule_more_work() {
        let scheduler = Arc::new(TickScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let inner = counter_task(&fired);
        let sched = Arc::clone(&scheduler);
        scheduler.schedule_once_after(
            1,
            Box::new(move || {
                sched.schedule_once_after(1, inner);
            }),
        );

        scheduler.tick();
        assert_eq!(scheduler.pending(), 1);
        scheduler.tick();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
