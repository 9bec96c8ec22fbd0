use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

pub type TickTask = Box<dyn FnMut(u64) + Send>;

/// "Run this every N ticks" capability.
pub trait Scheduler: Send + Sync {
    fn register_repeating(&self, period_ticks: u64, task: TickTask) -> TaskId;
    fn cancel(&self, id: TaskId);
}

struct ScheduledTask {
    id: TaskId,
    period: u64,
    task: TickTask,
}

/// Single-threaded repeating task runner.
///
/// Tasks may register or cancel tasks (including themselves) while running;
/// the changes apply from the next tick on.
#[derive(Default)]
pub struct Ticker {
    tasks: Mutex<Vec<ScheduledTask>>,
    cancelled: Mutex<HashSet<TaskId>>,
    next_id: AtomicU64,
    current_tick: AtomicU64,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Acquire)
    }

    pub fn task_count(&self) -> usize {
        let tasks = self.tasks.lock();
        let cancelled = self.cancelled.lock();
        tasks
            .iter()
            .filter(|t| !cancelled.contains(&t.id))
            .count()
    }

    pub fn is_scheduled(&self, id: TaskId) -> bool {
        let tasks = self.tasks.lock();
        let cancelled = self.cancelled.lock();
        !cancelled.contains(&id) && tasks.iter().any(|t| t.id == id)
    }

    /// Advances one tick and runs every task whose period divides it.
    pub fn tick(&self) -> u64 {
        let tick = self.current_tick.fetch_add(1, Ordering::AcqRel) + 1;

        let mut running = std::mem::take(&mut *self.tasks.lock());
        for scheduled in &mut running {
            if self.cancelled.lock().contains(&scheduled.id) {
                continue;
            }
            if tick % scheduled.period == 0 {
                (scheduled.task)(tick);
            }
        }

        let mut tasks = self.tasks.lock();
        let mut cancelled = self.cancelled.lock();
        running.append(&mut *tasks);
        running.retain(|t| !cancelled.remove(&t.id));
        *tasks = running;

        tick
    }
}

impl Scheduler for Ticker {
    fn register_repeating(&self, period_ticks: u64, task: TickTask) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tasks.lock().push(ScheduledTask {
            id,
            period: period_ticks.max(1),
            task,
        });
        id
    }

    fn cancel(&self, id: TaskId) {
        self.cancelled.lock().insert(id);
    }
}

/// Converts wall-clock deltas into a whole number of fixed ticks.
pub struct FixedTimestep {
    tick_rate: u32,
    dt: f32,
    accumulator: f32,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            dt: 1.0 / tick_rate as f32,
            accumulator: 0.0,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn accumulate(&mut self, delta: f32) {
        self.accumulator += delta.min(0.25);
    }

    pub fn should_tick(&self) -> bool {
        self.accumulator >= self.dt
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            true
        } else {
            false
        }
    }
}
