//! # Scheduler
//!
//! Cooperative, priority-first, period-gated dispatch over a fixed task
//! table.
//!
//! ## Dispatch Algorithm
//!
//! Each call to [`Scheduler::run_once`]:
//! 1. **Filter**: tasks that are not dead and whose `next_run_ms ≤ now`
//! 2. **Select**: highest priority; ties go to the earliest `next_run_ms`,
//!    then to registration order
//! 3. **Resume**: run the body for exactly one step
//! 4. **Re-arm**: `next_run_ms += period` (fixed rate, no drift from
//!    dispatch overhead)
//!
//! A body that exits instead of yielding is isolated: the task is marked
//! dead, a fault is counted and logged, and the remaining tasks keep
//! running.
//!
//! Lower-priority tasks starve if higher ones are always due. That is a
//! property of the configuration, not a runtime fault: priorities are
//! definitive, periods are advisory.

use core::fmt;

use heapless::Vec;

use crate::config::MAX_TASKS;
use crate::error::ConfigError;
use crate::task::{Step, Task, TaskId, TaskState};
use crate::{log_error, log_info};

/// How a dispatched task handed back control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Suspended normally and re-armed for its next period.
    Yielded,
    /// Body terminated; the task is now dead.
    Terminated,
}

/// Result of a dispatch cycle that ran a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dispatch {
    pub task: TaskId,
    pub outcome: Outcome,
}

/// Fixed table of tasks plus dispatch counters.
pub struct Scheduler<'a> {
    tasks: Vec<Task<'a>, MAX_TASKS>,
    dispatches: u64,
    idle_cycles: u64,
    faults: u32,
}

impl<'a> Scheduler<'a> {
    pub const fn new() -> Self {
        Self {
            tasks: Vec::new(),
            dispatches: 0,
            idle_cycles: 0,
            faults: 0,
        }
    }

    /// Register a task.
    ///
    /// # Errors
    /// - [`ConfigError::DuplicateTaskName`] if the name is taken
    /// - [`ConfigError::TaskTableFull`] past `MAX_TASKS`
    pub fn append(&mut self, task: Task<'a>) -> Result<TaskId, ConfigError> {
        if self.find(task.name()).is_some() {
            return Err(ConfigError::DuplicateTaskName(task.name()));
        }
        let id = TaskId(self.tasks.len());
        let name = task.name();
        let config = task.config();
        self.tasks
            .push(task)
            .map_err(|_| ConfigError::TaskTableFull)?;
        log_info!(
            "registered task {} (priority {}, period {} ms)",
            name,
            config.priority,
            config.period_ms
        );
        Ok(id)
    }

    /// Make every task due at `now_ms`. Call once before the first dispatch.
    pub fn start(&mut self, now_ms: u64) {
        for task in self.tasks.iter_mut() {
            task.next_run_ms = now_ms;
        }
        log_info!("scheduler started with {} tasks at {} ms", self.tasks.len(), now_ms);
    }

    /// Perform one dispatch decision.
    ///
    /// Returns the task that ran and how it suspended, or `None` if nothing
    /// was due.
    pub fn run_once(&mut self, now_ms: u64) -> Option<Dispatch> {
        let Some(idx) = self.select(now_ms) else {
            self.idle_cycles += 1;
            return None;
        };

        self.dispatches += 1;
        let task = &mut self.tasks[idx];
        let outcome = match task.resume(now_ms) {
            Step::Yield => Outcome::Yielded,
            Step::Exit => {
                self.faults += 1;
                log_error!(
                    "task {} terminated unexpectedly after {} runs",
                    task.name(),
                    task.stats().runs
                );
                Outcome::Terminated
            }
        };

        Some(Dispatch {
            task: TaskId(idx),
            outcome,
        })
    }

    /// Index of the task that should run at `now_ms`.
    fn select(&self, now_ms: u64) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, task) in self.tasks.iter().enumerate() {
            if !task.is_eligible(now_ms) {
                continue;
            }
            best = match best {
                None => Some(i),
                Some(b) => {
                    let current = &self.tasks[b];
                    // Strictly better only; earlier registration keeps ties
                    let better = task.priority() > current.priority()
                        || (task.priority() == current.priority()
                            && task.next_run_ms() < current.next_run_ms());
                    if better {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        best
    }

    /// Run every task's shutdown hook, dead tasks included.
    pub fn shutdown(&mut self) {
        for task in self.tasks.iter_mut() {
            task.body.shutdown();
            if task.state != TaskState::Dead {
                task.state = TaskState::Waiting;
            }
        }
    }

    pub fn task(&self, id: TaskId) -> Option<&Task<'a>> {
        self.tasks.get(id.0)
    }

    /// Look a task up by name.
    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.tasks
            .iter()
            .position(|t| t.name() == name)
            .map(TaskId)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task<'a>> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Dispatch cycles that resumed a task.
    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }

    /// Dispatch cycles that found nothing due.
    pub fn idle_cycles(&self) -> u64 {
        self.idle_cycles
    }

    /// Tasks that terminated unexpectedly.
    pub fn faults(&self) -> u32 {
        self.faults
    }

    /// Tasks still eligible for scheduling.
    pub fn live_tasks(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.state() != TaskState::Dead)
            .count()
    }
}

impl Default for Scheduler<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Task table, one line per task.
impl fmt::Display for Scheduler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16}{:>4}{:>8}  {:<8}{:>8}{:>6}",
            "TASK", "PRI", "PERIOD", "STATE", "RUNS", "LATE"
        )?;
        for task in self.tasks.iter() {
            writeln!(f, "{}", task)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
