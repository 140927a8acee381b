//! # Tasks
//!
//! A task is a resumable unit of cooperative work. Its body is an explicit
//! state machine: every call to [`TaskBody::step`] performs one logical unit
//! of work and returns, and the return *is* the suspension point. The body
//! keeps whatever it needs to resume in its own fields.
//!
//! ```text
//!   ┌──────────┐   due & selected   ┌─────────┐
//!   │ Waiting  │ ─────────────────► │ Running │
//!   └──────────┘                    └─────────┘
//!        ▲      Step::Yield              │
//!        └───────────────────────────────┤
//!                                        │ Step::Exit
//!                                        ▼
//!                                   ┌─────────┐
//!                                   │  Dead   │
//!                                   └─────────┘
//! ```

use core::fmt;

// ---------------------------------------------------------------------------
// Task body contract
// ---------------------------------------------------------------------------

/// What a body reports when it hands control back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Work for this period is done; resume me next period.
    Yield,
    /// The body has finished for good. The scheduler treats this as a fault.
    Exit,
}

/// Information handed to a body on each resume.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    /// Scheduler time of this dispatch, in milliseconds.
    pub now_ms: u64,
    /// How many times this task has been resumed before.
    pub runs: u32,
}

/// The work a task performs.
pub trait TaskBody {
    /// Run one step and suspend.
    fn step(&mut self, cx: &Context) -> Step;

    /// Called once when dispatching stops. Put outputs in a safe state here.
    fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// Task state
// ---------------------------------------------------------------------------

/// Execution state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    /// Suspended until its next run time.
    Waiting,
    /// Currently being resumed.
    Running,
    /// Body exited; never scheduled again.
    Dead,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Waiting => "waiting",
            TaskState::Running => "running",
            TaskState::Dead => "dead",
        };
        f.pad(s)
    }
}

/// Static scheduling parameters, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskConfig {
    /// Higher value wins when several tasks are due.
    pub priority: u8,
    /// Minimum interval between resumes, in milliseconds.
    pub period_ms: u32,
}

/// Runtime counters kept per task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskStats {
    /// Completed resumes.
    pub runs: u32,
    /// Resumes that started a full period or more after they were due.
    pub late_runs: u32,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Index of a task in the scheduler, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId(pub usize);

/// A registered task: name, schedule, state and the body it resumes.
pub struct Task<'a> {
    name: &'static str,
    config: TaskConfig,
    pub(crate) state: TaskState,
    pub(crate) next_run_ms: u64,
    pub(crate) stats: TaskStats,
    pub(crate) body: &'a mut dyn TaskBody,
}

impl<'a> Task<'a> {
    /// Create a task. It becomes due when the scheduler starts.
    pub fn new(
        name: &'static str,
        priority: u8,
        period_ms: u32,
        body: &'a mut dyn TaskBody,
    ) -> Self {
        Self {
            name,
            config: TaskConfig {
                priority,
                period_ms,
            },
            state: TaskState::Waiting,
            next_run_ms: 0,
            stats: TaskStats::default(),
            body,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> TaskConfig {
        self.config
    }

    pub fn priority(&self) -> u8 {
        self.config.priority
    }

    pub fn period_ms(&self) -> u32 {
        self.config.period_ms
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Earliest time at which this task may be resumed again.
    pub fn next_run_ms(&self) -> u64 {
        self.next_run_ms
    }

    pub fn stats(&self) -> TaskStats {
        self.stats
    }

    /// Due at `now` and not dead.
    #[inline]
    pub fn is_eligible(&self, now_ms: u64) -> bool {
        self.state != TaskState::Dead && now_ms >= self.next_run_ms
    }

    /// Resume the body for one step and book-keep the result.
    pub(crate) fn resume(&mut self, now_ms: u64) -> Step {
        let period = u64::from(self.config.period_ms);
        if now_ms >= self.next_run_ms.saturating_add(period) && period > 0 {
            self.stats.late_runs += 1;
        }

        self.state = TaskState::Running;
        let cx = Context {
            now_ms,
            runs: self.stats.runs,
        };
        let step = self.body.step(&cx);

        match step {
            Step::Yield => {
                self.stats.runs += 1;
                self.next_run_ms += period;
                self.state = TaskState::Waiting;
            }
            Step::Exit => self.state = TaskState::Dead,
        }
        step
    }
}

impl fmt::Display for Task<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16}{:>4}{:>8}  {:<8}{:>8}{:>6}",
            self.name,
            self.config.priority,
            self.config.period_ms,
            self.state,
            self.stats.runs,
            self.stats.late_runs,
        )
    }
}

impl fmt::Debug for Task<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("next_run_ms", &self.next_run_ms)
            .field("stats", &self.stats)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        steps: u32,
        exit_after: Option<u32>,
    }

    impl TaskBody for Counter {
        fn step(&mut self, _cx: &Context) -> Step {
            self.steps += 1;
            match self.exit_after {
                Some(n) if self.steps >= n => Step::Exit,
                _ => Step::Yield,
            }
        }
    }

    #[test]
    fn test_task_creation() {
        let mut body = Counter { steps: 0, exit_after: None };
        let task = Task::new("ctl", 2, 10, &mut body);
        assert_eq!(task.name(), "ctl");
        assert_eq!(task.priority(), 2);
        assert_eq!(task.period_ms(), 10);
        assert_eq!(task.state(), TaskState::Waiting);
        assert_eq!(task.stats(), TaskStats::default());
    }

    #[test]
    fn test_eligibility_follows_next_run() {
        let mut body = Counter { steps: 0, exit_after: None };
        let mut task = Task::new("t", 1, 10, &mut body);
        task.next_run_ms = 100;
        assert!(!task.is_eligible(99));
        assert!(task.is_eligible(100));
        assert!(task.is_eligible(250));
    }

    #[test]
    fn test_resume_advances_by_period() {
        let mut body = Counter { steps: 0, exit_after: None };
        let mut task = Task::new("t", 1, 10, &mut body);
        assert_eq!(task.resume(0), Step::Yield);
        assert_eq!(task.next_run_ms(), 10);
        assert_eq!(task.state(), TaskState::Waiting);
        // Late dispatch still advances by exactly one period
        assert_eq!(task.resume(13), Step::Yield);
        assert_eq!(task.next_run_ms(), 20);
        assert_eq!(task.stats().runs, 2);
        assert_eq!(task.stats().late_runs, 0);
    }

    #[test]
    fn test_late_run_counted() {
        let mut body = Counter { steps: 0, exit_after: None };
        let mut task = Task::new("t", 1, 10, &mut body);
        task.resume(25);
        assert_eq!(task.stats().late_runs, 1);
    }

    #[test]
    fn test_exit_marks_dead() {
        let mut body = Counter { steps: 0, exit_after: Some(1) };
        let mut task = Task::new("t", 1, 10, &mut body);
        assert_eq!(task.resume(0), Step::Exit);
        assert_eq!(task.state(), TaskState::Dead);
        assert!(!task.is_eligible(1_000));
        assert_eq!(task.next_run_ms(), 0);
    }

    #[test]
    fn test_body_sees_run_count() {
        struct Probe(u32);
        impl TaskBody for Probe {
            fn step(&mut self, cx: &Context) -> Step {
                self.0 = cx.runs;
                Step::Yield
            }
        }
        let mut probe = Probe(u32::MAX);
        {
            let mut task = Task::new("p", 1, 5, &mut probe);
            task.resume(0);
            task.resume(5);
            task.resume(10);
        }
        assert_eq!(probe.0, 2);
    }
}
