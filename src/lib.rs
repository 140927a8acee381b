//! # coop-servo
//!
//! A cooperative priority scheduler for small microcontrollers, and the
//! motor position loop it was built to run.
//!
//! ## Overview
//!
//! A fixed set of periodic tasks shares one core. Each task is an explicit
//! state machine that does one unit of work per resume and hands control
//! back. The scheduler always resumes the highest-priority task that is due;
//! periods gate re-entry but never preempt.
//!
//! Tasks exchange data through two primitives:
//!
//! - **Share**: a single slot, last writer wins
//! - **Queue**: a bounded FIFO that rejects or evicts on overflow
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │        Firmware (main.rs, feature = "firmware")         │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │        startup() · add_task() · run() · run_for()       │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Scheduler   │   Tasks            │  Sync Primitives  │
//! │  scheduler.rs│   control/         │  sync/            │
//! │  ─ append()  │   ─ ControlTask    │  ─ Share          │
//! │  ─ run_once()│   telemetry/       │  ─ Queue          │
//! │  ─ shutdown()│   ─ TelemetryTask  │                   │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │        Task Model (task.rs) · Drivers (drivers/)        │
//! │      TaskBody · Step · TaskState · Sensor/Actuator      │
//! ├────────────────────────────────────────────────────────┤
//! │     Board Port (arch/cortex_m4.rs, arch/stm32f4.rs)     │
//! │       SysTick clock · TIM4 encoder · TIM3 PWM · USART2  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Control Loop
//!
//! Every 10 ms the control task unwraps the 16-bit encoder count into an
//! absolute position, computes `gain * (setpoint - position)`, clamps it to
//! ±100 % and drives the motor. It also queues `elapsed_ms,position\r\n`.
//! Every 2.5 s the telemetry task writes the queued bytes to the serial
//! link followed by `done\r\n`.
//!
//! ## Memory Model
//!
//! - **No heap**: queues and the task table are fixed-capacity `heapless`
//!   containers
//! - **No globals in the library**: tasks receive references to exactly the
//!   primitives and drivers they use
//! - **Lock discipline by type**: `NoopRawMutex` for task-only data,
//!   `CriticalSectionRawMutex` when an interrupt handler shares it

#![cfg_attr(not(test), no_std)]

pub mod log;

pub mod config;
pub mod error;
pub mod sync;
pub mod task;
pub mod scheduler;
pub mod kernel;
pub mod drivers;
pub mod control;
pub mod telemetry;
#[cfg(feature = "firmware")]
pub mod arch;

pub use error::{ConfigError, TransportError};
pub use kernel::{Clock, Kernel, RunSummary};
pub use scheduler::{Dispatch, Outcome, Scheduler};
pub use task::{Context, Step, Task, TaskBody, TaskId, TaskState};
