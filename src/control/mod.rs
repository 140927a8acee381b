//! # Position Control
//!
//! The closed loop: unwrap the sensor count into an absolute position, apply
//! the proportional law, saturate, drive the actuator, and hand a telemetry
//! line to the queue.

pub mod controller;
pub mod position;
pub mod task;

pub use controller::{saturate, Controller};
pub use position::unwrap_delta;
pub use task::ControlTask;
