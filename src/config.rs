//! # Configuration
//!
//! Compile-time constants governing the scheduler, the control loop and the
//! telemetry stream, plus the small runtime [`SessionConfig`] that selects
//! the startup handshake. Everything with a size is fixed at compile
//! time; there is no dynamic allocation.

/// Maximum number of tasks the scheduler can hold. Bounds the task table.
pub const MAX_TASKS: usize = 8;

/// SysTick frequency in Hz. One tick is one scheduler millisecond.
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (STM32F4 at 16 MHz HSI, the reset default).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Actuator command saturation, in percent of full scale.
pub const EFFORT_LIMIT: f32 = 100.0;

/// Counts per wrap of the position sensor (16-bit timer counter).
pub const ENCODER_MODULUS: u32 = 1 << 16;

/// Byte capacity of the control → telemetry queue.
///
/// Must exceed what the control task enqueues between two telemetry
/// resumes. 250 control steps per telemetry period at ~16 bytes a line sits
/// right at this limit; overflow is counted by the queue.
pub const TELEMETRY_QUEUE_CAPACITY: usize = 4000;

/// Control task priority (higher runs first).
pub const CONTROL_PRIORITY: u8 = 2;

/// Control task period in milliseconds.
pub const CONTROL_PERIOD_MS: u32 = 10;

/// Telemetry task priority.
pub const TELEMETRY_PRIORITY: u8 = 1;

/// Telemetry task period in milliseconds.
pub const TELEMETRY_PERIOD_MS: u32 = 2500;

/// Longest encoded telemetry line: u64 elapsed, i64 position, `,` and `\r\n`.
pub const SAMPLE_LINE_MAX: usize = 48;

/// Receive buffer for one handshake line.
pub const LINE_BUFFER_SIZE: usize = 32;

/// Bytes moved from the queue to the transport per write call.
pub const DRAIN_CHUNK: usize = 64;

/// Startup exchange performed before any task runs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Handshake {
    /// Start immediately with the configured setpoint and gain.
    None,
    /// Block until the host sends the literal `ready` line.
    AwaitReady,
    /// Block for two lines from the host: integer setpoint, then float gain.
    ReceiveParameters,
}

/// Per-session runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionConfig {
    /// Startup handshake variant.
    pub handshake: Handshake,
    /// Setpoint used unless the host supplies one.
    pub setpoint: i32,
    /// Proportional gain used unless the host supplies one.
    pub gain: f32,
    /// Emit the `end` sentinel on shutdown (multi-actuator deployments).
    pub end_sentinel: bool,
}

impl SessionConfig {
    pub const fn new() -> Self {
        Self {
            handshake: Handshake::ReceiveParameters,
            setpoint: 0,
            gain: 0.0,
            end_sentinel: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
