//! The periodic control task.

use embassy_sync::blocking_mutex::raw::{NoopRawMutex, RawMutex};

use super::controller::{saturate, Controller};
use crate::config::EFFORT_LIMIT;
use crate::drivers::{Actuator, PositionSensor};
use crate::sync::{Queue, Share};
use crate::task::{Context, Step, TaskBody};
use crate::telemetry::Sample;
use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Phase {
    /// Zero the position and capture the start time on the next resume.
    Init,
    Running,
}

/// Reads the sensor, runs the controller, drives the actuator and queues a
/// telemetry line, once per resume.
///
/// The first resume zeroes the position at the current sensor count and
/// then runs a normal control step in the same call.
pub struct ControlTask<'a, S, A, const N: usize, M: RawMutex = NoopRawMutex> {
    sensor: S,
    actuator: A,
    controller: Controller,
    telemetry: &'a Queue<u8, N, M>,
    status: Option<&'a Share<Sample, M>>,
    phase: Phase,
    raw: u32,
    position: i64,
    start_ms: u64,
    truncated_lines: u32,
}

impl<'a, S, A, const N: usize, M> ControlTask<'a, S, A, N, M>
where
    S: PositionSensor,
    A: Actuator,
    M: RawMutex,
{
    pub fn new(
        sensor: S,
        actuator: A,
        controller: Controller,
        telemetry: &'a Queue<u8, N, M>,
    ) -> Self {
        Self {
            sensor,
            actuator,
            controller,
            telemetry,
            status: None,
            phase: Phase::Init,
            raw: 0,
            position: 0,
            start_ms: 0,
            truncated_lines: 0,
        }
    }

    /// Also publish every [`Sample`] into `status`.
    pub fn with_status(mut self, status: &'a Share<Sample, M>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Unwrapped position since the first resume.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Telemetry lines that did not fit the queue in full.
    pub fn truncated_lines(&self) -> u32 {
        self.truncated_lines
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    fn init(&mut self, now_ms: u64) {
        self.raw = self.sensor.read();
        self.position = 0;
        self.start_ms = now_ms;
        self.phase = Phase::Running;
        log_info!(
            "control start: setpoint {}, gain {}",
            self.controller.setpoint(),
            self.controller.gain()
        );
    }
}

impl<S, A, const N: usize, M> TaskBody for ControlTask<'_, S, A, N, M>
where
    S: PositionSensor,
    A: Actuator,
    M: RawMutex,
{
    fn step(&mut self, cx: &Context) -> Step {
        if self.phase == Phase::Init {
            self.init(cx.now_ms);
        }

        let (raw, position) = self.sensor.update(self.raw, self.position);
        self.raw = raw;
        self.position = position;

        let mut sample = Sample {
            elapsed_ms: cx.now_ms.saturating_sub(self.start_ms),
            position,
            effort: 0.0,
        };

        let line = sample.encode();
        let accepted = self.telemetry.push_slice(line.as_bytes());
        if accepted < line.len() {
            self.truncated_lines += 1;
            log_warn!(
                "telemetry queue full: kept {} of {} bytes at {} ms",
                accepted,
                line.len(),
                sample.elapsed_ms
            );
        }

        sample.effort = saturate(self.controller.run(position), EFFORT_LIMIT);
        self.actuator.set_output(sample.effort);

        if let Some(status) = self.status {
            status.write(sample);
        }

        Step::Yield
    }

    fn shutdown(&mut self) {
        self.actuator.set_output(0.0);
        log_info!("control stopped at position {}", self.position);
    }
}
