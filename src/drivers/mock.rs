//! Host-side driver doubles for unit tests.

use std::collections::VecDeque;
use std::vec::Vec;

use super::{Actuator, PositionSensor, SerialTransport};
use crate::error::TransportError;

/// Replays a fixed list of raw counts, repeating the last one.
pub struct MockSensor {
    readings: Vec<u32>,
    next: usize,
    modulus: u32,
}

impl MockSensor {
    pub fn new(modulus: u32, readings: &[u32]) -> Self {
        Self {
            readings: readings.to_vec(),
            next: 0,
            modulus,
        }
    }
}

impl PositionSensor for MockSensor {
    fn read(&mut self) -> u32 {
        let idx = self.next.min(self.readings.len().saturating_sub(1));
        self.next += 1;
        self.readings.get(idx).copied().unwrap_or(0)
    }

    fn modulus(&self) -> u32 {
        self.modulus
    }
}

/// Records every commanded output.
#[derive(Default)]
pub struct MockActuator {
    pub outputs: Vec<f32>,
}

impl MockActuator {
    pub fn last(&self) -> Option<f32> {
        self.outputs.last().copied()
    }
}

impl Actuator for MockActuator {
    fn set_output(&mut self, percent: f32) {
        self.outputs.push(percent);
    }
}

/// Captures written bytes and serves queued input lines.
#[derive(Default)]
pub struct MockTransport {
    pub written: Vec<u8>,
    /// One entry per `write` call.
    pub writes: Vec<Vec<u8>>,
    pub incoming: VecDeque<Vec<u8>>,
    /// Fail every write with `TransportError::Io` while set.
    pub fail_writes: bool,
}

impl MockTransport {
    pub fn with_lines(lines: &[&[u8]]) -> Self {
        Self {
            incoming: lines.iter().map(|l| l.to_vec()).collect(),
            ..Self::default()
        }
    }
}

impl SerialTransport for MockTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.fail_writes {
            return Err(TransportError::Io);
        }
        self.written.extend_from_slice(bytes);
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let line = self.incoming.pop_front().ok_or(TransportError::Closed)?;
        if line.len() > buf.len() {
            return Err(TransportError::LineTooLong);
        }
        buf[..line.len()].copy_from_slice(&line);
        Ok(line.len())
    }
}
