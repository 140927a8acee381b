//! # Driver Interfaces
//!
//! The hardware the tasks talk to, as traits. Board code implements them
//! (see `arch::stm32f4` with the `firmware` feature); host tests use the
//! hand-written doubles in `mock`.

use crate::control::position::unwrap_delta;
use crate::error::TransportError;

#[cfg(test)]
pub mod mock;

/// A wrapping position counter, such as a quadrature encoder timer.
pub trait PositionSensor {
    /// Current raw count, in `0..modulus()`.
    fn read(&mut self) -> u32;

    /// Counts per wrap of the raw counter.
    fn modulus(&self) -> u32;

    /// Read the counter and fold the change since `prev_raw` into
    /// `prev_position`. Returns the new `(raw, position)` pair.
    ///
    /// Correct as long as the counter moves less than half a modulus between
    /// two calls.
    fn update(&mut self, prev_raw: u32, prev_position: i64) -> (u32, i64) {
        let raw = self.read();
        let delta = unwrap_delta(prev_raw, raw, self.modulus());
        (raw, prev_position + delta)
    }
}

/// Something driven by a signed effort, e.g. a motor bridge.
pub trait Actuator {
    /// Command `percent` of full scale in `[-100, 100]`. Sign selects
    /// direction.
    fn set_output(&mut self, percent: f32);
}

/// A byte-oriented serial link to the host.
pub trait SerialTransport {
    /// Send every byte of `bytes`, in order.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Block for one line and copy it into `buf`, terminator included.
    /// Returns the number of bytes stored.
    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}
