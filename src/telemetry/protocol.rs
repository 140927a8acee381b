//! Wire format.
//!
//! Line oriented, ASCII, every line terminated by `\r\n`:
//!
//! ```text
//! host → device   ready\r\n                    (optional)
//! host → device   <setpoint>\r\n<gain>\r\n     (optional)
//! device → host   <elapsed_ms>,<position>\r\n  (repeated)
//! device → host   done\r\n                     (after every drained batch)
//! device → host   end\r\n                      (optional, on shutdown)
//! ```

use core::fmt::Write;

use heapless::String;

use crate::config::SAMPLE_LINE_MAX;

/// Host readiness line.
pub const READY_LINE: &[u8] = b"ready\r\n";

/// Terminates every telemetry batch.
pub const DONE_LINE: &[u8] = b"done\r\n";

/// Sent once when the device stops.
pub const END_LINE: &[u8] = b"end\r\n";

/// One control-loop measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    /// Milliseconds since the control task started.
    pub elapsed_ms: u64,
    /// Unwrapped sensor position, in counts.
    pub position: i64,
    /// Saturated effort commanded this step. Not part of the wire line.
    pub effort: f32,
}

impl Sample {
    /// The telemetry line for this sample: `"<elapsed_ms>,<position>\r\n"`.
    pub fn encode(&self) -> String<SAMPLE_LINE_MAX> {
        let mut line = String::new();
        // u64 + i64 + separator + terminator is at most 43 bytes
        let _ = write!(line, "{},{}\r\n", self.elapsed_ms, self.position);
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let s = Sample { elapsed_ms: 12, position: 5, effort: 0.0 };
        assert_eq!(s.encode().as_str(), "12,5\r\n");

        let s = Sample { elapsed_ms: 0, position: -16_384, effort: 100.0 };
        assert_eq!(s.encode().as_bytes(), b"0,-16384\r\n");
    }

    #[test]
    fn test_encode_extremes_fit() {
        let s = Sample { elapsed_ms: u64::MAX, position: i64::MIN, effort: 0.0 };
        let line = s.encode();
        assert_eq!(line.as_str(), "18446744073709551615,-9223372036854775808\r\n");
    }
}
