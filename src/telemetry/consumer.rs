//! Host-side decoding of the telemetry stream.
//!
//! Feed one received line at a time. Data lines become points, `done` and
//! `end` are reported as such, and anything else is discarded and counted.

use core::str;

use crate::log_warn;

/// One decoded line.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Record {
    /// `elapsed_ms,position`.
    Point { elapsed_ms: f64, position: f64 },
    /// End of the current batch.
    Done,
    /// The device stopped.
    End,
    /// Not a valid line; already counted.
    Malformed,
}

/// Line decoder with a running count of discarded lines.
#[derive(Debug, Default)]
pub struct BatchDecoder {
    points: u32,
    discarded: u32,
}

impl BatchDecoder {
    pub const fn new() -> Self {
        Self {
            points: 0,
            discarded: 0,
        }
    }

    /// Decode a single line. A trailing `\r\n` or `\n` is optional.
    pub fn feed(&mut self, line: &[u8]) -> Record {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        match line {
            b"done" => return Record::Done,
            b"end" => return Record::End,
            _ => {}
        }

        match parse_point(line) {
            Some((elapsed_ms, position)) => {
                self.points += 1;
                Record::Point {
                    elapsed_ms,
                    position,
                }
            }
            None => {
                self.discarded += 1;
                log_warn!("discarding malformed telemetry line ({} bytes)", line.len());
                Record::Malformed
            }
        }
    }

    /// Points decoded so far.
    pub fn points(&self) -> u32 {
        self.points
    }

    /// Lines rejected so far.
    pub fn discarded(&self) -> u32 {
        self.discarded
    }
}

/// Exactly two comma-separated numeric fields.
fn parse_point(line: &[u8]) -> Option<(f64, f64)> {
    let text = str::from_utf8(line).ok()?;
    let mut fields = text.split(',');
    let elapsed = fields.next()?.trim().parse::<f64>().ok()?;
    let position = fields.next()?.trim().parse::<f64>().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((elapsed, position))
}
