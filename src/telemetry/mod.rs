//! # Telemetry
//!
//! Device side: the [`TelemetryTask`] drains the byte queue the control task
//! fills and frames each batch for the host. Host side: the
//! [`consumer::BatchDecoder`] turns the received lines back into points.
//!
//! ```text
//! ControlTask ──push_slice──► Queue<u8> ──pop_into──► TelemetryTask ──► serial
//!                                                                        │
//!                                     BatchDecoder ◄──── lines ──────────┘
//! ```

pub mod consumer;
pub mod protocol;
pub mod task;

pub use consumer::{BatchDecoder, Record};
pub use protocol::{Sample, DONE_LINE, END_LINE, READY_LINE};
pub use task::TelemetryTask;
