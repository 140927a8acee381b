//! The periodic telemetry task.

use embassy_sync::blocking_mutex::raw::{NoopRawMutex, RawMutex};

use super::protocol::{DONE_LINE, END_LINE};
use crate::config::DRAIN_CHUNK;
use crate::drivers::SerialTransport;
use crate::sync::Queue;
use crate::task::{Context, Step, TaskBody};
use crate::{log_debug, log_info, log_warn};

/// Empties the telemetry queue onto the transport and closes each batch
/// with `done`.
///
/// Bytes leave in the order they were queued. Write failures are counted
/// and the task keeps going.
pub struct TelemetryTask<'a, T, const N: usize, M: RawMutex = NoopRawMutex> {
    transport: T,
    queue: &'a Queue<u8, N, M>,
    end_sentinel: bool,
    batches: u32,
    bytes_sent: u64,
    write_errors: u32,
}

impl<'a, T, const N: usize, M> TelemetryTask<'a, T, N, M>
where
    T: SerialTransport,
    M: RawMutex,
{
    pub fn new(transport: T, queue: &'a Queue<u8, N, M>) -> Self {
        Self {
            transport,
            queue,
            end_sentinel: false,
            batches: 0,
            bytes_sent: 0,
            write_errors: 0,
        }
    }

    /// Send `end` once on shutdown.
    pub fn with_end_sentinel(mut self, enabled: bool) -> Self {
        self.end_sentinel = enabled;
        self
    }

    /// Completed batches, each terminated by `done`.
    pub fn batches(&self) -> u32 {
        self.batches
    }

    /// Queue bytes handed to the transport.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn send(&mut self, bytes: &[u8]) {
        if let Err(err) = self.transport.write(bytes) {
            self.write_errors += 1;
            log_warn!("telemetry write failed: {}", err);
        }
    }
}

impl<T, const N: usize, M> TaskBody for TelemetryTask<'_, T, N, M>
where
    T: SerialTransport,
    M: RawMutex,
{
    fn step(&mut self, _cx: &Context) -> Step {
        let mut chunk = [0u8; DRAIN_CHUNK];
        let mut drained: usize = 0;
        loop {
            let n = self.queue.pop_into(&mut chunk);
            if n == 0 {
                break;
            }
            self.send(&chunk[..n]);
            drained += n;
        }
        self.send(DONE_LINE);

        self.batches += 1;
        self.bytes_sent += drained as u64;
        log_debug!("telemetry batch {}: {} bytes", self.batches, drained);
        Step::Yield
    }

    fn shutdown(&mut self) {
        if self.end_sentinel {
            self.send(END_LINE);
        }
        log_info!(
            "telemetry stopped after {} batches, {} write errors",
            self.batches,
            self.write_errors
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::MockTransport;
    use crate::sync::Overflow;
    use std::vec::Vec;

    const CX: Context = Context { now_ms: 0, runs: 0 };

    #[test]
    fn test_single_line_then_done() {
        let queue: Queue<u8, 64> = Queue::new(Overflow::Reject);
        queue.push_slice(b"12,5\r\n");
        let mut task = TelemetryTask::new(MockTransport::default(), &queue);

        assert_eq!(task.step(&CX), Step::Yield);
        assert_eq!(task.transport().writes, [b"12,5\r\n".to_vec(), b"done\r\n".to_vec()]);
        assert!(queue.is_empty());
        assert_eq!(task.batches(), 1);
    }

    #[test]
    fn test_empty_queue_still_sends_done() {
        let queue: Queue<u8, 16> = Queue::new(Overflow::Reject);
        let mut task = TelemetryTask::new(MockTransport::default(), &queue);
        task.step(&CX);
        task.step(&CX);
        assert_eq!(task.transport().written, b"done\r\ndone\r\n");
    }

    #[test]
    fn test_large_backlog_is_chunked_in_order() {
        let queue: Queue<u8, 4000> = Queue::new(Overflow::Reject);
        let mut expected = Vec::new();
        for i in 0..200u32 {
            let line = std::format!("{},{}\r\n", i * 10, i * 3);
            assert_eq!(queue.push_slice(line.as_bytes()), line.len());
            expected.extend_from_slice(line.as_bytes());
        }
        let mut task = TelemetryTask::new(MockTransport::default(), &queue);
        task.step(&CX);

        let t = task.transport();
        assert!(t.writes[..t.writes.len() - 1].iter().all(|w| w.len() <= DRAIN_CHUNK));
        expected.extend_from_slice(DONE_LINE);
        assert_eq!(t.written, expected);
        assert_eq!(task.bytes_sent(), (expected.len() - DONE_LINE.len()) as u64);
    }

    #[test]
    fn test_write_failures_are_counted_not_fatal() {
        let queue: Queue<u8, 16> = Queue::new(Overflow::Reject);
        queue.push_slice(b"1,2\r\n");
        let transport = MockTransport {
            fail_writes: true,
            ..MockTransport::default()
        };
        let mut task = TelemetryTask::new(transport, &queue);
        assert_eq!(task.step(&CX), Step::Yield);
        // One data chunk plus the done line
        assert_eq!(task.write_errors(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_end_sentinel_on_shutdown() {
        let queue: Queue<u8, 16> = Queue::new(Overflow::Reject);
        let mut plain = TelemetryTask::new(MockTransport::default(), &queue);
        plain.shutdown();
        assert!(plain.transport().written.is_empty());

        let mut multi = TelemetryTask::new(MockTransport::default(), &queue).with_end_sentinel(true);
        multi.step(&CX);
        multi.shutdown();
        assert_eq!(multi.transport().written, b"done\r\nend\r\n");
    }
}
