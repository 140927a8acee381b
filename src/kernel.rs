//! # Kernel
//!
//! Owns the scheduler and the time source, runs the dispatch loop and
//! performs the startup handshake with the host.
//!
//! ## Startup Sequence
//!
//! ```text
//! main()
//!   ├─► kernel::startup()      ← handshake, load setpoint and gain
//!   ├─► Kernel::add_task()     ← register tasks (×N)
//!   └─► Kernel::run()          ← dispatch until the stop flag is set
//!         ├─► Scheduler::start()
//!         ├─► Scheduler::run_once() / Clock::idle()   (loop)
//!         └─► Scheduler::shutdown()                   ← zero actuators
//! ```

use core::cell::Cell;
use core::str::{self, FromStr};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::config::{Handshake, SessionConfig, LINE_BUFFER_SIZE};
use crate::control::Controller;
use crate::drivers::SerialTransport;
use crate::error::ConfigError;
use crate::scheduler::Scheduler;
use crate::task::{Task, TaskBody, TaskId};
use crate::telemetry::READY_LINE;
use crate::{log_error, log_info};

// ---------------------------------------------------------------------------
// Time source
// ---------------------------------------------------------------------------

/// Monotonic millisecond time base for the scheduler.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;

    /// Called when a dispatch cycle found nothing due. Firmware sleeps
    /// until the next interrupt here.
    fn idle(&self) {}
}

/// A clock that only moves when told to.
///
/// `idle` advances it by one millisecond, so a kernel running on it steps
/// through simulated time as fast as the host allows.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub const fn new(start_ms: u64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn idle(&self) {
        self.advance(1);
    }
}

impl<C: Clock> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn idle(&self) {
        (**self).idle()
    }
}

// ---------------------------------------------------------------------------
// Kernel
// ---------------------------------------------------------------------------

/// Counters reported when dispatching stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunSummary {
    pub dispatches: u64,
    pub idle_cycles: u64,
    pub faults: u32,
    pub elapsed_ms: u64,
}

/// Scheduler plus clock.
pub struct Kernel<'a, C: Clock> {
    scheduler: Scheduler<'a>,
    clock: C,
}

impl<'a, C: Clock> Kernel<'a, C> {
    pub const fn new(clock: C) -> Self {
        Self {
            scheduler: Scheduler::new(),
            clock,
        }
    }

    /// Register a task.
    ///
    /// # Errors
    /// See [`Scheduler::append`].
    pub fn add_task(
        &mut self,
        name: &'static str,
        priority: u8,
        period_ms: u32,
        body: &'a mut dyn TaskBody,
    ) -> Result<TaskId, ConfigError> {
        self.scheduler
            .append(Task::new(name, priority, period_ms, body))
    }

    pub fn scheduler(&self) -> &Scheduler<'a> {
        &self.scheduler
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Dispatch until `stop` is set, then shut every task down.
    ///
    /// The flag is checked between dispatch cycles, so the step in progress
    /// always completes.
    pub fn run(&mut self, stop: &AtomicBool) -> RunSummary {
        self.run_while(|_| !stop.load(Ordering::Acquire))
    }

    /// Dispatch for `duration_ms` of clock time, then shut down.
    pub fn run_for(&mut self, duration_ms: u64) -> RunSummary {
        let deadline = self.clock.now_ms().saturating_add(duration_ms);
        self.run_while(|now| now < deadline)
    }

    fn run_while(&mut self, mut keep_going: impl FnMut(u64) -> bool) -> RunSummary {
        let start = self.clock.now_ms();
        self.scheduler.start(start);

        loop {
            let now = self.clock.now_ms();
            if !keep_going(now) {
                break;
            }
            if self.scheduler.run_once(now).is_none() {
                self.clock.idle();
            }
        }

        self.scheduler.shutdown();

        let summary = RunSummary {
            dispatches: self.scheduler.dispatches(),
            idle_cycles: self.scheduler.idle_cycles(),
            faults: self.scheduler.faults(),
            elapsed_ms: self.clock.now_ms().saturating_sub(start),
        };
        log_info!(
            "stopped after {} ms: {} dispatches, {} faults",
            summary.elapsed_ms,
            summary.dispatches,
            summary.faults
        );
        summary
    }
}

// ---------------------------------------------------------------------------
// Startup handshake
// ---------------------------------------------------------------------------

/// Load the controller from `session`, then run the configured handshake.
///
/// Blocks on the transport until the host has sent everything the
/// handshake expects.
///
/// # Errors
/// - [`ConfigError::HandshakeMismatch`] for a line other than `ready`
/// - [`ConfigError::InvalidSetpoint`] / [`ConfigError::InvalidGain`] for
///   unparsable parameters
/// - [`ConfigError::Transport`] if the link fails
pub fn startup<T: SerialTransport>(
    transport: &mut T,
    controller: &mut Controller,
    session: &SessionConfig,
) -> Result<(), ConfigError> {
    controller.set_setpoint(session.setpoint);
    controller.set_gain(session.gain);

    let mut buf = [0u8; LINE_BUFFER_SIZE];
    match session.handshake {
        Handshake::None => {}
        Handshake::AwaitReady => {
            let n = transport.read_line(&mut buf)?;
            if &buf[..n] != READY_LINE {
                log_error!("expected ready line, got {} bytes", n);
                return Err(ConfigError::HandshakeMismatch);
            }
        }
        Handshake::ReceiveParameters => {
            let n = transport.read_line(&mut buf)?;
            let setpoint: i32 = parse_line(&buf[..n]).ok_or(ConfigError::InvalidSetpoint)?;

            let n = transport.read_line(&mut buf)?;
            let gain: f32 = parse_line(&buf[..n])
                .filter(|g: &f32| g.is_finite())
                .ok_or(ConfigError::InvalidGain)?;

            controller.set_setpoint(setpoint);
            controller.set_gain(gain);
        }
    }

    log_info!(
        "handshake complete: setpoint {}, gain {}",
        controller.setpoint(),
        controller.gain()
    );
    Ok(())
}

/// A decimal value on its own line, surrounding whitespace ignored.
fn parse_line<V: FromStr>(line: &[u8]) -> Option<V> {
    str::from_utf8(line).ok()?.trim().parse().ok()
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::MockTransport;
    use crate::error::TransportError;
    use crate::task::{Context, Step};

    struct Ticker {
        at: std::vec::Vec<u64>,
        stop_after: Option<(usize, &'static AtomicBool)>,
        stopped: bool,
    }

    impl Ticker {
        fn new() -> Self {
            Self { at: std::vec::Vec::new(), stop_after: None, stopped: false }
        }
    }

    impl TaskBody for Ticker {
        fn step(&mut self, cx: &Context) -> Step {
            self.at.push(cx.now_ms);
            if let Some((n, flag)) = self.stop_after {
                if self.at.len() >= n {
                    flag.store(true, Ordering::Release);
                }
            }
            Step::Yield
        }

        fn shutdown(&mut self) {
            self.stopped = true;
        }
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(5);
        clock.idle();
        clock.advance(10);
        assert_eq!(clock.now_ms(), 16);
        clock.set(0);
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn test_run_for_paces_by_period() {
        let mut ticker = Ticker::new();
        {
            let mut kernel = Kernel::new(ManualClock::new(0));
            kernel.add_task("tick", 1, 10, &mut ticker).unwrap();
            let summary = kernel.run_for(55);
            assert_eq!(summary.dispatches, 6);
            assert_eq!(summary.elapsed_ms, 55);
            assert_eq!(summary.faults, 0);
        }
        assert_eq!(ticker.at, [0, 10, 20, 30, 40, 50]);
        assert!(ticker.stopped);
    }

    #[test]
    fn test_run_stops_on_flag() {
        static STOP: AtomicBool = AtomicBool::new(false);
        let mut ticker = Ticker::new();
        ticker.stop_after = Some((3, &STOP));
        {
            let clock = ManualClock::new(100);
            let mut kernel = Kernel::new(&clock);
            kernel.add_task("tick", 1, 5, &mut ticker).unwrap();
            let summary = kernel.run(&STOP);
            assert_eq!(summary.dispatches, 3);
            assert_eq!(clock.now_ms(), 110);
        }
        assert_eq!(ticker.at, [100, 105, 110]);
        assert!(ticker.stopped);
    }

    #[test]
    fn test_preset_stop_flag_still_shuts_down() {
        let stop = AtomicBool::new(true);
        let mut ticker = Ticker::new();
        {
            let mut kernel = Kernel::new(ManualClock::new(0));
            kernel.add_task("tick", 1, 5, &mut ticker).unwrap();
            assert_eq!(kernel.run(&stop).dispatches, 0);
        }
        assert!(ticker.at.is_empty());
        assert!(ticker.stopped);
    }

    #[test]
    fn test_startup_receives_parameters() {
        let mut transport = MockTransport::with_lines(&[b"16384\r\n", b"0.2\r\n"]);
        let mut controller = Controller::default();
        startup(&mut transport, &mut controller, &SessionConfig::new()).unwrap();
        assert_eq!(controller.setpoint(), 16_384);
        assert_eq!(controller.gain(), 0.2);
    }

    #[test]
    fn test_startup_rejects_bad_parameters() {
        let session = SessionConfig::new();
        let mut controller = Controller::default();

        let mut transport = MockTransport::with_lines(&[b"12.5\r\n", b"0.2\r\n"]);
        assert_eq!(
            startup(&mut transport, &mut controller, &session),
            Err(ConfigError::InvalidSetpoint)
        );

        let mut transport = MockTransport::with_lines(&[b"100\r\n", b"fast\r\n"]);
        assert_eq!(
            startup(&mut transport, &mut controller, &session),
            Err(ConfigError::InvalidGain)
        );

        let mut transport = MockTransport::with_lines(&[b"100\r\n", b"inf\r\n"]);
        assert_eq!(
            startup(&mut transport, &mut controller, &session),
            Err(ConfigError::InvalidGain)
        );

        let mut transport = MockTransport::with_lines(&[b"100\r\n"]);
        assert_eq!(
            startup(&mut transport, &mut controller, &session),
            Err(ConfigError::Transport(TransportError::Closed))
        );
    }

    #[test]
    fn test_startup_ready_handshake() {
        let session = SessionConfig {
            handshake: Handshake::AwaitReady,
            setpoint: 4_096,
            gain: 0.5,
            end_sentinel: true,
        };
        let mut controller = Controller::default();

        let mut transport = MockTransport::with_lines(&[b"ready\r\n"]);
        assert_eq!(startup(&mut transport, &mut controller, &session), Ok(()));
        assert_eq!(controller, Controller::new(4_096, 0.5));

        let mut transport = MockTransport::with_lines(&[b"go\r\n"]);
        assert_eq!(
            startup(&mut transport, &mut controller, &session),
            Err(ConfigError::HandshakeMismatch)
        );
    }

    #[test]
    fn test_startup_without_handshake_uses_session() {
        let session = SessionConfig {
            handshake: Handshake::None,
            setpoint: -50,
            gain: 2.0,
            end_sentinel: false,
        };
        let mut transport = MockTransport::default();
        let mut controller = Controller::default();
        startup(&mut transport, &mut controller, &session).unwrap();
        assert_eq!(controller, Controller::new(-50, 2.0));
    }
}
