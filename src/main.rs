//! # coop-servo Firmware
//!
//! Proportional position control of one DC motor on an STM32F411 Nucleo,
//! with telemetry streamed to a host plotter over the ST-LINK serial port.
//!
//! | Task        | Priority | Period  | Work                                     |
//! |-------------|----------|---------|------------------------------------------|
//! | `Control`   | 2        | 10 ms   | encoder → controller → motor, queue line |
//! | `Telemetry` | 1        | 2500 ms | drain queue to USART2, send `done`       |
//!
//! The host sends the setpoint and gain as two lines at startup. Pressing
//! the blue user button stops the loop and zeroes the motor.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicBool, Ordering};

use cortex_m_rt::{entry, exception};
#[cfg(feature = "defmt")]
use defmt_rtt as _;
use panic_halt as _;

use coop_servo::arch::cortex_m4::{self, SysTickClock};
use coop_servo::arch::stm32f4::{self, HBridgeMotor, QuadratureEncoder, Usart2};
use coop_servo::config::{
    SessionConfig, CONTROL_PERIOD_MS, CONTROL_PRIORITY, TELEMETRY_PERIOD_MS,
    TELEMETRY_PRIORITY, TELEMETRY_QUEUE_CAPACITY,
};
use coop_servo::control::{ControlTask, Controller};
use coop_servo::error::ConfigError;
use coop_servo::kernel::{self, Kernel};
use coop_servo::sync::{Overflow, Queue, Share};
use coop_servo::telemetry::{Sample, TelemetryTask};
use coop_servo::{log_error, log_info};

/// Host link speed.
const BAUD: u32 = 115_200;

/// Set from SysTick when the user button is pressed.
static STOP: AtomicBool = AtomicBool::new(false);

// ---------------------------------------------------------------------------
// Exception handlers
// ---------------------------------------------------------------------------

#[exception]
fn SysTick() {
    cortex_m4::on_tick();
    if stm32f4::user_button_pressed() {
        STOP.store(true, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Park the core after a startup failure. The motor is never enabled past
/// zero duty on this path.
fn halt(err: ConfigError) -> ! {
    log_error!("startup failed: {}", err);
    loop {
        cortex_m::asm::wfi();
    }
}

#[entry]
fn main() -> ! {
    let Some(mut cp) = cortex_m::Peripherals::take() else {
        loop {
            cortex_m::asm::wfi();
        }
    };

    stm32f4::enable_clocks();
    stm32f4::init_user_button();
    let encoder = QuadratureEncoder::new();
    let motor = HBridgeMotor::new();
    let mut serial = Usart2::new(BAUD);

    // --- Handshake: setpoint and gain from the host ---

    let session = SessionConfig::new();
    let mut controller = Controller::default();
    if let Err(err) = kernel::startup(&mut serial, &mut controller, &session) {
        halt(err);
    }

    // --- Tasks ---

    let telemetry_queue: Queue<u8, TELEMETRY_QUEUE_CAPACITY> = Queue::new(Overflow::Reject);
    let status: Share<Sample> = Share::default();

    let mut control =
        ControlTask::new(encoder, motor, controller, &telemetry_queue).with_status(&status);
    let mut telemetry = TelemetryTask::new(serial, &telemetry_queue)
        .with_end_sentinel(session.end_sentinel);

    let mut kernel = Kernel::new(SysTickClock);
    if let Err(err) = kernel.add_task("Control", CONTROL_PRIORITY, CONTROL_PERIOD_MS, &mut control) {
        halt(err);
    }
    if let Err(err) = kernel.add_task(
        "Telemetry",
        TELEMETRY_PRIORITY,
        TELEMETRY_PERIOD_MS,
        &mut telemetry,
    ) {
        halt(err);
    }

    cortex_m4::set_interrupt_priorities(&mut cp.SCB);
    cortex_m4::configure_systick(&mut cp.SYST);

    // --- Run until the button is pressed ---

    let summary = kernel.run(&STOP);
    let last = status.read();
    log_info!(
        "final position {} after {} ms, {} bytes dropped",
        last.position,
        summary.elapsed_ms,
        telemetry_queue.dropped()
    );
    drop(kernel);
    log_info!("{} telemetry batches sent", telemetry.batches());

    loop {
        cortex_m::asm::wfi();
    }
}
