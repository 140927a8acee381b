//! # Cortex-M4 Port Layer
//!
//! SysTick configuration and the millisecond counter behind
//! [`SysTickClock`].
//!
//! ## Interrupt Priorities
//!
//! SysTick runs at the lowest priority (0xF0 with 4 implemented bits). Its
//! handler only bumps the counter and samples the stop button, so it never
//! holds anything the cooperative tasks wait on.

use core::cell::Cell;

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};
use critical_section::Mutex;

use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::kernel::Clock;
use crate::sync;

/// Milliseconds since SysTick was started.
///
/// 64-bit so it never wraps in practice; thumbv7em has no 64-bit atomics,
/// hence the critical section.
static MILLIS: Mutex<Cell<u64>> = Mutex::new(Cell::new(0));

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure SysTick to fire at `TICK_HZ` from the processor clock.
///
/// The `SysTick` exception handler must call [`on_tick`].
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Set SysTick to the lowest exception priority.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // SAFETY: no priority-based critical sections are in use
    unsafe {
        scb.set_priority(SystemHandler::SysTick, 0xF0);
    }
}

// ---------------------------------------------------------------------------
// Millisecond counter
// ---------------------------------------------------------------------------

/// Advance the millisecond counter. Call from the SysTick handler.
#[inline]
pub fn on_tick() {
    sync::critical_section(|cs| {
        let millis = MILLIS.borrow(cs);
        millis.set(millis.get() + 1);
    });
}

/// Current value of the millisecond counter.
#[inline]
pub fn millis() -> u64 {
    sync::critical_section(|cs| MILLIS.borrow(cs).get())
}

/// Scheduler clock backed by SysTick. Idles with `wfi`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysTickClock;

impl Clock for SysTickClock {
    fn now_ms(&self) -> u64 {
        millis()
    }

    fn idle(&self) {
        // SysTick wakes the core within a millisecond
        cortex_m::asm::wfi();
    }
}
