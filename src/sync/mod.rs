//! # Inter-Task Communication
//!
//! The two primitives tasks use to exchange data:
//!
//! - [`Share`]: single-slot, last-writer-wins value
//! - [`Queue`]: fixed-capacity FIFO with an explicit overflow policy
//!
//! Both take the lock discipline as a type parameter. Under the cooperative
//! scheduler a task never suspends mid-mutation, so the default
//! [`NoopRawMutex`] is enough and keeps the primitive `!Sync`. Pick
//! [`CriticalSectionRawMutex`] when an interrupt handler also touches it.

pub mod queue;
pub mod share;

pub use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex, RawMutex};
pub use queue::{Overflow, Queue};
pub use share::{IsrShare, Share};

/// Execute a closure within a critical section (interrupts disabled).
///
/// Used for state that is shared with interrupt handlers outside the
/// primitives above. Keep the enclosed work short.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(critical_section::CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn test_critical_section_guards_mutex() {
        static COUNTER: critical_section::Mutex<Cell<u32>> =
            critical_section::Mutex::new(Cell::new(0));
        for _ in 0..3 {
            critical_section(|cs| {
                let c = COUNTER.borrow(cs);
                c.set(c.get() + 1);
            });
        }
        assert_eq!(critical_section(|cs| COUNTER.borrow(cs).get()), 3);
    }
}
