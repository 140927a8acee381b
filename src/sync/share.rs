//! Single-slot shared variable.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex, RawMutex};
use embassy_sync::blocking_mutex::Mutex;

/// A value exchanged between tasks, last writer wins.
///
/// Reads return the most recent write, or the initial value if nothing has
/// been written yet. No history is kept and writers are never held back.
///
/// # Example
/// ```
/// use coop_servo::sync::Share;
///
/// let setpoint: Share<i32> = Share::new(0);
/// setpoint.write(16384);
/// assert_eq!(setpoint.read(), 16384);
/// ```
pub struct Share<T, M: RawMutex = NoopRawMutex> {
    value: Mutex<M, Cell<T>>,
}

/// A [`Share`] that may also be accessed from an interrupt handler.
pub type IsrShare<T> = Share<T, CriticalSectionRawMutex>;

impl<T: Copy, M: RawMutex> Share<T, M> {
    /// Create a share holding `initial` until the first write.
    pub const fn new(initial: T) -> Self {
        Self {
            value: Mutex::new(Cell::new(initial)),
        }
    }

    /// Overwrite the stored value.
    #[inline]
    pub fn write(&self, value: T) {
        self.value.lock(|cell| cell.set(value));
    }

    /// The most recently written value.
    #[inline]
    pub fn read(&self) -> T {
        self.value.lock(|cell| cell.get())
    }

    /// Store `value` and return what it replaced.
    #[inline]
    pub fn replace(&self, value: T) -> T {
        self.value.lock(|cell| cell.replace(value))
    }

    /// Read-modify-write as one indivisible step.
    pub fn update(&self, f: impl FnOnce(T) -> T) -> T {
        self.value.lock(|cell| {
            let next = f(cell.get());
            cell.set(next);
            next
        })
    }
}

impl<T: Copy + Default, M: RawMutex> Default for Share<T, M> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_before_write_yields_initial() {
        let share: Share<u8> = Share::default();
        assert_eq!(share.read(), 0);

        let share: Share<i32> = Share::new(-7);
        assert_eq!(share.read(), -7);
    }

    #[test]
    fn test_last_writer_wins() {
        let share: Share<u32> = Share::new(0);
        share.write(1);
        share.write(2);
        share.write(3);
        assert_eq!(share.read(), 3);
        // Reads do not consume
        assert_eq!(share.read(), 3);
    }

    #[test]
    fn test_replace_and_update() {
        let share: Share<i64> = Share::new(10);
        assert_eq!(share.replace(20), 10);
        assert_eq!(share.update(|v| v * 2), 40);
        assert_eq!(share.read(), 40);
    }

    #[test]
    fn test_interrupt_safe_share() {
        static FLAG: IsrShare<bool> = IsrShare::new(false);
        FLAG.write(true);
        assert!(FLAG.read());
    }

    #[test]
    fn test_multiple_readers_see_same_value() {
        let share: Share<u16> = Share::new(0);
        let (a, b) = (&share, &share);
        a.write(512);
        assert_eq!(b.read(), 512);
    }
}
