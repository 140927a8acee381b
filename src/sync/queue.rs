//! Bounded FIFO queue.
//!
//! Fixed capacity chosen at compile time, storage inline (no heap). Every
//! operation is O(1) and never blocks: a full queue either refuses the new
//! item or evicts the oldest one, depending on its [`Overflow`] policy.
//! Items lost either way are counted in [`Queue::dropped`].

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::{NoopRawMutex, RawMutex};
use embassy_sync::blocking_mutex::Mutex;
use heapless::Deque;

/// What `push` does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Overflow {
    /// Refuse the new item; the queue is left unchanged.
    Reject,
    /// Drop the oldest item to make room.
    EvictOldest,
}

struct State<T, const N: usize> {
    items: Deque<T, N>,
    dropped: u32,
}

/// Fixed-capacity FIFO shared between a producer and a consumer task.
///
/// # Example
/// ```
/// use coop_servo::sync::{Overflow, Queue};
///
/// let queue: Queue<u8, 2> = Queue::new(Overflow::Reject);
/// assert!(queue.push(1).is_ok());
/// assert!(queue.push(2).is_ok());
/// assert_eq!(queue.push(3), Err(3));
/// assert_eq!(queue.pop(), Some(1));
/// ```
pub struct Queue<T, const N: usize, M: RawMutex = NoopRawMutex> {
    state: Mutex<M, RefCell<State<T, N>>>,
    overflow: Overflow,
}

impl<T, const N: usize, M: RawMutex> Queue<T, N, M> {
    /// Create an empty queue. `N` must be non-zero (checked at compile time).
    pub const fn new(overflow: Overflow) -> Self {
        const { assert!(N > 0, "queue capacity must be non-zero") };
        Self {
            state: Mutex::new(RefCell::new(State {
                items: Deque::new(),
                dropped: 0,
            })),
            overflow,
        }
    }

    /// Append `item` at the tail.
    ///
    /// Under [`Overflow::Reject`] a full queue hands the item back as
    /// `Err(item)`. Under [`Overflow::EvictOldest`] this always succeeds.
    pub fn push(&self, item: T) -> Result<(), T> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if state.items.is_full() {
                match self.overflow {
                    Overflow::Reject => {
                        state.dropped = state.dropped.wrapping_add(1);
                        return Err(item);
                    }
                    Overflow::EvictOldest => {
                        state.items.pop_front();
                        state.dropped = state.dropped.wrapping_add(1);
                    }
                }
            }
            state.items.push_back(item)
        })
    }

    /// Remove and return the oldest item.
    pub fn pop(&self) -> Option<T> {
        self.state.lock(|state| state.borrow_mut().items.pop_front())
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.state.lock(|state| state.borrow().items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock(|state| state.borrow().items.is_empty())
    }

    pub fn is_full(&self) -> bool {
        self.state.lock(|state| state.borrow().items.is_full())
    }

    /// Fixed capacity.
    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn overflow(&self) -> Overflow {
        self.overflow
    }

    /// Items rejected or evicted since creation.
    pub fn dropped(&self) -> u32 {
        self.state.lock(|state| state.borrow().dropped)
    }

    /// Discard every queued item. The drop counter is left alone.
    pub fn clear(&self) {
        self.state.lock(|state| state.borrow_mut().items.clear());
    }
}

impl<const N: usize, M: RawMutex> Queue<u8, N, M> {
    /// Push `bytes` one at a time, in order.
    ///
    /// Returns how many were accepted. With [`Overflow::Reject`] a short
    /// count means the tail of `bytes` was lost.
    pub fn push_slice(&self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for &b in bytes {
            if self.push(b).is_ok() {
                accepted += 1;
            }
        }
        accepted
    }

    /// Pop up to `buf.len()` bytes into `buf`, returning how many were moved.
    pub fn pop_into(&self, buf: &mut [u8]) -> usize {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let mut n = 0;
            while n < buf.len() {
                match state.items.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            n
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn test_fifo_order() {
        let q: Queue<u32, 8> = Queue::new(Overflow::Reject);
        for i in 0..5 {
            assert!(q.push(i).is_ok());
        }
        assert_eq!(q.len(), 5);
        for i in 0..5 {
            assert_eq!(q.pop(), Some(i));
        }
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_reject_leaves_contents_unchanged() {
        let q: Queue<u8, 3> = Queue::new(Overflow::Reject);
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.push(3).unwrap();
        assert!(q.is_full());

        assert_eq!(q.push(4), Err(4));
        assert_eq!(q.len(), 3);
        assert_eq!(q.dropped(), 1);

        let drained: Vec<u8> = core::iter::from_fn(|| q.pop()).collect();
        assert_eq!(drained, [1, 2, 3]);
    }

    #[test]
    fn test_evict_drops_exactly_the_oldest() {
        let q: Queue<u8, 3> = Queue::new(Overflow::EvictOldest);
        for b in [10, 20, 30] {
            q.push(b).unwrap();
        }
        assert!(q.push(40).is_ok());
        assert_eq!(q.len(), 3);
        assert_eq!(q.dropped(), 1);
        // Oldest survivor is what was second-oldest before the push
        assert_eq!(q.pop(), Some(20));
        assert_eq!(q.pop(), Some(30));
        assert_eq!(q.pop(), Some(40));
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        for policy in [Overflow::Reject, Overflow::EvictOldest] {
            let q: Queue<u16, 4> = Queue::new(policy);
            for i in 0..20u16 {
                let _ = q.push(i);
                assert!(q.len() <= q.capacity());
                if i % 3 == 0 {
                    q.pop();
                }
            }
        }
    }

    #[test]
    fn test_interleaved_push_pop_keeps_order() {
        let q: Queue<u32, 4> = Queue::new(Overflow::Reject);
        let mut expected = 0;
        let mut next = 0;
        for round in 0..10 {
            for _ in 0..(round % 4) + 1 {
                if q.push(next).is_ok() {
                    next += 1;
                }
            }
            while let Some(v) = q.pop() {
                assert_eq!(v, expected);
                expected += 1;
            }
        }
        assert_eq!(expected, next);
    }

    #[test]
    fn test_push_slice_truncates_on_reject() {
        let q: Queue<u8, 4> = Queue::new(Overflow::Reject);
        assert_eq!(q.push_slice(b"12,5\r\n"), 4);
        assert_eq!(q.dropped(), 2);

        let mut buf = [0u8; 8];
        let n = q.pop_into(&mut buf);
        assert_eq!(&buf[..n], b"12,5");
    }

    #[test]
    fn test_pop_into_respects_buffer_size() {
        let q: Queue<u8, 16> = Queue::new(Overflow::Reject);
        q.push_slice(b"abcdef");
        let mut buf = [0u8; 4];
        assert_eq!(q.pop_into(&mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(q.pop_into(&mut buf), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(q.pop_into(&mut buf), 0);
    }

    #[test]
    fn test_clear() {
        let q: Queue<u8, 4> = Queue::new(Overflow::EvictOldest);
        q.push_slice(b"xyz");
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }
}
