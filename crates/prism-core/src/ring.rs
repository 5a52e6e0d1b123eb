//! Lock-free single-producer / single-consumer ring buffer.
//!
//! [`RingBuffer::new`] returns a [`Producer`] and a [`Consumer`]. Neither is
//! `Clone` and both operate through `&mut self`, so there is exactly one
//! writer and one reader for the lifetime of the ring. Each handle can move
//! to its own thread.
//!
//! The backing store is a power-of-two array of uninitialized slots with one
//! slot always left empty, so a ring with `capacity()` slots holds at most
//! `capacity() - 1` items. Neither [`Producer::offer`] nor
//! [`Consumer::poll`] allocates, blocks or spins.
//!
//! ```rust
//! use prism_core::RingBuffer;
//!
//! let (mut tx, mut rx) = RingBuffer::<u64>::new(5).unwrap();
//! assert_eq!(tx.capacity(), 8);
//! for i in 0..7 {
//!     assert!(tx.offer(i).is_ok());
//! }
//! assert_eq!(tx.offer(99), Err(99));
//! assert_eq!(rx.poll(), Some(0));
//! ```

#![allow(unsafe_code)]

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::fmt;
use core::mem::MaybeUninit;
use core::ops::Deref;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::RingError;

/// Keeps the producer and consumer indices on separate cache lines.
#[repr(align(64))]
struct CachePadded<T>(T);

impl<T> Deref for CachePadded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

struct Shared<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Next slot to read. Stored only by the consumer.
    head: CachePadded<AtomicUsize>,
    /// Next slot to write. Stored only by the producer.
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: a slot is accessed by at most one side at a time. The producer
// only writes slots in [tail, head - 1) and the consumer only reads slots in
// [head, tail); ownership of a slot changes hands through the Release store /
// Acquire load of the opposite index. Values cross threads, so T: Send.
unsafe impl<T: Send> Send for Shared<T> {}
// SAFETY: see above. Shared is only reachable through one Producer and one
// Consumer, each of which takes &mut self for every slot access.
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    fn with_slots(slots: usize) -> Self {
        let slots: Vec<UnsafeCell<MaybeUninit<T>>> = (0..slots)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        let mask = slots.len() - 1;
        Self {
            slots: slots.into_boxed_slice(),
            mask,
            head: CachePadded(AtomicUsize::new(0)),
            tail: CachePadded(AtomicUsize::new(0)),
        }
    }

    #[inline]
    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head) & self.mask
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let mut head = *self.head.0.get_mut();
        let tail = *self.tail.0.get_mut();
        while head != tail {
            // SAFETY: slots in [head, tail) hold initialized values that were
            // never polled. Both handles are gone, so nothing else reads them.
            unsafe { (*self.slots[head].get()).assume_init_drop() };
            head = (head + 1) & self.mask;
        }
    }
}

/// Slot count for a requested capacity.
///
/// Rounds up to a power of two with a floor of two slots, since one slot is
/// always kept empty.
fn slot_count(capacity: usize) -> Result<usize, RingError> {
    if capacity == 0 {
        return Err(RingError::ZeroCapacity);
    }
    capacity
        .max(2)
        .checked_next_power_of_two()
        .ok_or(RingError::CapacityOverflow(capacity))
}

/// Constructor namespace for the generic SPSC ring.
///
/// The ring itself is only reachable through the [`Producer`] and
/// [`Consumer`] handles.
pub struct RingBuffer<T>(core::marker::PhantomData<T>);

impl<T> RingBuffer<T> {
    /// Create an empty ring with at least `capacity` slots.
    ///
    /// The slot count is the next power of two at or above `capacity`
    /// (minimum 2); usable space is one less.
    ///
    /// # Errors
    ///
    /// [`RingError::ZeroCapacity`] for 0, [`RingError::CapacityOverflow`]
    /// when no power of two that large fits in `usize`.
    pub fn new(capacity: usize) -> Result<(Producer<T>, Consumer<T>), RingError> {
        let slots = slot_count(capacity)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(capacity, slots, "ring created");
        Ok(split(Arc::new(Shared::with_slots(slots))))
    }

    /// Create a ring pre-filled with `capacity() - 1` values from `factory`.
    ///
    /// The ring starts full, so the first `capacity() - 1` polls succeed
    /// without the producer having offered anything. Used to hand a pool of
    /// pre-allocated objects to the consumer side.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_prefill<F>(
        capacity: usize,
        mut factory: F,
    ) -> Result<(Producer<T>, Consumer<T>), RingError>
    where
        F: FnMut() -> T,
    {
        let slots = slot_count(capacity)?;
        let mut shared = Shared::with_slots(slots);
        for slot in shared.slots.iter_mut().take(slots - 1) {
            slot.get_mut().write(factory());
        }
        *shared.tail.0.get_mut() = slots - 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(capacity, slots, "ring created prefilled");
        Ok(split(Arc::new(shared)))
    }
}

fn split<T>(shared: Arc<Shared<T>>) -> (Producer<T>, Consumer<T>) {
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

/// Write half of a [`RingBuffer`].
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Producer<T> {
    /// Push a value if there is room.
    ///
    /// Returns the value back in `Err` when the ring is full. Unread items
    /// are never overwritten.
    #[inline]
    pub fn offer(&mut self, value: T) -> Result<(), T> {
        let shared = &*self.shared;
        let tail = shared.tail.load(Ordering::Relaxed);
        let next = (tail + 1) & shared.mask;
        if next == shared.head.load(Ordering::Acquire) {
            return Err(value);
        }
        // SAFETY: `tail` is outside [head, tail) so the consumer does not
        // touch it, and only this producer writes slots. The slot is
        // uninitialized: it was either never written or moved out by poll.
        unsafe { (*shared.slots[tail].get()).write(value) };
        shared.tail.store(next, Ordering::Release);
        Ok(())
    }

    /// Approximate number of unread items.
    #[inline]
    pub fn size(&self) -> usize {
        self.shared.len()
    }

    /// Whether the ring currently looks empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether the next [`offer`](Self::offer) would fail.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.size() == self.shared.mask
    }

    /// Power-of-two slot count.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    /// Maximum number of items the ring can hold.
    #[inline]
    pub fn usable(&self) -> usize {
        self.shared.mask
    }
}

/// Read half of a [`RingBuffer`].
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Consumer<T> {
    /// Take the oldest value, or `None` when empty.
    #[inline]
    pub fn poll(&mut self) -> Option<T> {
        let shared = &*self.shared;
        let head = shared.head.load(Ordering::Relaxed);
        if head == shared.tail.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: head != tail so the slot was initialized by the producer,
        // and the Acquire load of tail makes that write visible. Moving the
        // value out leaves the slot logically uninitialized; the producer
        // cannot reuse it until the Release store below.
        let value = unsafe { (*shared.slots[head].get()).assume_init_read() };
        shared.head.store((head + 1) & shared.mask, Ordering::Release);
        Some(value)
    }

    /// Borrow the most recently offered value without consuming anything.
    #[inline]
    pub fn peek_newest(&self) -> Option<&T> {
        let shared = &*self.shared;
        let tail = shared.tail.load(Ordering::Acquire);
        if tail == shared.head.load(Ordering::Relaxed) {
            return None;
        }
        let newest = tail.wrapping_sub(1) & shared.mask;
        // SAFETY: `newest` lies in [head, tail), so it is initialized and the
        // producer will not write it until the consumer advances past it,
        // which needs &mut self and therefore ends this borrow first.
        Some(unsafe { (*shared.slots[newest].get()).assume_init_ref() })
    }

    /// Approximate number of unread items.
    #[inline]
    pub fn size(&self) -> usize {
        self.shared.len()
    }

    /// Whether the ring currently looks empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Power-of-two slot count.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    /// Maximum number of items the ring can hold.
    #[inline]
    pub fn usable(&self) -> usize {
        self.shared.mask
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish()
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::Cell;

    #[test]
    fn capacity_rounds_to_power_of_two() {
        let (tx, rx) = RingBuffer::<u8>::new(5).unwrap();
        assert_eq!(tx.capacity(), 8);
        assert_eq!(rx.usable(), 7);

        let (tx, _rx) = RingBuffer::<u8>::new(8).unwrap();
        assert_eq!(tx.capacity(), 8);

        let (tx, _rx) = RingBuffer::<u8>::new(1).unwrap();
        assert_eq!(tx.capacity(), 2);
        assert_eq!(tx.usable(), 1);
    }

    #[test]
    fn rejects_bad_capacity() {
        assert_eq!(
            RingBuffer::<u8>::new(0).unwrap_err(),
            RingError::ZeroCapacity
        );
        assert_eq!(
            RingBuffer::<u8>::new(usize::MAX).unwrap_err(),
            RingError::CapacityOverflow(usize::MAX)
        );
    }

    #[test]
    fn fifo_and_full_rejection() {
        let (mut tx, mut rx) = RingBuffer::new(4).unwrap();
        assert!(rx.poll().is_none());
        assert_eq!(tx.offer(1), Ok(()));
        assert_eq!(tx.offer(2), Ok(()));
        assert_eq!(tx.offer(3), Ok(()));
        assert!(tx.is_full());
        assert_eq!(tx.offer(4), Err(4));
        assert_eq!(rx.poll(), Some(1));
        assert_eq!(tx.offer(5), Ok(()));
        assert_eq!(rx.poll(), Some(2));
        assert_eq!(rx.poll(), Some(3));
        assert_eq!(rx.poll(), Some(5));
        assert_eq!(rx.poll(), None);
        assert!(rx.is_empty());
    }

    #[test]
    fn wraps_many_times() {
        let (mut tx, mut rx) = RingBuffer::new(4).unwrap();
        for i in 0..1000u32 {
            tx.offer(i).unwrap();
            assert_eq!(tx.size(), 1);
            assert_eq!(rx.poll(), Some(i));
        }
    }

    #[test]
    fn prefill_starts_full() {
        let mut n = 0;
        let (mut tx, mut rx) = RingBuffer::with_prefill(8, || {
            n += 1;
            vec![0.0f32; n]
        })
        .unwrap();
        assert_eq!(rx.size(), 7);
        assert!(tx.offer(vec![]).is_err());
        for expected in 1..=7 {
            assert_eq!(rx.poll().map(|v| v.len()), Some(expected));
        }
        assert!(rx.poll().is_none());
    }

    #[test]
    fn peek_newest_does_not_consume() {
        let (mut tx, mut rx) = RingBuffer::new(4).unwrap();
        assert!(rx.peek_newest().is_none());
        tx.offer('a').unwrap();
        tx.offer('b').unwrap();
        assert_eq!(rx.peek_newest(), Some(&'b'));
        assert_eq!(rx.size(), 2);
        assert_eq!(rx.poll(), Some('a'));
    }

    struct Counted(Rc<Cell<usize>>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn drop_releases_unread_items_only() {
        let drops = Rc::new(Cell::new(0));
        {
            let (mut tx, mut rx) = RingBuffer::new(8).unwrap();
            for _ in 0..5 {
                assert!(tx.offer(Counted(Rc::clone(&drops))).is_ok());
            }
            drop(rx.poll());
            drop(rx.poll());
            assert_eq!(drops.get(), 2);
        }
        assert_eq!(drops.get(), 5);
    }

    #[test]
    fn rejected_value_is_returned_not_dropped() {
        let drops = Rc::new(Cell::new(0));
        let (mut tx, _rx) = RingBuffer::new(2).unwrap();
        assert!(tx.offer(Counted(Rc::clone(&drops))).is_ok());
        let back = tx.offer(Counted(Rc::clone(&drops)));
        assert!(back.is_err());
        assert_eq!(drops.get(), 0);
        drop(back);
        assert_eq!(drops.get(), 1);
    }
}
