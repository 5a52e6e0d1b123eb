//! SPSC ring specialized for packed `u32` events.
//!
//! Same one-slot-empty, power-of-two layout as [`RingBuffer`](crate::RingBuffer)
//! but every slot is an [`AtomicU32`], so the implementation needs no
//! `unsafe`. Typically carries [`Command`](crate::Command) packets (note on,
//! note off, retrigger) from a control thread to the audio thread or the
//! other way round.
//!
//! ```rust
//! use prism_core::IntRing;
//!
//! let (mut tx, mut rx) = IntRing::new(4).unwrap();
//! assert!(tx.offer(0x0100_3C64));
//! assert_eq!(rx.poll(), Some(0x0100_3C64));
//! assert_eq!(rx.poll(), None);
//! ```

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::error::RingError;

struct Shared {
    slots: Box<[AtomicU32]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl Shared {
    #[inline]
    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head) & self.mask
    }
}

/// Constructor namespace for the integer SPSC ring.
#[derive(Debug)]
pub struct IntRing;

impl IntRing {
    /// Create an empty ring with at least `capacity` slots (power of two,
    /// minimum 2). Usable space is one less than the slot count.
    ///
    /// # Errors
    ///
    /// [`RingError::ZeroCapacity`] for 0, [`RingError::CapacityOverflow`]
    /// when no power of two that large fits in `usize`.
    pub fn new(capacity: usize) -> Result<(IntProducer, IntConsumer), RingError> {
        if capacity == 0 {
            return Err(RingError::ZeroCapacity);
        }
        let slots = capacity
            .max(2)
            .checked_next_power_of_two()
            .ok_or(RingError::CapacityOverflow(capacity))?;
        let shared = Arc::new(Shared {
            slots: (0..slots).map(|_| AtomicU32::new(0)).collect(),
            mask: slots - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(capacity, slots, "int ring created");
        Ok((
            IntProducer {
                shared: Arc::clone(&shared),
            },
            IntConsumer { shared },
        ))
    }
}

/// Write half of an [`IntRing`].
pub struct IntProducer {
    shared: Arc<Shared>,
}

impl IntProducer {
    /// Push a value. Returns `false` (and drops nothing) when the ring is full.
    #[inline]
    pub fn offer(&mut self, value: u32) -> bool {
        let shared = &*self.shared;
        let tail = shared.tail.load(Ordering::Relaxed);
        let next = (tail + 1) & shared.mask;
        if next == shared.head.load(Ordering::Acquire) {
            return false;
        }
        shared.slots[tail].store(value, Ordering::Relaxed);
        shared.tail.store(next, Ordering::Release);
        true
    }

    /// Approximate number of unread values.
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
}

/// Read half of an [`IntRing`].
pub struct IntConsumer {
    shared: Arc<Shared>,
}

impl IntConsumer {
    /// Take the oldest value, or `None` when empty.
    #[inline]
    pub fn poll(&mut self) -> Option<u32> {
        let shared = &*self.shared;
        let head = shared.head.load(Ordering::Relaxed);
        if head == shared.tail.load(Ordering::Acquire) {
            return None;
        }
        let value = shared.slots[head].load(Ordering::Relaxed);
        shared.head.store((head + 1) & shared.mask, Ordering::Release);
        Some(value)
    }

    /// Approximate number of unread values.
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
}

impl core::fmt::Debug for IntProducer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IntProducer")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish()
    }
}

impl core::fmt::Debug for IntConsumer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IntConsumer")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish()
    }
}
