//! Single-slot latest-value cell between a control thread and the audio thread.
//!
//! The control side [`publish`](Publisher::publish)es whole values; the audio
//! side asks once per block whether anything new arrived. Intermediate values
//! published between two reads are skipped: only the latest one matters for
//! configuration like envelope timing or filter coefficients.
//!
//! Reads are wait-free ([`ArcSwap::load`]). The publisher keeps the previous
//! value alive until its next publish, so a read guard dropped on the audio
//! thread is normally not the last owner. If two publishes land while the
//! audio side still holds a guard, dropping that guard frees the value on
//! the audio thread. Reads copy out and drop their guard at once, which
//! keeps that window to a single `load`.
//!
//! ```rust
//! use prism_core::latest;
//!
//! let (mut tx, mut rx) = latest(1.0_f32);
//! assert_eq!(rx.latest(), None); // nothing new yet
//! tx.publish(2.0);
//! tx.publish(3.0);
//! assert_eq!(rx.latest(), Some(3.0));
//! assert_eq!(rx.latest(), None);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

struct Shared<T> {
    slot: ArcSwap<T>,
    /// Bumped after every store to `slot`.
    version: AtomicU64,
}

/// Create a connected publisher/subscriber pair holding `initial`.
pub fn latest<T>(initial: T) -> (Publisher<T>, Subscriber<T>) {
    let shared = Arc::new(Shared {
        slot: ArcSwap::from_pointee(initial),
        version: AtomicU64::new(0),
    });
    (
        Publisher {
            shared: Arc::clone(&shared),
            retired: None,
        },
        Subscriber { shared, seen: 0 },
    )
}

/// Write side of a latest-value cell. Lives off the audio thread.
pub struct Publisher<T> {
    shared: Arc<Shared<T>>,
    /// Previously published value, released on the next publish.
    retired: Option<Arc<T>>,
}

impl<T> Publisher<T> {
    /// Replace the current value.
    ///
    /// Allocates. Never call from the audio thread.
    pub fn publish(&mut self, value: T) {
        let previous = self.shared.slot.swap(Arc::new(value));
        self.shared.version.fetch_add(1, Ordering::Release);
        self.retired = Some(previous);
    }

    /// The most recently published value.
    pub fn current(&self) -> Arc<T> {
        self.shared.slot.load_full()
    }

    /// Number of publishes so far.
    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::Relaxed)
    }
}

/// Read side of a latest-value cell. Lives on the audio thread.
pub struct Subscriber<T> {
    shared: Arc<Shared<T>>,
    /// Version observed at the last successful read
    seen: u64,
}

impl<T: Copy> Subscriber<T> {
    /// Return the current value if it changed since the last call.
    ///
    /// Wait-free and allocation-free.
    #[inline]
    pub fn latest(&mut self) -> Option<T> {
        let version = self.shared.version.load(Ordering::Acquire);
        if version == self.seen {
            return None;
        }
        self.seen = version;
        Some(**self.shared.slot.load())
    }

    /// Return the current value unconditionally and mark it seen.
    #[inline]
    pub fn get(&mut self) -> T {
        self.seen = self.shared.version.load(Ordering::Acquire);
        **self.shared.slot.load()
    }
}

impl<T> Subscriber<T> {
    /// Whether a value newer than the last read is waiting.
    #[inline]
    pub fn has_update(&self) -> bool {
        self.shared.version.load(Ordering::Acquire) != self.seen
    }
}

impl<T> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

impl<T> std::fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("seen", &self.seen)
            .finish_non_exhaustive()
    }
}
