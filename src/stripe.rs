//! The stripe lock array (§4.3, data model "Stripe lock").
//!
//! Each stripe covers `stripe_width` consecutive slots and owns one mutex
//! plus one version counter. Holding the mutex is required to mutate any
//! cell in the stripe, except the three documented lock-free fast paths.
//! The version counter increments on every successful acquisition — readers
//! sample it to validate an optimistic read (I5).
//!
//! The mutex here is a plain [`parking_lot::Mutex`], not a recursive mutex:
//! recursion is handled one layer up, by [`crate::thread_manager`] tracking
//! which stripes the current thread already holds and skipping a redundant
//! acquisition. That reading is what makes the "recursive mutex" note in the
//! design notes and the idempotent `lock()` contract both true at once
//! without the underlying lock type itself needing reentrant semantics.

use core::sync::atomic::AtomicU64;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

use crate::pr;

/// One stripe: a mutex guarding the right to mutate its slot range, and a
/// version counter observers sample for optimistic validation.
struct Stripe {
    mutex: Mutex<()>,
    version: AtomicU64,
}

impl Stripe {
    fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            version: AtomicU64::new(0),
        }
    }
}

/// The full array of stripes covering a bucket store.
///
/// `CachePadded` keeps adjacent stripes' mutexes and counters off the same
/// cache line, the same tactic the pack's other striped maps use
/// (`crossbeam_utils::CachePadded` over a `Vec` of per-stripe locks).
pub struct StripeLockArray {
    stripes: Box<[CachePadded<Stripe>]>,
    stripe_width: usize,
}

impl StripeLockArray {
    /// Build enough stripes to cover `total_slots` at `stripe_width` slots
    /// per stripe (`⌈total_slots / stripe_width⌉`).
    #[must_use]
    pub fn new(total_slots: usize, stripe_width: usize) -> Self {
        debug_assert!(stripe_width > 0);
        let count = total_slots.div_ceil(stripe_width);
        let stripes: Vec<CachePadded<Stripe>> =
            (0..count).map(|_| CachePadded::new(Stripe::new())).collect();
        Self {
            stripes: stripes.into_boxed_slice(),
            stripe_width,
        }
    }

    /// Number of stripes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }

    /// Map a slot index to its owning stripe.
    #[inline]
    #[must_use]
    pub fn stripe_of(&self, slot_index: usize) -> usize {
        slot_index / self.stripe_width
    }

    /// Current version of stripe `s`.
    #[inline]
    #[must_use]
    pub fn version(&self, s: usize) -> u64 {
        pr::u64_ops::load(&self.stripes[s].version)
    }

    /// Block until stripe `s`'s mutex is acquired, then bump its version.
    /// Must only be called when the caller does not already hold stripe `s`
    /// (see [`crate::thread_manager`] for the idempotency check).
    pub(crate) fn acquire(&self, s: usize) {
        // The guard is intentionally leaked here: release happens out of
        // band, by index, from `thread_manager::release_all`, mirroring the
        // "acquire in probe order, release in reverse" protocol rather than
        // RAII drop order.
        core::mem::forget(self.stripes[s].mutex.lock());
        pr::u64_ops::inc(&self.stripes[s].version);
    }

    /// Release stripe `s`'s mutex, previously taken by [`Self::acquire`].
    ///
    /// # Safety
    /// The caller must have a matching, not-yet-released `acquire(s)` on
    /// this exact stripe from this exact thread.
    pub(crate) unsafe fn release(&self, s: usize) {
        self.stripes[s].mutex.force_unlock();
    }
}
