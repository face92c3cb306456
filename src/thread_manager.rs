//! Per-thread lock manager (§4.3).
//!
//! Each worker thread gets one manager, reused across operations
//! (`std::thread_local!`), bookkeeping which stripes *this thread* currently
//! holds during the in-flight operation and which stripe versions it has
//! sampled during an in-flight optimistic read. Both lists are always empty
//! at the start of an operation and are guaranteed empty again by the time
//! the operation returns — a panic mid-operation still drains the held list
//! via [`StripeGuard`]'s `Drop`, so a capacity-exhaustion panic never leaves
//! a stripe mutex held forever.

use std::cell::RefCell;

use crate::stripe::StripeLockArray;

#[derive(Default)]
struct ManagerState {
    held: Vec<usize>,
    observed: Vec<(usize, u64)>,
}

thread_local! {
    static STATE: RefCell<ManagerState> = RefCell::new(ManagerState::default());
}

/// Lock stripe `slot_index / stripe_width` on behalf of the current thread,
/// if not already held. Idempotent.
pub(crate) fn lock(stripes: &StripeLockArray, slot_index: usize) {
    let s = stripes.stripe_of(slot_index);
    let already_held = STATE.with(|state| state.borrow().held.contains(&s));
    if already_held {
        return;
    }
    // Acquire outside any borrow of STATE: `acquire` only touches `stripes`.
    stripes.acquire(s);
    STATE.with(|state| state.borrow_mut().held.push(s));
}

/// Release every stripe this thread currently holds, in reverse acquisition
/// order, and clear both bookkeeping lists.
pub(crate) fn release_all(stripes: &StripeLockArray) {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        while let Some(s) = state.held.pop() {
            // SAFETY: `s` was pushed by a matching `acquire` on this thread
            // in `lock`, and has not been released since (the list only
            // ever shrinks here).
            unsafe { stripes.release(s) };
        }
        state.observed.clear();
    });
}

/// Snapshot stripe `slot_index / stripe_width`'s version for an optimistic
/// read. Returns `false` (speculation invalid) if this thread already holds
/// that stripe — version order matters: read the version *before* checking
/// self-held state, so a concurrent writer that acquires between those two
/// steps is still caught by [`finish_speculate`].
pub(crate) fn speculate(stripes: &StripeLockArray, slot_index: usize) -> bool {
    let s = stripes.stripe_of(slot_index);
    let version = stripes.version(s);
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        if state.held.contains(&s) {
            return false;
        }
        state.observed.push((s, version));
        true
    })
}

/// Validate every stripe version sampled by [`speculate`] since the last
/// call. Clears the observed list regardless of outcome.
pub(crate) fn finish_speculate(stripes: &StripeLockArray) -> bool {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        let valid = state
            .observed
            .iter()
            .all(|&(s, observed)| stripes.version(s) == observed);
        state.observed.clear();
        valid
    })
}

/// RAII guard that calls [`release_all`] when dropped, so a mid-slow-path
/// panic (capacity exhaustion) still releases every stripe the operation
/// had acquired.
pub(crate) struct StripeGuard<'a> {
    stripes: &'a StripeLockArray,
}

impl<'a> StripeGuard<'a> {
    pub(crate) fn new(stripes: &'a StripeLockArray) -> Self {
        Self { stripes }
    }

    pub(crate) fn lock(&self, slot_index: usize) {
        lock(self.stripes, slot_index);
    }
}

impl Drop for StripeGuard<'_> {
    fn drop(&mut self) {
        release_all(self.stripes);
    }
}
