//! Hash and home mapping (§4.1).
//!
//! Pure functions: mix a 32-bit key into a well-distributed 64-bit code, then
//! fold that code onto `[0, capacity)`. Deterministic and stateless — never
//! cached in a cell, since the cell only stores `(key, value)` and the probe
//! distance is always recomputed as `i - home(hash(key))`.

/// Two-round xor-shift-multiply integer mixer.
///
/// Source: the classic splitmix-style 64-bit finalizer (see
/// <https://stackoverflow.com/questions/664014>, the mixer
/// `original_source`'s `hash()` cites). Cheap, branch-free, good avalanche.
#[inline]
#[must_use]
pub fn hash(key: u32) -> u64 {
    let mut code = key as u64;
    code ^= code >> 33;
    code = code.wrapping_mul(0xff51_afd7_ed55_8ccd);
    code ^= code >> 33;
    code = code.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    code ^= code >> 33;
    code
}

/// Fold a hash code onto `[0, capacity)`. `capacity` must be a power of two;
/// this is an `&` mask rather than `%` since the caller already validated
/// that invariant at construction time.
#[inline]
#[must_use]
pub fn home(code: u64, capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    (code as usize) & (capacity - 1)
}
