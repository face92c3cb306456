//! Table construction and configuration knobs.
//!
//! Mirrors the builder idiom used elsewhere in the pack: plain setters that
//! take `self` by value and a final `build` that validates everything at
//! once rather than failing setter-by-setter.

use crate::error::TableError;
use crate::parallel::ParallelTable;
use crate::sequential::SequentialTable;

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_OVERFLOW_SLOTS: usize = 10;
const DEFAULT_STRIPE_WIDTH: usize = 16;
const DEFAULT_OPTIMISTIC_FIND_RETRIES: usize = 10;
const DEFAULT_LOAD_FACTOR_GROW_THRESHOLD: f64 = 0.9;

/// Builder for either table flavor.
///
/// `capacity` must be a power of two (default 1024; production runs size it
/// up to `1 << 20`). `overflow_slots` bounds how far the hot-path probe may
/// run past the last home index before needing to wrap (default 10).
/// `stripe_width` sets how many consecutive slots share one stripe lock
/// (default 16). `optimistic_find_retries` bounds the optimistic-read retry
/// loop in `find` before falling back to a locked walk (default 10).
/// `load_factor_grow_threshold` only applies to [`SequentialTable`] — the
/// parallel engine is fixed-capacity (default 0.9).
#[derive(Debug, Clone)]
pub struct TableConfig {
    capacity: usize,
    overflow_slots: usize,
    stripe_width: usize,
    optimistic_find_retries: usize,
    load_factor_grow_threshold: f64,
}

impl TableConfig {
    /// Start a builder with the given capacity and every other knob at its
    /// documented default.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            overflow_slots: DEFAULT_OVERFLOW_SLOTS,
            stripe_width: DEFAULT_STRIPE_WIDTH,
            optimistic_find_retries: DEFAULT_OPTIMISTIC_FIND_RETRIES,
            load_factor_grow_threshold: DEFAULT_LOAD_FACTOR_GROW_THRESHOLD,
        }
    }

    /// Override the overflow tail length.
    #[inline]
    #[must_use]
    pub fn overflow_slots(mut self, overflow_slots: usize) -> Self {
        self.overflow_slots = overflow_slots;
        self
    }

    /// Override the stripe width.
    #[inline]
    #[must_use]
    pub fn stripe_width(mut self, stripe_width: usize) -> Self {
        self.stripe_width = stripe_width;
        self
    }

    /// Override the optimistic-read retry budget for `find`.
    #[inline]
    #[must_use]
    pub fn optimistic_find_retries(mut self, retries: usize) -> Self {
        self.optimistic_find_retries = retries;
        self
    }

    /// Override the sequential engine's grow threshold.
    #[inline]
    #[must_use]
    pub fn load_factor_grow_threshold(mut self, threshold: f64) -> Self {
        self.load_factor_grow_threshold = threshold;
        self
    }

    fn validate(&self) -> Result<(), TableError> {
        if self.capacity == 0 || !self.capacity.is_power_of_two() {
            return Err(TableError::InvalidCapacity {
                capacity: self.capacity,
            });
        }
        if self.stripe_width == 0 {
            return Err(TableError::InvalidStripeWidth);
        }
        if self.overflow_slots == 0 {
            return Err(TableError::InvalidOverflowSlots);
        }
        Ok(())
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn overflow_slots_value(&self) -> usize {
        self.overflow_slots
    }

    pub(crate) fn stripe_width_value(&self) -> usize {
        self.stripe_width
    }

    pub(crate) fn optimistic_find_retries_value(&self) -> usize {
        self.optimistic_find_retries
    }

    pub(crate) fn load_factor_grow_threshold_value(&self) -> f64 {
        self.load_factor_grow_threshold
    }

    /// Build the concurrent, fixed-capacity engine.
    pub fn build(self) -> Result<ParallelTable, TableError> {
        self.validate()?;
        Ok(ParallelTable::from_config(self))
    }

    /// Build the single-threaded reference engine.
    pub fn build_sequential(self) -> Result<SequentialTable, TableError> {
        self.validate()?;
        Ok(SequentialTable::from_config(self))
    }
}
