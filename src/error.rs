//! Error taxonomy for the table.
//!
//! Per the failure-semantics design, only two classes of failure ever reach
//! the public API: invalid configuration at construction time (returned as
//! `Result`), and capacity exhaustion during an operation (a programming
//! invariant, reported by panicking with [`TableError::CapacityExhausted`]'s
//! `Display` output rather than threading a `Result` through every call).
//! Everything else — a failed fast-path CAS, an optimistic-read version
//! mismatch — is recoverable contention handled internally and never
//! surfaces here.

use thiserror::Error;

/// Failures the table can report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// `capacity` was zero or not a power of two.
    #[error("capacity {capacity} must be a nonzero power of two")]
    InvalidCapacity {
        /// The rejected capacity.
        capacity: usize,
    },

    /// `stripe_width` was zero.
    #[error("stripe_width must be nonzero")]
    InvalidStripeWidth,

    /// `overflow_slots` was zero; at least one overflow slot is required so
    /// the hot-path probe never needs to wrap modulo `capacity`.
    #[error("overflow_slots must be nonzero")]
    InvalidOverflowSlots,

    /// The locked walk ran off the end of the overflow tail. This is a
    /// programming error in this fixed-capacity design: it means either the
    /// table is full or `overflow_slots` was sized too small for the
    /// workload's probe lengths.
    #[error("capacity exhausted: no free slot within {searched} probes of home {home}")]
    CapacityExhausted {
        /// The home index the search started from.
        home: usize,
        /// How many slots were probed before giving up.
        searched: usize,
    },
}
