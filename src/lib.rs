//! # concurrencykit
//!
//! A concurrent, in-memory key→value store built on Robin Hood
//! open-addressing, tuned for high throughput on mixed read/write workloads
//! with skewed key distributions.
//!
//! The crate ships two engines:
//!
//! - [`ParallelTable`] — the fixed-capacity, multi-threaded engine. Every
//!   operation tries a lock-free fast path first (an atomic CAS on the home
//!   slot for `insert`/`remove`, an optimistic version-validated probe for
//!   `find`) and falls back to a stripe-locked walk only on contention.
//! - [`SequentialTable`] — the single-threaded reference engine, used both
//!   as the correctness oracle in tests and directly whenever only one
//!   thread touches the table. Unlike the parallel engine it grows by
//!   doubling rather than holding a fixed overflow tail.
//!
//! Both are built through [`TableConfig`].
//!
//! ## Module organization
//!
//! ### Foundation
//! - [`cc`] — bit manipulation and branch-prediction hints
//! - [`pr`] — atomic primitives and memory fences
//! - [`backoff`] — exponential backoff for contention pacing
//! - [`error`] — the [`error::TableError`] taxonomy
//!
//! ### Core (§4 of the design)
//! - [`hash`] — key → hash code → home-index mapping
//! - [`cell`] — the packed `(key, value)` atomic cell
//! - [`bucket_store`] — the fixed-size atomic slot array
//! - [`stripe`] — per-stripe mutex + version counter
//! - [`thread_manager`] — per-thread held-stripe and speculation bookkeeping
//! - [`sequential`] — the single-threaded reference engine
//! - [`parallel`] — the concurrent engine
//!
//! ### Configuration
//! - [`config`] — [`config::TableConfig`], the builder for both engines
//!
//! ## Key/value domain
//!
//! Keys and values are `u32`. The key `0` is reserved as the empty-slot
//! sentinel and is rejected by every operation (`assert_ne!` at the API
//! boundary — see [`cell`]'s module docs for why admitting `0` would require
//! widening the cell past one lock-free word).
//!
//! ## What this crate does not do
//!
//! No workload generation, no CLI, no result recording, no logging
//! configuration beyond emitting [`tracing`] events — those are external
//! collaborators. No dynamic growth in [`ParallelTable`] (fixed capacity
//! plus a small overflow tail — see [`config::TableConfig`]), no
//! persistence, no iteration order, no lock-free progress guarantee beyond
//! the three documented fast paths.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Compiler compatibility utilities.
///
/// Provides bit manipulation operations (ffs, ctz, popcount) and branch
/// prediction hints.
pub mod cc;

/// Atomic primitives and memory barriers.
///
/// Provides atomic operations with various memory orderings; every atomic
/// access elsewhere in the crate is routed through here.
pub mod pr;

/// Exponential backoff for contention management.
pub mod backoff;

/// The table's error taxonomy.
pub mod error;

/// Hash and home-index mapping.
pub mod hash;

/// The packed `(key, value)` atomic cell.
pub mod cell;

/// The fixed-size atomic bucket array.
pub mod bucket_store;

/// Per-stripe mutex and version counter.
pub mod stripe;

/// Per-thread held-stripe and speculation bookkeeping.
pub mod thread_manager;

/// The single-threaded Robin Hood reference engine.
pub mod sequential;

/// The concurrent, stripe-locked Robin Hood engine.
pub mod parallel;

/// Table construction and configuration knobs.
pub mod config;

pub use cc::{ctz, ffs, popcount};
pub use config::TableConfig;
pub use error::TableError;
pub use parallel::ParallelTable;
pub use sequential::SequentialTable;
