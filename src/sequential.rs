//! The single-threaded reference engine (§4.4).
//!
//! This is the correctness oracle: classic Robin Hood hashing with plain
//! (non-atomic) buckets, wraparound probing, and resize-on-load. It is also
//! what the parallel engine must agree with whenever only one thread is
//! active — the two share no code (the parallel engine cannot resize and
//! uses an overflow tail instead of wraparound) but must produce identical
//! observable mappings for the same sequence of operations.

use tracing::trace;

use crate::cell::Cell;
use crate::config::TableConfig;
use crate::hash::{hash, home};

/// A single-threaded Robin Hood hash table, growing by doubling.
pub struct SequentialTable {
    buckets: Vec<Cell>,
    capacity: usize,
    length: usize,
    grow_threshold: f64,
}

fn probe_distance(idx: usize, home: usize, capacity: usize) -> usize {
    (idx + capacity - home) % capacity
}

impl SequentialTable {
    pub(crate) fn from_config(config: TableConfig) -> Self {
        let capacity = config.capacity();
        Self {
            buckets: vec![Cell::EMPTY; capacity],
            capacity,
            length: 0,
            grow_threshold: config.load_factor_grow_threshold_value(),
        }
    }

    /// Number of occupied cells.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current capacity (a power of two).
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn needs_grow(&self) -> bool {
        let load = (self.length + 1) as f64 / self.capacity as f64;
        load > self.grow_threshold || self.length + 1 >= self.capacity
    }

    fn grow(&mut self) {
        let new_capacity = self.capacity * 2;
        trace!(old = self.capacity, new = new_capacity, "sequential table resize");
        let old_buckets = core::mem::replace(&mut self.buckets, vec![Cell::EMPTY; new_capacity]);
        self.capacity = new_capacity;
        self.length = 0;
        for cell in old_buckets {
            if !cell.is_empty() {
                self.insert_no_grow(cell.key, cell.value);
            }
        }
    }

    fn insert_no_grow(&mut self, key: u32, value: u32) -> bool {
        let mut pending = Cell::new(key, value);
        let mut idx = home(hash(pending.key), self.capacity);
        let mut dist = 0usize;

        loop {
            let resident = self.buckets[idx];

            if resident.is_empty() {
                self.buckets[idx] = pending;
                self.length += 1;
                return true;
            }

            if resident.key == pending.key {
                self.buckets[idx] = pending;
                return true;
            }

            let resident_home = home(hash(resident.key), self.capacity);
            let resident_dist = probe_distance(idx, resident_home, self.capacity);

            if resident_dist < dist {
                self.buckets[idx] = pending;
                pending = resident;
                dist = resident_dist;
            }

            idx = (idx + 1) % self.capacity;
            dist += 1;
        }
    }

    /// Insert or update `key -> value`. Returns `true` always in this
    /// growable design (it only fails to make progress if capacity growth
    /// itself fails, which is an allocation failure, not a logical one).
    pub fn insert(&mut self, key: u32, value: u32) -> bool {
        assert_ne!(key, 0, "key 0 is reserved as the empty sentinel");
        if self.needs_grow() {
            self.grow();
        }
        self.insert_no_grow(key, value)
    }

    /// Look up `key`.
    #[must_use]
    pub fn search(&self, key: u32) -> Option<u32> {
        assert_ne!(key, 0, "key 0 is reserved as the empty sentinel");
        let home_idx = home(hash(key), self.capacity);
        let mut idx = home_idx;
        let mut dist = 0usize;

        loop {
            let resident = self.buckets[idx];
            if resident.is_empty() {
                return None;
            }
            if resident.key == key {
                return Some(resident.value);
            }
            let resident_home = home(hash(resident.key), self.capacity);
            let resident_dist = probe_distance(idx, resident_home, self.capacity);
            if resident_dist < dist {
                return None;
            }
            idx = (idx + 1) % self.capacity;
            dist += 1;
        }
    }

    /// Remove `key` if present. Returns whether a removal occurred.
    pub fn remove(&mut self, key: u32) -> bool {
        assert_ne!(key, 0, "key 0 is reserved as the empty sentinel");
        let home_idx = home(hash(key), self.capacity);
        let mut idx = home_idx;
        let mut dist = 0usize;

        let victim = loop {
            let resident = self.buckets[idx];
            if resident.is_empty() {
                return false;
            }
            if resident.key == key {
                break idx;
            }
            let resident_home = home(hash(resident.key), self.capacity);
            let resident_dist = probe_distance(idx, resident_home, self.capacity);
            if resident_dist < dist {
                return false;
            }
            idx = (idx + 1) % self.capacity;
            dist += 1;
        };

        // Backward-shift deletion: pull each following run of displaced
        // entries back by one, stopping at the first entry already at its
        // own home (distance 0) or the first empty slot.
        let mut prev = victim;
        let mut cur = (victim + 1) % self.capacity;
        loop {
            let resident = self.buckets[cur];
            if resident.is_empty() {
                break;
            }
            let resident_home = home(hash(resident.key), self.capacity);
            let resident_dist = probe_distance(cur, resident_home, self.capacity);
            if resident_dist == 0 {
                break;
            }
            self.buckets[prev] = resident;
            prev = cur;
            cur = (cur + 1) % self.capacity;
        }
        self.buckets[prev] = Cell::EMPTY;
        self.length -= 1;
        true
    }
}

#[cfg(test)]
impl core::fmt::Debug for SequentialTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "SequentialTable(len={}/cap={}) [", self.length, self.capacity)?;
        for (i, cell) in self.buckets.iter().enumerate() {
            if cell.is_empty() {
                writeln!(f, "  {i}: _")?;
            } else {
                let h = home(hash(cell.key), self.capacity);
                let d = probe_distance(i, h, self.capacity);
                writeln!(f, "  {i}: home={h}+{d} {}: {}", cell.key, cell.value)?;
            }
        }
        write!(f, "]")
    }
}
