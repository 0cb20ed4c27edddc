// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-entity mutual exclusion keyed by id.
//!
//! Lock order is conversation before message. Code holding a message lock
//! never acquires a conversation lock.
//!
//! Idle entries are pruned whenever the table outgrows its high-water mark,
//! so the table stays bounded whether or not the retry scheduler runs.

use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Table size that triggers the first automatic prune.
const DEFAULT_PRUNE_THRESHOLD: usize = 1024;

pub struct KeyedLocks<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
    threshold: usize,
    high_water: AtomicUsize,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Copy,
{
    pub fn new() -> Self {
        Self::with_prune_threshold(DEFAULT_PRUNE_THRESHOLD)
    }

    /// Prune automatically once more than `threshold` entries exist.
    pub fn with_prune_threshold(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            locks: DashMap::new(),
            threshold,
            high_water: AtomicUsize::new(threshold),
        }
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        if self.locks.len() >= self.high_water.load(Ordering::Relaxed) {
            self.prune();
            // Entries still held after a prune raise the mark instead of
            // forcing a prune on every acquisition.
            let next = (self.locks.len() * 2).max(self.threshold);
            self.high_water.store(next, Ordering::Relaxed);
        }
        let mutex = Arc::clone(self.locks.entry(key).or_default().value());
        mutex.lock_owned().await
    }

    /// Drop entries nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, m| Arc::strong_count(m) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}
