//! Session stores, the bounded session cache, and build-lock coordination.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RegistryOptions;
use crate::definition::AnyArc;
use crate::token::Token;

/// Per-session instance store.
///
/// Mutated only by the lock-guarded build routine, through an atomic
/// snapshot-and-commit so concurrent readers observe either the previous map
/// or the fully built one. Freely shared-read after a build completes.
pub(crate) struct SessionStore {
    key: String,
    instances: RwLock<HashMap<Token, AnyArc>>,
    last_access: Mutex<Instant>,
}

impl SessionStore {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_owned(),
            instances: RwLock::new(HashMap::new()),
            last_access: Mutex::new(Instant::now()),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn get(&self, token: &Token) -> Option<AnyArc> {
        self.instances.read().get(token).cloned()
    }

    pub(crate) fn snapshot(&self) -> HashMap<Token, AnyArc> {
        self.instances.read().clone()
    }

    pub(crate) fn commit(&self, instances: HashMap<Token, AnyArc>) {
        *self.instances.write() = instances;
    }

    fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    fn last_access(&self) -> Instant {
        *self.last_access.lock()
    }
}

/// Exclusive build claim on one session key. Exactly one live lock may exist
/// per key; the generation distinguishes successive holders so a stale
/// release cannot affect a newer lock.
struct BuildLock {
    generation: u64,
    released: watch::Sender<bool>,
}

#[derive(Default)]
struct CacheState {
    stores: HashMap<String, Arc<SessionStore>>,
    locks: HashMap<String, BuildLock>,
}

/// Bounded, time-evicted collection of session stores plus the per-key build
/// locks coordinating exclusive construction.
pub(crate) struct SessionCache {
    state: Mutex<CacheState>,
    next_generation: AtomicU64,
    capacity: usize,
    ttl: Duration,
    lock_timeout: Duration,
}

impl SessionCache {
    pub(crate) fn new(options: &RegistryOptions) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            next_generation: AtomicU64::new(0),
            capacity: options.session_capacity,
            ttl: options.session_ttl,
            lock_timeout: options.lock_timeout,
        }
    }

    /// Acquires the build lock for `key`, waiting out (and if necessary
    /// breaking) a presumed-dead holder. Returns the generation the caller
    /// now owns.
    ///
    /// The release channel is subscribed while the cache mutex is held, so a
    /// release between unlock and await cannot be missed. After a timeout the
    /// stale lock is broken only if its generation is still the one waited
    /// on; either way the loop re-checks, because another caller may have
    /// raced in a fresh lock meanwhile.
    pub(crate) async fn acquire(&self, key: &str) -> u64 {
        loop {
            let (held_generation, mut released) = {
                let mut state = self.state.lock();
                match state.locks.get(key) {
                    None => {
                        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
                        let (released, _) = watch::channel(false);
                        state
                            .locks
                            .insert(key.to_owned(), BuildLock { generation, released });
                        return generation;
                    }
                    Some(lock) => (lock.generation, lock.released.subscribe()),
                }
            };

            match tokio::time::timeout(self.lock_timeout, released.changed()).await {
                // Released normally (or the lock was dropped wholesale);
                // re-check rather than assume the key is free.
                Ok(_) => continue,
                Err(_) => {
                    let mut state = self.state.lock();
                    let stale = matches!(
                        state.locks.get(key),
                        Some(lock) if lock.generation == held_generation
                    );
                    if stale {
                        warn!(
                            session = key,
                            generation = held_generation,
                            "build lock wait timed out; forcibly releasing presumed-dead holder"
                        );
                        if let Some(lock) = state.locks.remove(key) {
                            let _ = lock.released.send(true);
                        }
                    }
                }
            }
        }
    }

    /// Releases the lock for `key` if and only if `generation` matches the
    /// live lock. A mismatch is a zombie release from a caller that was
    /// forcibly timed out; it must not disturb the newer holder.
    pub(crate) fn release(&self, key: &str, generation: u64) {
        let mut state = self.state.lock();
        let owned = matches!(
            state.locks.get(key),
            Some(lock) if lock.generation == generation
        );
        if owned {
            if let Some(lock) = state.locks.remove(key) {
                let _ = lock.released.send(true);
            }
        }
    }

    /// Returns the store for `key`, creating it if absent. Creation at
    /// capacity evicts the least-recently-accessed store that holds no live
    /// lock; stores mid-construction are never evicted.
    pub(crate) fn get_or_create(&self, key: &str) -> Arc<SessionStore> {
        let mut state = self.state.lock();
        if let Some(store) = state.stores.get(key) {
            store.touch();
            return store.clone();
        }

        if state.stores.len() >= self.capacity {
            let victim = state
                .stores
                .iter()
                .filter(|(candidate, _)| !state.locks.contains_key(*candidate))
                .min_by_key(|(_, store)| store.last_access())
                .map(|(candidate, _)| candidate.clone());
            match victim {
                Some(candidate) => {
                    state.stores.remove(&candidate);
                    debug!(session = %candidate, "evicted least-recently-accessed session store");
                }
                None => {
                    debug!("all session stores locked; capacity temporarily exceeded");
                }
            }
        }

        let store = Arc::new(SessionStore::new(key));
        state.stores.insert(key.to_owned(), store.clone());
        store
    }

    /// Drops the store for `key` without touching its lock. Used to roll back
    /// a failed build while the caller still owns the lock.
    pub(crate) fn remove_store(&self, key: &str) {
        self.state.lock().stores.remove(key);
    }

    /// Removes the store and resolves any lock held for `key`, so no waiter
    /// hangs on a session that no longer exists.
    pub(crate) fn drop_session(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        if let Some(lock) = state.locks.remove(key) {
            let _ = lock.released.send(true);
        }
        state.stores.remove(key).is_some()
    }

    /// Removes every store idle longer than the TTL, resolving held locks
    /// first. Returns the number of evicted stores.
    pub(crate) fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .stores
            .iter()
            .filter(|(_, store)| now.duration_since(store.last_access()) >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            if let Some(lock) = state.locks.remove(key) {
                let _ = lock.released.send(true);
            }
            state.stores.remove(key);
            debug!(session = %key, "session store expired");
        }
        expired.len()
    }

    /// Clears all stores and resolves every outstanding lock.
    pub(crate) fn clear_all(&self) {
        let mut state = self.state.lock();
        for (_, lock) in state.locks.drain() {
            let _ = lock.released.send(true);
        }
        state.stores.clear();
    }

    pub(crate) fn store_count(&self) -> usize {
        self.state.lock().stores.len()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.state.lock().stores.contains_key(key)
    }
}
