//! Lock-free, read-mostly keyed registry.
//!
//! Shared index-wide metadata (similarity instances and other per-kind
//! singletons) is published through a [`Registry`]. Lookups never block:
//! they walk an immutable snapshot of a bucket's list. Registration races
//! through a compare-and-exchange on the bucket head; a writer that loses
//! the race discards its candidate and returns the winner's value, so each
//! key has exactly one live instance for the lifetime of the registry.
//!
//! Entries are never removed, which is what makes handing out references
//! to them from a plain atomic load sound.

use std::fmt;
use std::hash::BuildHasher;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use ahash::RandomState;

const DEFAULT_BUCKETS: usize = 64;

struct Entry<V: ?Sized> {
    key: String,
    value: Arc<V>,
    // Immutable once the entry is published.
    next: *mut Entry<V>,
}

/// A keyed registry with wait-free reads and CAS-raced first writes.
pub struct Registry<V: ?Sized> {
    buckets: Box<[AtomicPtr<Entry<V>>]>,
    hasher: RandomState,
    len: AtomicUsize,
}

// SAFETY: entries are only reachable through atomics, are immutable after
// publication and are freed only in `drop`, which has exclusive access.
// Values are shared as `Arc<V>`, so they must themselves be `Send + Sync`.
unsafe impl<V: ?Sized + Send + Sync> Send for Registry<V> {}
unsafe impl<V: ?Sized + Send + Sync> Sync for Registry<V> {}

impl<V: ?Sized> Registry<V> {
    /// Create a registry with the default number of buckets.
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Create a registry with a fixed number of buckets (at least one).
    pub fn with_buckets(buckets: usize) -> Self {
        let buckets = buckets.max(1);
        Registry {
            buckets: (0..buckets).map(|_| AtomicPtr::new(ptr::null_mut())).collect(),
            hasher: RandomState::new(),
            len: AtomicUsize::new(0),
        }
    }

    fn bucket(&self, key: &str) -> &AtomicPtr<Entry<V>> {
        let hash = self.hasher.hash_one(key) as usize;
        &self.buckets[hash % self.buckets.len()]
    }

    fn find(mut node: *mut Entry<V>, key: &str) -> Option<Arc<V>> {
        while !node.is_null() {
            // SAFETY: published entries stay alive until the registry drops.
            let entry = unsafe { &*node };
            if entry.key == key {
                return Some(Arc::clone(&entry.value));
            }
            node = entry.next;
        }
        None
    }

    /// Look up a key. Never blocks and never retries.
    pub fn fetch(&self, key: &str) -> Option<Arc<V>> {
        Self::find(self.bucket(key).load(Ordering::Acquire), key)
    }

    /// Register a value under `key` unless one is already present.
    ///
    /// Returns the live instance: `value` if this call won, otherwise the
    /// previously registered value (and `value` is dropped).
    pub fn register<S: Into<String>>(&self, key: S, value: Arc<V>) -> Arc<V> {
        let key = key.into();
        let bucket = self.bucket(&key);
        let mut candidate = Box::new(Entry {
            key,
            value,
            next: ptr::null_mut(),
        });

        loop {
            let head = bucket.load(Ordering::Acquire);
            if let Some(existing) = Self::find(head, &candidate.key) {
                tracing::trace!(
                    target: "lance::registry",
                    key = %candidate.key,
                    "key already registered, reusing existing instance"
                );
                return existing;
            }

            candidate.next = head;
            let raw = Box::into_raw(candidate);
            match bucket.compare_exchange(head, raw, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    self.len.fetch_add(1, Ordering::Relaxed);
                    // SAFETY: `raw` was just published and is never freed before drop.
                    return Arc::clone(unsafe { &(*raw).value });
                }
                Err(_) => {
                    // SAFETY: the CAS failed, so `raw` was never shared.
                    candidate = unsafe { Box::from_raw(raw) };
                    tracing::trace!(
                        target: "lance::registry",
                        key = %candidate.key,
                        "lost registration race, rescanning bucket"
                    );
                }
            }
        }
    }

    /// Fetch `key`, building and registering a value only if it is absent.
    ///
    /// `make` may run on several threads at once; only one result survives.
    pub fn get_or_register_with<S, F>(&self, key: S, make: F) -> Arc<V>
    where
        S: Into<String>,
        F: FnOnce() -> Arc<V>,
    {
        let key = key.into();
        if let Some(existing) = self.fetch(&key) {
            return existing;
        }
        self.register(key, make())
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        for bucket in self.buckets.iter() {
            let mut node = bucket.load(Ordering::Acquire);
            while !node.is_null() {
                // SAFETY: see `find`.
                let entry = unsafe { &*node };
                keys.push(entry.key.clone());
                node = entry.next;
            }
        }
        keys
    }
}

impl<V: ?Sized> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: ?Sized> Drop for Registry<V> {
    fn drop(&mut self) {
        for bucket in self.buckets.iter_mut() {
            let mut node = *bucket.get_mut();
            while !node.is_null() {
                // SAFETY: `&mut self` guarantees no concurrent readers remain.
                let entry = unsafe { Box::from_raw(node) };
                node = entry.next;
            }
        }
    }
}

impl<V: ?Sized> fmt::Debug for Registry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("buckets", &self.buckets.len())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_register_and_fetch() {
        let registry: Registry<String> = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.fetch("a").is_none());

        let a = registry.register("a", Arc::new("first".to_string()));
        assert_eq!(*a, "first");

        // Second registration loses and gets the original.
        let again = registry.register("a", Arc::new("second".to_string()));
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_single_bucket_chains() {
        let registry: Registry<u32> = Registry::with_buckets(1);
        for i in 0..10 {
            registry.register(format!("k{i}"), Arc::new(i));
        }
        for i in 0..10 {
            assert_eq!(*registry.fetch(&format!("k{i}")).unwrap(), i);
        }
        let mut keys = registry.keys();
        keys.sort();
        assert_eq!(keys.len(), 10);
    }

    #[test]
    fn test_unsized_values() {
        let registry: Registry<dyn Fn() -> u32 + Send + Sync> = Registry::new();
        registry.register("seven", Arc::new(|| 7));
        let f = registry.fetch("seven").unwrap();
        assert_eq!(f(), 7);
    }

    #[test]
    fn test_concurrent_registration_single_winner() {
        let registry: Arc<Registry<usize>> = Arc::new(Registry::with_buckets(2));
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.get_or_register_with("shared", || Arc::new(i))
                })
            })
            .collect();

        let winners: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first = &winners[0];
        assert!(winners.iter().all(|w| Arc::ptr_eq(w, first)));
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.fetch("shared").unwrap(), first));
    }

    #[test]
    fn test_contended_registration_many_keys() {
        let registry: Arc<Registry<usize>> = Arc::new(Registry::with_buckets(4));
        let threads = 16;
        let keys = 200;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut seen: Vec<Option<Arc<usize>>> = vec![None; keys];
                    // Each thread walks the keys from a different offset.
                    for step in 0..keys {
                        let k = (step + t * 13) % keys;
                        let value = registry.get_or_register_with(format!("k{k}"), || Arc::new(t));
                        if let Some(fetched) = registry.fetch(&format!("k{k}")) {
                            assert!(Arc::ptr_eq(&fetched, &value));
                        }
                        seen[k] = Some(value);
                    }
                    seen
                })
            })
            .collect();

        let results: Vec<Vec<Option<Arc<usize>>>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(registry.len(), keys);
        for k in 0..keys {
            let live = registry.fetch(&format!("k{k}")).unwrap();
            for seen in &results {
                assert!(Arc::ptr_eq(seen[k].as_ref().unwrap(), &live));
            }
        }
    }
}
