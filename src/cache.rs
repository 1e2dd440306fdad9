//! [`Cache`]: the public surface, the single lock discipline, and the state it protects.
//!
//! Every mutating operation and the expiration loop's eviction phase acquire
//! [`SharedState::inner`] before touching [`Index`] or [`ExpirationHeap`]; callbacks run with
//! that lock held (see the crate root docs for why, and for the reentrancy hazard this
//! implies).

use std::collections::HashMap;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::callbacks::Callbacks;
use crate::error::CacheError;
use crate::heap::ExpirationHeap;
use crate::item::Item;
use crate::slab::Slab;

/// Key to slab-handle mapping. Every live key has an entry here, whether or not the item
/// currently holds a slot in the expiration heap.
pub(crate) type Index = HashMap<String, usize>;

pub(crate) struct Inner<V> {
    pub(crate) slab: Slab<V>,
    pub(crate) index: Index,
    pub(crate) heap: ExpirationHeap,
    pub(crate) global_ttl: Duration,
    pub(crate) skip_extension_on_hit: bool,
    pub(crate) is_closed: bool,
    pub(crate) callbacks: Callbacks<V>,
}

impl<V> Inner<V> {
    /// Recomputes `handle`'s `expire_at` from its (possibly just-changed) `ttl` against the
    /// current global TTL, then repositions it in the heap — pushing, removing, or
    /// re-sifting as the old and new heap membership require.
    fn touch(&mut self, handle: usize) {
        let old_index = self.slab.get(handle).heap_index;
        let new_deadline = self
            .slab
            .get(handle)
            .effective_ttl(self.global_ttl)
            .map(|ttl| Instant::now() + ttl);
        self.slab.get_mut(handle).expire_at = new_deadline;
        self.reposition(handle, old_index, new_deadline.is_some());
    }

    /// Applies an explicit `expire_at` (used by `set_with_ttl`, where a zero TTL means
    /// "never", bypassing `effective_ttl`'s global-TTL fallback) and repositions the item.
    fn set_deadline(&mut self, handle: usize, expire_at: Option<Instant>) {
        let old_index = self.slab.get(handle).heap_index;
        self.slab.get_mut(handle).expire_at = expire_at;
        self.reposition(handle, old_index, expire_at.is_some());
    }

    fn reposition(&mut self, handle: usize, old_heap_index: Option<usize>, now_scheduled: bool) {
        match (old_heap_index, now_scheduled) {
            (None, false) => {}
            (None, true) => self.heap.push(&mut self.slab, handle),
            (Some(pos), false) => self.heap.remove_at(&mut self.slab, pos),
            (Some(pos), true) => self.heap.update_at(&mut self.slab, pos),
        }
    }

    /// Evicts (or extends) every candidate whose deadline has passed, in earliest-first
    /// order, stopping as soon as the root is no longer due. Mirrors §4.3's eviction policy.
    pub(crate) fn evict_due(&mut self) {
        loop {
            match self.heap.peek_deadline(&self.slab) {
                Some(deadline) if deadline <= Instant::now() => {}
                _ => break,
            }
            let handle = self.heap.pop(&mut self.slab).expect("heap had a root a moment ago");
            let evict = {
                let item = self.slab.get(handle);
                self.callbacks.check_expiration(&item.key, &item.value)
            };
            if evict {
                let item = self.slab.remove(handle);
                self.index.remove(&item.key);
                self.callbacks.fire_expiration(&item.key, &item.value);
                self.callbacks.fire_remove(&item.key, &item.value);
                tracing::trace!(key = %item.key, "evicted expired item");
            } else {
                tracing::trace!(key = %self.slab.get(handle).key, "check_expiration refused eviction, extending");
                self.touch(handle);
            }
        }
    }
}

pub(crate) struct SharedState<V> {
    pub(crate) inner: Mutex<Inner<V>>,
    pub(crate) wake: Condvar,
}

/// A thread-safe, in-process key-value cache with per-item TTL expiration.
///
/// Construct one with [`Cache::new`] for the defaults (no TTL, extension-on-hit enabled, no
/// callbacks) or [`Cache::builder`] to configure TTL policy and callbacks up front. The
/// cache is not [`Clone`]; share it across threads the normal way, behind an [`std::sync::Arc`]
/// if ownership must be split, or simply behind a shared `&Cache`.
pub struct Cache<V> {
    pub(crate) shared: std::sync::Arc<SharedState<V>>,
    pub(crate) worker: Mutex<Option<JoinHandle<()>>>,
}

impl<V> Cache<V>
where
    V: Send + 'static,
{
    /// A cache with no TTL, extension-on-hit enabled, and no callbacks installed.
    pub fn new() -> Self {
        crate::builder::CacheBuilder::new().build()
    }

    /// Starts building a cache with non-default TTL policy and/or callbacks.
    pub fn builder() -> crate::builder::CacheBuilder<V> {
        crate::builder::CacheBuilder::new()
    }
}

impl<V> Cache<V> {
    /// Inserts or overwrites `key`. If `key` was already present, its prior value is handed
    /// to the remove callback before being replaced, and its existing per-item TTL (if any,
    /// from an earlier `set_with_ttl`) is preserved. No-op if the cache is closed.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let mut guard = self.shared.inner.lock();
        if guard.is_closed {
            return;
        }
        let key = key.into();
        if let Some(&handle) = guard.index.get(&key) {
            guard.callbacks.fire_remove(&key, &guard.slab.get(handle).value);
            guard.slab.get_mut(handle).value = value;
            guard.touch(handle);
        } else {
            let deadline = guard.global_ttl;
            let expire_at = (!deadline.is_zero()).then(|| Instant::now() + deadline);
            let item = Item::new(key.clone(), value, Duration::ZERO, expire_at);
            let handle = guard.slab.insert(item);
            guard.index.insert(key.clone(), handle);
            if expire_at.is_some() {
                let inner = &mut *guard;
                inner.heap.push(&mut inner.slab, handle);
            }
            guard.callbacks.fire_new_item(&key, &guard.slab.get(handle).value);
        }
        drop(guard);
        self.shared.wake.notify_one();
    }

    /// Like [`Cache::set`], but records a per-item TTL. `ttl == Duration::ZERO` makes the
    /// item non-expiring regardless of the cache's global TTL.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut guard = self.shared.inner.lock();
        if guard.is_closed {
            return;
        }
        let key = key.into();
        let expire_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        if let Some(&handle) = guard.index.get(&key) {
            guard.callbacks.fire_remove(&key, &guard.slab.get(handle).value);
            guard.slab.get_mut(handle).value = value;
            guard.slab.get_mut(handle).ttl = ttl;
            guard.set_deadline(handle, expire_at);
        } else {
            let item = Item::new(key.clone(), value, ttl, expire_at);
            let handle = guard.slab.insert(item);
            guard.index.insert(key.clone(), handle);
            if expire_at.is_some() {
                let inner = &mut *guard;
                inner.heap.push(&mut inner.slab, handle);
            }
            guard.callbacks.fire_new_item(&key, &guard.slab.get(handle).value);
        }
        drop(guard);
        self.shared.wake.notify_one();
    }

    /// Removes `key`, firing the remove callback if it was present. Returns whether it was
    /// present. No-op (returns `false`) if the cache is closed.
    pub fn remove(&self, key: &str) -> bool {
        let mut guard = self.shared.inner.lock();
        if guard.is_closed {
            return false;
        }
        let handle = match guard.index.remove(key) {
            Some(h) => h,
            None => return false,
        };
        if let Some(pos) = guard.slab.get(handle).heap_index {
            let inner = &mut *guard;
            inner.heap.remove_at(&mut inner.slab, pos);
        }
        let item = guard.slab.remove(handle);
        guard.callbacks.fire_remove(&item.key, &item.value);
        drop(guard);
        self.shared.wake.notify_one();
        true
    }

    /// Drops every entry with no callbacks fired.
    pub fn purge(&self) {
        let mut guard = self.shared.inner.lock();
        guard.index.clear();
        guard.slab.clear();
        guard.heap.clear();
        drop(guard);
        self.shared.wake.notify_one();
    }

    /// Number of live entries, expired-but-not-yet-evicted ones included.
    pub fn count(&self) -> usize {
        self.shared.inner.lock().index.len()
    }

    /// Sets the cache-wide TTL used by items with no per-item TTL of their own (`ttl ==
    /// Duration::ZERO`). Does not retroactively rewrite already-scheduled deadlines; see the
    /// crate root docs for why.
    pub fn set_ttl(&self, ttl: Duration) {
        let mut guard = self.shared.inner.lock();
        guard.global_ttl = ttl;
        drop(guard);
        self.shared.wake.notify_one();
    }

    /// When `true`, `get` stops refreshing an item's deadline on every hit.
    pub fn skip_ttl_extension_on_hit(&self, skip: bool) {
        self.shared.inner.lock().skip_extension_on_hit = skip;
    }

    /// Replaces the new-item callback. `None` clears it.
    pub fn set_new_item_callback(
        &self,
        callback: Option<Box<dyn Fn(&str, &V) + Send + 'static>>,
    ) {
        self.shared.inner.lock().callbacks.on_new_item = callback;
    }

    /// Replaces the remove callback. `None` clears it.
    pub fn set_remove_callback(&self, callback: Option<Box<dyn Fn(&str, &V) + Send + 'static>>) {
        self.shared.inner.lock().callbacks.on_remove = callback;
    }

    /// Replaces the expiration callback. `None` clears it.
    pub fn set_expiration_callback(
        &self,
        callback: Option<Box<dyn Fn(&str, &V) + Send + 'static>>,
    ) {
        self.shared.inner.lock().callbacks.on_expiration = callback;
    }

    /// Replaces the check-expiration callback. `None` clears it, which means "evict every
    /// expired candidate unconditionally" (the default).
    pub fn set_check_expiration_callback(
        &self,
        callback: Option<Box<dyn Fn(&str, &V) -> bool + Send + 'static>>,
    ) {
        self.shared.inner.lock().callbacks.on_check_expiration = callback;
    }

    /// Marks the cache closed, wakes the expiration thread, and joins it. Idempotent: a
    /// second call observes the cache already closed and returns immediately without
    /// re-signaling or attempting to join again.
    pub fn close(&self) {
        {
            let mut guard = self.shared.inner.lock();
            if guard.is_closed {
                return;
            }
            guard.is_closed = true;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.worker.lock().take() {
            tracing::debug!("closing cache, joining expiration thread");
            let _ = handle.join();
        }
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + 'static,
{
    /// Looks up `key`. Returns `None` if absent, closed, or expired-but-not-yet-evicted.
    /// Unless `skip_ttl_extension_on_hit(true)` was set, a hit refreshes the item's deadline
    /// to `now + effective_ttl`.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.shared.inner.lock();
        if guard.is_closed {
            return None;
        }
        let &handle = guard.index.get(key)?;
        let now = Instant::now();
        if matches!(guard.slab.get(handle).expire_at, Some(e) if e <= now) {
            return None;
        }
        if !guard.skip_extension_on_hit {
            guard.touch(handle);
        }
        let value = guard.slab.get(handle).value.clone();
        drop(guard);
        self.shared.wake.notify_one();
        Some(value)
    }

    /// Returns the cached value for `key`, or calls `loader(key)` to produce and store one.
    ///
    /// `loader` runs outside the lock. On success its value is stored exactly as `set`
    /// would. On failure the error is returned verbatim and nothing is cached. Returns
    /// [`CacheError::Closed`] without invoking the loader if the cache was already closed.
    pub fn get_or_default<F, E>(&self, key: &str, loader: F) -> Result<V, CacheError<E>>
    where
        F: FnOnce(&str) -> Result<V, E>,
    {
        {
            let mut guard = self.shared.inner.lock();
            if guard.is_closed {
                return Err(CacheError::Closed);
            }
            if let Some(&handle) = guard.index.get(key) {
                let now = Instant::now();
                let expired = matches!(guard.slab.get(handle).expire_at, Some(e) if e <= now);
                if !expired {
                    if !guard.skip_extension_on_hit {
                        guard.touch(handle);
                    }
                    let value = guard.slab.get(handle).value.clone();
                    drop(guard);
                    self.shared.wake.notify_one();
                    return Ok(value);
                }
            }
        }
        let value = loader(key).map_err(CacheError::loader)?;
        self.set(key.to_string(), value.clone());
        Ok(value)
    }
}

impl<V> Default for Cache<V>
where
    V: Send + 'static,
{
    fn default() -> Self {
        Cache::new()
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        // `close` only needs `&self`; reuse it so an un-closed cache going out of scope
        // never leaks its expiration thread.
        Cache::close(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread::sleep;

    #[test]
    fn set_then_get_round_trips() {
        let cache: Cache<String> = Cache::new();
        cache.set("k", "v".to_string());
        assert_eq!(cache.get("k"), Some("v".to_string()));
        cache.close();
    }

    #[test]
    fn overwrite_fires_remove_and_new_item_once_each() {
        let new_items = Arc::new(AtomicUsize::new(0));
        let removes = Arc::new(AtomicUsize::new(0));
        let cache: Cache<String> = Cache::new();
        {
            let n = new_items.clone();
            cache.set_new_item_callback(Some(Box::new(move |_, _| {
                n.fetch_add(1, Ordering::SeqCst);
            })));
        }
        {
            let r = removes.clone();
            cache.set_remove_callback(Some(Box::new(move |_, _| {
                r.fetch_add(1, Ordering::SeqCst);
            })));
        }

        cache.set("k", "v1".to_string());
        cache.set("k", "v2".to_string());
        assert_eq!(cache.get("k"), Some("v2".to_string()));
        assert_eq!(new_items.load(Ordering::SeqCst), 1);
        assert_eq!(removes.load(Ordering::SeqCst), 1);
        cache.close();
    }

    #[test]
    fn remove_returns_whether_present() {
        let cache: Cache<String> = Cache::new();
        assert!(!cache.remove("missing"));
        cache.set("k", "v".to_string());
        assert!(cache.remove("k"));
        assert!(!cache.remove("k"));
        cache.close();
    }

    #[test]
    fn purge_clears_without_callbacks() {
        let fired = Arc::new(AtomicUsize::new(0));
        let cache: Cache<String> = Cache::new();
        let f = fired.clone();
        cache.set_remove_callback(Some(Box::new(move |_, _| {
            f.fetch_add(1, Ordering::SeqCst);
        })));
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.purge();
        assert_eq!(cache.count(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        cache.close();
    }

    #[test]
    fn close_is_idempotent() {
        let cache: Cache<String> = Cache::new();
        cache.close();
        cache.close();
        cache.close();
    }

    #[test]
    fn global_expiration_evicts_everything() {
        let cache: Cache<String> = Cache::new();
        cache.set_ttl(Duration::from_millis(100));
        cache.set("key_1", "v".to_string());
        cache.set("key_2", "v".to_string());
        sleep(Duration::from_millis(200));
        assert_eq!(cache.count(), 0);
        cache.close();
    }

    #[test]
    fn per_entry_ttl_overrides_shorter_global_ttl() {
        let cache: Cache<String> = Cache::new();
        cache.set_ttl(Duration::from_millis(50));
        cache.set_with_ttl("key", "v".to_string(), Duration::from_millis(100));
        sleep(Duration::from_millis(150));
        assert_eq!(cache.get("key"), None);
    }

    #[test]
    fn set_ttl_does_not_retroactively_stamp_existing_items() {
        let cache: Cache<String> = Cache::new();
        cache.set("key_1", "v".to_string());
        cache.set_ttl(Duration::from_millis(100));
        cache.set("key_2", "v".to_string());
        sleep(Duration::from_millis(150));
        assert_eq!(cache.count(), 1);
        cache.close();
    }

    #[test]
    fn check_expiration_refusal_does_not_halt_subsequent_evictions() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let cache: Cache<String> = Cache::new();
        cache.skip_ttl_extension_on_hit(true);
        cache.set_ttl(Duration::from_millis(50));
        cache.set_check_expiration_callback(Some(Box::new(|key, _| {
            key == "key2" || key == "key4"
        })));
        {
            let e = evicted.clone();
            cache.set_expiration_callback(Some(Box::new(move |key, _| {
                e.lock().push(key.to_string());
            })));
        }
        cache.set("key", "v".to_string());
        cache.set("key3", "v".to_string());
        cache.set("key2", "v".to_string());
        cache.set("key4", "v".to_string());
        sleep(Duration::from_millis(110));
        let seen = evicted.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&"key2".to_string()));
        assert!(seen.contains(&"key4".to_string()));
        drop(seen);
        cache.close();
    }

    #[test]
    fn remove_overwrite_and_expiration_each_fire_remove_callback() {
        let removes = Arc::new(AtomicUsize::new(0));
        let cache: Cache<String> = Cache::new();
        let r = removes.clone();
        cache.set_remove_callback(Some(Box::new(move |_, _| {
            r.fetch_add(1, Ordering::SeqCst);
        })));

        cache.set("k", "v".to_string());
        cache.remove("k");
        cache.set("k", "v".to_string());
        cache.set("k", "v2".to_string());
        cache.set_with_ttl("k2", "v".to_string(), Duration::from_millis(60));
        sleep(Duration::from_millis(150));

        assert_eq!(removes.load(Ordering::SeqCst), 3);
        cache.close();
    }

    #[test]
    fn get_or_default_loads_stores_and_propagates_errors() {
        let cache: Cache<String> = Cache::new();
        let loads = Arc::new(AtomicUsize::new(0));

        let l = loads.clone();
        let result = cache.get_or_default("hello", |_| {
            l.fetch_add(1, Ordering::SeqCst);
            Ok::<_, &'static str>("value".to_string())
        });
        assert_eq!(result.unwrap(), "value");
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        cache.set("hello", "world".to_string());
        let result = cache.get_or_default("hello", |_| {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, &'static str>("value".to_string())
        });
        assert_eq!(result.unwrap(), "world");
        assert_eq!(loads.load(Ordering::SeqCst), 1, "cache hit must not call loader");

        cache.remove("hello");
        let result = cache.get_or_default("hello", |_| Err("boom"));
        assert!(matches!(result, Err(CacheError::Loader("boom"))));
        assert_eq!(cache.count(), 0);
        cache.close();
    }

    #[test]
    fn get_or_default_after_close_returns_closed_without_loading() {
        let cache: Cache<String> = Cache::new();
        cache.close();
        let result = cache.get_or_default("k", |_| Ok::<_, &'static str>("v".to_string()));
        assert!(matches!(result, Err(CacheError::Closed)));
    }

    #[test]
    fn operations_after_close_are_silent_no_ops() {
        let cache: Cache<String> = Cache::new();
        cache.set("k", "v".to_string());
        cache.close();
        cache.set("k2", "v2".to_string());
        assert_eq!(cache.get("k"), None);
        assert!(!cache.remove("k"));
        assert_eq!(cache.count(), 1, "count still reflects pre-close state");
    }
}
