//! Fluent construction, mirroring the builder idiom this crate's sibling stores use for
//! their own out-of-process setup: assemble policy and callbacks first, then `build()` hands
//! back a fully wired, already-running [`Cache`].

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::cache::{Cache, Inner, SharedState};
use crate::callbacks::Callbacks;
use crate::heap::ExpirationHeap;
use crate::slab::Slab;

/// Builds a [`Cache`] with a chosen global TTL, hit policy, and callbacks installed before
/// the expiration thread is spawned.
pub struct CacheBuilder<V> {
    global_ttl: Duration,
    skip_extension_on_hit: bool,
    callbacks: Callbacks<V>,
}

impl<V> CacheBuilder<V> {
    pub(crate) fn new() -> Self {
        CacheBuilder {
            global_ttl: Duration::ZERO,
            skip_extension_on_hit: false,
            callbacks: Callbacks::new(),
        }
    }

    /// Cache-wide TTL for items with no per-item TTL of their own. Zero means no expiration.
    pub fn global_ttl(mut self, ttl: Duration) -> Self {
        self.global_ttl = ttl;
        self
    }

    /// When `true`, a `get` hit does not refresh the item's deadline. Default `false`.
    pub fn skip_extension_on_hit(mut self, skip: bool) -> Self {
        self.skip_extension_on_hit = skip;
        self
    }

    /// Installs the new-item callback.
    pub fn on_new_item(mut self, f: impl Fn(&str, &V) + Send + 'static) -> Self {
        self.callbacks.on_new_item = Some(Box::new(f));
        self
    }

    /// Installs the remove callback.
    pub fn on_remove(mut self, f: impl Fn(&str, &V) + Send + 'static) -> Self {
        self.callbacks.on_remove = Some(Box::new(f));
        self
    }

    /// Installs the expiration callback.
    pub fn on_expiration(mut self, f: impl Fn(&str, &V) + Send + 'static) -> Self {
        self.callbacks.on_expiration = Some(Box::new(f));
        self
    }

    /// Installs the check-expiration callback.
    pub fn on_check_expiration(mut self, f: impl Fn(&str, &V) -> bool + Send + 'static) -> Self {
        self.callbacks.on_check_expiration = Some(Box::new(f));
        self
    }
}

impl<V> CacheBuilder<V>
where
    V: Send + 'static,
{
    /// Assembles the cache and spawns its expiration thread.
    pub fn build(self) -> Cache<V> {
        let inner = Inner {
            slab: Slab::new(),
            index: HashMap::new(),
            heap: ExpirationHeap::new(),
            global_ttl: self.global_ttl,
            skip_extension_on_hit: self.skip_extension_on_hit,
            is_closed: false,
            callbacks: self.callbacks,
        };
        let shared = Arc::new(SharedState {
            inner: Mutex::new(inner),
            wake: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("ttlcache-expiration".into())
            .spawn(move || crate::worker::run(worker_shared))
            .expect("failed to spawn expiration thread");

        Cache {
            shared,
            worker: Mutex::new(Some(handle)),
        }
    }
}
