//! The four lifecycle hooks a [`Cache`](crate::Cache) can be configured with.
//!
//! Each slot is an independent, optional `Fn` trait object — no subclassing, no single
//! "event" enum to match on. All four run with the cache's lock held (see the crate-level
//! docs for the reentrancy rule this implies).

/// `(key, value)` — a new key was inserted by `set`/`set_with_ttl`.
pub(crate) type NewItemFn<V> = Box<dyn Fn(&str, &V) + Send + 'static>;

/// `(key, value)` — a key was removed: explicit `remove`, overwritten by `set`, or evicted.
/// Not called by `purge`.
pub(crate) type RemoveFn<V> = Box<dyn Fn(&str, &V) + Send + 'static>;

/// `(key, value)` — a key was evicted by the expiration loop, after `CheckExpirationFn`
/// approved it.
pub(crate) type ExpirationFn<V> = Box<dyn Fn(&str, &V) + Send + 'static>;

/// `(key, value) -> bool` — the expiration loop is about to evict this candidate.
/// `true` lets the eviction proceed; `false` extends the item's TTL as if just touched and
/// skips it for this wake cycle.
pub(crate) type CheckExpirationFn<V> = Box<dyn Fn(&str, &V) -> bool + Send + 'static>;

#[derive(Default)]
pub(crate) struct Callbacks<V> {
    pub(crate) on_new_item: Option<NewItemFn<V>>,
    pub(crate) on_remove: Option<RemoveFn<V>>,
    pub(crate) on_expiration: Option<ExpirationFn<V>>,
    pub(crate) on_check_expiration: Option<CheckExpirationFn<V>>,
}

impl<V> Callbacks<V> {
    pub(crate) fn new() -> Self {
        Callbacks {
            on_new_item: None,
            on_remove: None,
            on_expiration: None,
            on_check_expiration: None,
        }
    }

    pub(crate) fn fire_new_item(&self, key: &str, value: &V) {
        if let Some(f) = &self.on_new_item {
            f(key, value);
        }
    }

    pub(crate) fn fire_remove(&self, key: &str, value: &V) {
        if let Some(f) = &self.on_remove {
            f(key, value);
        }
    }

    pub(crate) fn fire_expiration(&self, key: &str, value: &V) {
        if let Some(f) = &self.on_expiration {
            f(key, value);
        }
    }

    /// Returns `true` (evict) when no callback is installed — the default policy is to
    /// evict every expired candidate.
    pub(crate) fn check_expiration(&self, key: &str, value: &V) -> bool {
        match &self.on_check_expiration {
            Some(f) => f(key, value),
            None => true,
        }
    }
}
