//! A thread-safe, in-process key-value cache with per-item TTL expiration.
//!
//! The cache keeps two structures in lockstep behind a single [`parking_lot::Mutex`]: a
//! [`HashMap`](std::collections::HashMap) index from key to storage slot, and a binary
//! min-heap ordering live slots by their expiration deadline. A dedicated background thread
//! sleeps until the earliest deadline, wakes, evicts whatever is due under the lock, and
//! goes back to sleep — see [`worker`] for the state machine and [`cache::Inner::evict_due`]
//! for the eviction policy.
//!
//! # Callbacks and reentrancy
//!
//! [`Cache`] supports four optional lifecycle callbacks (new-item, remove, expiration,
//! check-expiration), installed via [`CacheBuilder`] or the `Cache::set_*_callback` setters.
//! All four run with the cache's internal lock held, so a callback that calls back into the
//! *same* cache will deadlock. This is a programmer error the type system cannot catch;
//! callbacks should only touch state external to the cache (counters, channels, other
//! caches).
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use ttlcache::Cache;
//!
//! let cache = Cache::builder().global_ttl(Duration::from_secs(30)).build();
//! cache.set("session:42", "alice".to_string());
//! assert_eq!(cache.get("session:42"), Some("alice".to_string()));
//! cache.close();
//! ```

mod builder;
mod cache;
mod callbacks;
pub mod error;
mod heap;
mod item;
mod slab;
mod worker;

pub use builder::CacheBuilder;
pub use cache::Cache;
pub use error::CacheError;
