//! Error taxonomy for the cache's public API.
//!
//! Most operations (`get`, `set`, `remove`, …) report failure through sentinel results —
//! `None`, `false`, a silent no-op — exactly as specified for `NotFound` and `Closed`.
//! [`CacheError`] exists only for [`Cache::get_or_default`](crate::Cache::get_or_default),
//! the one operation with an error channel to put `Closed` and the loader's own failure on.

/// Error surfaced by [`Cache::get_or_default`](crate::Cache::get_or_default).
///
/// Generic over `E`, the loader's error type, so callers that never fail don't pay for a
/// type parameter their loader doesn't need.
#[derive(thiserror::Error, Debug)]
pub enum CacheError<E> {
    /// The cache was already closed; the loader was not invoked.
    #[error("cache is closed")]
    Closed,
    /// The caller-supplied loader failed. Not cached.
    #[error("loader failed: {0}")]
    Loader(#[source] E),
}

impl<E> CacheError<E> {
    pub(crate) fn loader(err: E) -> Self {
        CacheError::Loader(err)
    }
}
