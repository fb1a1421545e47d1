//! Namespaced key-value store with per-key expiry.
//!
//! Handshake slots and sessions live here and nowhere else; the handshake keeps
//! no cached copy of any value between calls. Every state transition on a slot
//! goes through [`TokenStore::compare_and_set`] or
//! [`TokenStore::compare_and_delete`], so implementations must execute those
//! two primitives atomically with respect to every other operation on the same
//! key. A plain `get` followed by a `set_with_ttl` is not a substitute.
//!
//! Keys are already namespaced by the caller (`register:<id>`, `session:<id>`);
//! the store treats them as opaque strings. A key that expired and a key that
//! was never written are indistinguishable. Expired keys are reclaimed by
//! [`TokenStore::purge_expired`], which the server runs periodically through
//! [`spawn_purge_worker`].

mod memory;
mod postgres;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryTokenStore;
pub use postgres::PgTokenStore;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, error};

/// Upper bound applied to every TTL so expiry arithmetic cannot overflow.
pub(crate) const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("token store unavailable: {0}")]
    Unavailable(String),
    #[error("token store query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of [`TokenStore::compare_and_set`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CasOutcome {
    /// The current value matched and was replaced.
    Applied,
    /// The key is live but holds a different value.
    Mismatch,
    /// The key is absent or expired.
    NotFound,
}

/// Result of [`TokenStore::compare_and_delete`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CadOutcome {
    /// The current value matched and the key is gone; carries the removed value.
    Deleted(String),
    Mismatch,
    NotFound,
}

/// Expiring key-value store with atomic conditional primitives.
///
/// TTLs are in seconds. A TTL of zero means the write is immediately expired.
pub trait TokenStore: Send + Sync {
    /// Return the live value for `key`, if any.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    /// Unconditionally write `value` and (re)start its TTL.
    fn set_with_ttl<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl_seconds: u64,
    ) -> StoreFuture<'a, ()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

    /// Atomically replace the value of `key` with `value` only if it currently equals `expected`.
    fn compare_and_set<'a>(
        &'a self,
        key: &'a str,
        expected: &'a str,
        value: &'a str,
        ttl_seconds: u64,
    ) -> StoreFuture<'a, CasOutcome>;

    /// Atomically remove `key` only if its value currently equals `expected`.
    fn compare_and_delete<'a>(
        &'a self,
        key: &'a str,
        expected: &'a str,
    ) -> StoreFuture<'a, CadOutcome>;

    /// Physically remove every expired key and return how many were removed.
    fn purge_expired(&self) -> StoreFuture<'_, u64>;

    /// Check that the backing store is reachable.
    fn ping(&self) -> StoreFuture<'_, ()>;
}

/// Periodically purge expired keys so abandoned slots and sessions do not
/// accumulate.
pub fn spawn_purge_worker(store: Arc<dyn TokenStore>, interval: Duration) -> JoinHandle<()> {
    let interval = if interval.is_zero() {
        Duration::from_secs(1)
    } else {
        interval
    };

    tokio::spawn(async move {
        loop {
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!("purged {purged} expired tokens"),
                Err(err) => error!("token purge failed: {err}"),
            }

            sleep(interval).await;
        }
    })
}

pub(crate) fn clamp_ttl(ttl_seconds: u64) -> u64 {
    ttl_seconds.min(MAX_TTL_SECONDS)
}
