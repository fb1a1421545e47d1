//! In-process token store.
//!
//! Suitable for a single node and for tests. Expiry is evaluated against
//! `tokio::time::Instant`, so a paused tokio clock drives TTLs deterministically.
//! Reads skip expired entries; `purge_expired` frees the ones nobody reads again.

use std::{collections::HashMap, time::Duration};
use tokio::{sync::Mutex, time::Instant};

use super::{clamp_ttl, CadOutcome, CasOutcome, StoreFuture, TokenStore};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local [`TokenStore`]; one mutex serializes every operation.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.is_live(now));
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Drop `key` if it has expired, then hand back the live entry if one remains.
fn live_entry<'m>(
    entries: &'m mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'m mut Entry> {
    if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn expiry(now: Instant, ttl_seconds: u64) -> Instant {
    now + Duration::from_secs(clamp_ttl(ttl_seconds))
}

impl TokenStore for MemoryTokenStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            Ok(live_entry(&mut entries, key, Instant::now()).map(|entry| entry.value.clone()))
        })
    }

    fn set_with_ttl<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl_seconds: u64,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            if ttl_seconds == 0 {
                entries.remove(key);
                return Ok(());
            }
            let now = Instant::now();
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: expiry(now, ttl_seconds),
                },
            );
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.entries.lock().await.remove(key);
            Ok(())
        })
    }

    fn compare_and_set<'a>(
        &'a self,
        key: &'a str,
        expected: &'a str,
        value: &'a str,
        ttl_seconds: u64,
    ) -> StoreFuture<'a, CasOutcome> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            let now = Instant::now();
            let Some(entry) = live_entry(&mut entries, key, now) else {
                return Ok(CasOutcome::NotFound);
            };
            if entry.value != expected {
                return Ok(CasOutcome::Mismatch);
            }
            if ttl_seconds == 0 {
                entries.remove(key);
            } else {
                entry.value = value.to_string();
                entry.expires_at = expiry(now, ttl_seconds);
            }
            Ok(CasOutcome::Applied)
        })
    }

    fn compare_and_delete<'a>(
        &'a self,
        key: &'a str,
        expected: &'a str,
    ) -> StoreFuture<'a, CadOutcome> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            let Some(entry) = live_entry(&mut entries, key, Instant::now()) else {
                return Ok(CadOutcome::NotFound);
            };
            if entry.value != expected {
                return Ok(CadOutcome::Mismatch);
            }
            Ok(entries
                .remove(key)
                .map_or(CadOutcome::NotFound, |entry| CadOutcome::Deleted(entry.value)))
        })
    }

    fn purge_expired(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let now = Instant::now();
            let mut entries = self.entries.lock().await;
            let before = entries.len();
            entries.retain(|_, entry| entry.is_live(now));
            Ok(u64::try_from(before - entries.len()).unwrap_or(u64::MAX))
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::sync::Arc;

    #[tokio::test]
    async fn get_returns_written_value() -> Result<(), StoreError> {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get("register:a").await?, None);

        store.set_with_ttl("register:a", "pending", 60).await?;
        assert_eq!(store.get("register:a").await?.as_deref(), Some("pending"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn values_expire_after_ttl() -> Result<(), StoreError> {
        let store = MemoryTokenStore::new();
        store.set_with_ttl("restore:a", "pending", 10).await?;

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.get("restore:a").await?.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("restore:a").await?, None);
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn purge_frees_abandoned_entries() -> Result<(), StoreError> {
        let store = MemoryTokenStore::new();
        for n in 0..1000 {
            store
                .set_with_ttl(&format!("register:{n}"), "pending", 600)
                .await?;
        }
        tokio::time::advance(Duration::from_secs(601)).await;
        for n in 0..10 {
            store
                .set_with_ttl(&format!("restore:{n}"), "pending", 600)
                .await?;
        }

        assert_eq!(store.purge_expired().await?, 1000);
        assert_eq!(store.purge_expired().await?, 0);
        assert_eq!(store.len().await, 10);
        Ok(())
    }

    #[tokio::test]
    async fn zero_ttl_is_never_observable() -> Result<(), StoreError> {
        let store = MemoryTokenStore::new();
        store.set_with_ttl("reset:a", "pending", 0).await?;
        assert_eq!(store.get("reset:a").await?, None);
        assert_eq!(
            store.compare_and_set("reset:a", "pending", "x", 60).await?,
            CasOutcome::NotFound
        );
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> Result<(), StoreError> {
        let store = MemoryTokenStore::new();
        store.set_with_ttl("k", "v", 60).await?;
        store.delete("k").await?;
        store.delete("k").await?;
        assert_eq!(store.get("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn compare_and_set_reports_each_outcome() -> Result<(), StoreError> {
        let store = MemoryTokenStore::new();
        assert_eq!(
            store.compare_and_set("k", "pending", "cred", 60).await?,
            CasOutcome::NotFound
        );

        store.set_with_ttl("k", "pending", 60).await?;
        assert_eq!(
            store.compare_and_set("k", "other", "cred", 60).await?,
            CasOutcome::Mismatch
        );
        assert_eq!(
            store.compare_and_set("k", "pending", "cred", 60).await?,
            CasOutcome::Applied
        );
        assert_eq!(store.get("k").await?.as_deref(), Some("cred"));
        assert_eq!(
            store.compare_and_set("k", "pending", "cred2", 60).await?,
            CasOutcome::Mismatch
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn compare_and_set_restarts_ttl() -> Result<(), StoreError> {
        let store = MemoryTokenStore::new();
        store.set_with_ttl("k", "pending", 10).await?;
        tokio::time::advance(Duration::from_secs(8)).await;
        store.compare_and_set("k", "pending", "cred", 10).await?;

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(store.get("k").await?.as_deref(), Some("cred"));
        Ok(())
    }

    #[tokio::test]
    async fn compare_and_delete_reports_each_outcome() -> Result<(), StoreError> {
        let store = MemoryTokenStore::new();
        assert_eq!(
            store.compare_and_delete("k", "cred").await?,
            CadOutcome::NotFound
        );

        store.set_with_ttl("k", "cred", 60).await?;
        assert_eq!(
            store.compare_and_delete("k", "pending").await?,
            CadOutcome::Mismatch
        );
        assert_eq!(
            store.compare_and_delete("k", "cred").await?,
            CadOutcome::Deleted("cred".to_string())
        );
        assert_eq!(
            store.compare_and_delete("k", "cred").await?,
            CadOutcome::NotFound
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_compare_and_delete_has_one_winner() -> Result<(), StoreError> {
        let store = Arc::new(MemoryTokenStore::new());
        store.set_with_ttl("k", "cred", 60).await?;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.compare_and_delete("k", "cred").await
            }));
        }

        let mut deleted = 0;
        for handle in handles {
            let outcome = handle
                .await
                .map_err(|err| StoreError::Unavailable(err.to_string()))??;
            if matches!(outcome, CadOutcome::Deleted(_)) {
                deleted += 1;
            }
        }
        assert_eq!(deleted, 1);
        Ok(())
    }
}
