//! Store doubles for tests.

use super::{CadOutcome, CasOutcome, StoreError, StoreFuture, TokenStore};

/// Store whose every operation fails, as if the backend were unreachable.
pub(crate) struct UnavailableStore;

fn down<'a, T: Send + 'a>() -> StoreFuture<'a, T> {
    Box::pin(async { Err(StoreError::Unavailable("connection refused".to_string())) })
}

impl TokenStore for UnavailableStore {
    fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<String>> {
        down()
    }

    fn set_with_ttl<'a>(&'a self, _key: &'a str, _value: &'a str, _ttl: u64) -> StoreFuture<'a, ()> {
        down()
    }

    fn delete<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, ()> {
        down()
    }

    fn compare_and_set<'a>(
        &'a self,
        _key: &'a str,
        _expected: &'a str,
        _value: &'a str,
        _ttl: u64,
    ) -> StoreFuture<'a, CasOutcome> {
        down()
    }

    fn compare_and_delete<'a>(
        &'a self,
        _key: &'a str,
        _expected: &'a str,
    ) -> StoreFuture<'a, CadOutcome> {
        down()
    }

    fn purge_expired(&self) -> StoreFuture<'_, u64> {
        down()
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        down()
    }
}
