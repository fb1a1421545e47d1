//! Session minting.
//!
//! A session is written once, under a freshly drawn 256-bit id, so an
//! unconditional write is enough here. Its TTL is independent of the ephemeral
//! slot it was exchanged for.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{error::HandshakeError, utils::random_token};
use crate::store::TokenStore;

pub const SESSION_NAMESPACE: &str = "session";

const SESSION_ID_BYTES: usize = 32;

/// Identifier and lifetime of a freshly minted session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionGrant {
    pub session_id: String,
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn TokenStore>,
    ttl_seconds: u64,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Bind `credential` to a new session id.
    ///
    /// # Errors
    /// Returns an error if the RNG or the store fails.
    #[instrument(skip_all)]
    pub async fn mint(&self, credential: &SecretString) -> Result<SessionGrant, HandshakeError> {
        let session_id = random_token(SESSION_ID_BYTES)?;
        self.store
            .set_with_ttl(
                &session_key(&session_id),
                credential.expose_secret(),
                self.ttl_seconds,
            )
            .await?;

        debug!("session minted");

        Ok(SessionGrant {
            session_id,
            expires_in: self.ttl_seconds,
        })
    }

    /// Credential bound to a live session, if the session exists.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    #[instrument(skip_all)]
    pub async fn resolve(&self, session_id: &str) -> Result<Option<SecretString>, HandshakeError> {
        let value = self.store.get(&session_key(session_id)).await?;
        Ok(value.map(SecretString::from))
    }
}

fn session_key(session_id: &str) -> String {
    format!("{SESSION_NAMESPACE}:{session_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTokenStore;
    use std::time::Duration;

    #[tokio::test]
    async fn mint_stores_credential_under_session_namespace() -> Result<(), HandshakeError> {
        let store = Arc::new(MemoryTokenStore::new());
        let issuer = SessionIssuer::new(store.clone(), 60);

        let grant = issuer.mint(&SecretString::from("key123")).await?;
        assert_eq!(grant.expires_in, 60);
        assert_eq!(grant.session_id.len(), 43);

        let stored = store.get(&format!("session:{}", grant.session_id)).await?;
        assert_eq!(stored.as_deref(), Some("key123"));

        let resolved = issuer.resolve(&grant.session_id).await?;
        assert_eq!(
            resolved.as_ref().map(|secret| secret.expose_secret()),
            Some("key123")
        );
        Ok(())
    }

    #[tokio::test]
    async fn each_mint_gets_a_distinct_session() -> Result<(), HandshakeError> {
        let issuer = SessionIssuer::new(Arc::new(MemoryTokenStore::new()), 60);
        let credential = SecretString::from("key123");
        let first = issuer.mint(&credential).await?;
        let second = issuer.mint(&credential).await?;
        assert_ne!(first.session_id, second.session_id);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_expire_after_their_own_ttl() -> Result<(), HandshakeError> {
        let issuer = SessionIssuer::new(Arc::new(MemoryTokenStore::new()), 100);
        let grant = issuer.mint(&SecretString::from("key123")).await?;

        tokio::time::advance(Duration::from_secs(99)).await;
        assert!(issuer.resolve(&grant.session_id).await?.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(issuer.resolve(&grant.session_id).await?.is_none());
        Ok(())
    }
}
