//! Three-phase ephemeral token handshake: issue, upload, exchange.
//!
//! ## Slot lifecycle
//!
//! Each flow instance owns one key, `<flow>:<token id>`:
//!
//! ```text
//! Absent --issue/confirm--> Pending --upload--> Filled --exchange--> Consumed
//!            Pending / Filled / Consumed --TTL--> Absent (expired)
//! ```
//!
//! The state is inferred from the stored value: the sentinel `pending`, the
//! uploaded credential, or the tombstone `consumed`. `upload` moves Pending to
//! Filled with a compare-and-set on the sentinel; `exchange` swaps the value it
//! read for the tombstone with another compare-and-set, so of N concurrent
//! exchanges exactly one mints a session and the rest observe
//! `AlreadyConsumed`. The tombstone keeps the ephemeral TTL, after which a
//! replay sees an absent slot.
//!
//! ## Reset flow
//!
//! Register and restore reserve their slot when the flow is issued. Reset only
//! asks the remote service to acknowledge the reset email at issue time; the
//! slot is reserved later by [`HandshakeCoordinator::confirm`], once the
//! out-of-band confirmation has happened.
//!
//! ## Failure handling
//!
//! When the remote service rejects a register/restore issue, the Pending slot
//! written just before the call is deleted again. If that delete fails too, the
//! slot is left to expire; its id was never returned to anyone.

mod config;
mod error;
mod flow;
mod session;
mod utils;


pub use config::{HandshakeConfig, DEFAULT_EPHEMERAL_TTL_SECONDS, DEFAULT_SESSION_TTL_SECONDS};
pub use error::HandshakeError;
pub use flow::{FlowType, TokenId};
pub use session::{SessionGrant, SessionIssuer, SESSION_NAMESPACE};

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    remote::RemoteService,
    store::{CasOutcome, TokenStore},
};
use utils::{normalize_email, valid_email, validate_credential};

/// Stored value of a slot that has been reserved but not filled yet.
pub const PENDING: &str = "pending";

/// Stored value of a slot whose credential has been exchanged.
pub const CONSUMED: &str = "consumed";

/// A reserved Pending slot, as handed to the end client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    pub token_id: TokenId,
    pub upload_url: String,
}

/// Outcome of [`HandshakeCoordinator::issue`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedFlow {
    pub flow: FlowType,
    /// `None` for reset, which reserves its slot on confirmation.
    pub reservation: Option<Reservation>,
    /// Flow-scoped token from the remote service (register/restore only).
    pub remote_flow_token: Option<String>,
}

pub struct HandshakeCoordinator {
    store: Arc<dyn TokenStore>,
    remote: Arc<dyn RemoteService>,
    sessions: SessionIssuer,
    config: HandshakeConfig,
}

impl HandshakeCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        remote: Arc<dyn RemoteService>,
        config: HandshakeConfig,
    ) -> Self {
        let sessions = SessionIssuer::new(store.clone(), config.session_ttl_seconds());
        Self {
            store,
            remote,
            sessions,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Start `flow` for `email`.
    ///
    /// Register and restore reserve a Pending slot and ask the remote service
    /// to start the flow; the slot is rolled back if that call fails. Reset
    /// only asks the remote service to acknowledge the email.
    ///
    /// # Errors
    /// `Validation` for a malformed email, `Remote` when the remote service
    /// fails, `Store`/`Entropy` on infrastructure failure.
    #[instrument(skip(self, email), fields(flow = %flow))]
    pub async fn issue(&self, flow: FlowType, email: &str) -> Result<IssuedFlow, HandshakeError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(HandshakeError::Validation("invalid email".to_string()));
        }

        if !flow.reserves_on_issue() {
            self.remote.acknowledge(&email).await?;
            info!("reset acknowledged, awaiting confirmation");
            return Ok(IssuedFlow {
                flow,
                reservation: None,
                remote_flow_token: None,
            });
        }

        let reservation = self.reserve(flow).await?;

        match self.remote.start(flow, &email).await {
            Ok(remote_flow_token) => {
                info!(token_id = %reservation.token_id, "flow issued");
                Ok(IssuedFlow {
                    flow,
                    reservation: Some(reservation),
                    remote_flow_token: Some(remote_flow_token),
                })
            }
            Err(err) => {
                warn!(token_id = %reservation.token_id, "remote start failed: {err}");
                self.release(flow, &reservation.token_id).await;
                Err(err.into())
            }
        }
    }

    /// Reserve the reset slot once the reset email has been confirmed.
    ///
    /// # Errors
    /// `Store`/`Entropy` on infrastructure failure.
    #[instrument(skip(self))]
    pub async fn confirm(&self) -> Result<Reservation, HandshakeError> {
        let reservation = self.reserve(FlowType::Reset).await?;
        info!(token_id = %reservation.token_id, "reset confirmed");
        Ok(reservation)
    }

    /// Fill a Pending slot with `credential`. Succeeds at most once per slot.
    ///
    /// # Errors
    /// `NotReady` if the slot does not exist (never issued, expired),
    /// `NotPending` if it was already filled or consumed, `Validation` for a
    /// bad credential.
    #[instrument(skip(self, credential), fields(flow = %flow, token_id = %token_id))]
    pub async fn upload(
        &self,
        flow: FlowType,
        token_id: &TokenId,
        credential: &SecretString,
    ) -> Result<(), HandshakeError> {
        let credential = validate_credential(credential.expose_secret())?;
        let key = flow.key(token_id);

        let outcome = self
            .store
            .compare_and_set(
                &key,
                PENDING,
                credential,
                self.config.ephemeral_ttl_seconds(),
            )
            .await?;

        match outcome {
            CasOutcome::Applied => {
                debug!("slot filled");
                Ok(())
            }
            CasOutcome::Mismatch => {
                debug!("upload rejected: slot already filled or consumed");
                Err(HandshakeError::NotPending)
            }
            CasOutcome::NotFound => {
                debug!("upload rejected: no such slot");
                Err(HandshakeError::NotReady)
            }
        }
    }

    /// Consume a Filled slot and mint a session bound to its credential.
    ///
    /// # Errors
    /// `NotReady` if the slot is missing or still Pending, `AlreadyConsumed`
    /// if it was exchanged before, by this or a concurrent call.
    #[instrument(skip(self), fields(flow = %flow, token_id = %token_id))]
    pub async fn exchange(
        &self,
        flow: FlowType,
        token_id: &TokenId,
    ) -> Result<SessionGrant, HandshakeError> {
        let key = flow.key(token_id);

        let Some(credential) = self.store.get(&key).await? else {
            debug!("exchange rejected: no such slot");
            return Err(HandshakeError::NotReady);
        };
        match credential.as_str() {
            PENDING => {
                debug!("exchange rejected: slot still pending");
                return Err(HandshakeError::NotReady);
            }
            CONSUMED => {
                debug!("exchange rejected: slot already consumed");
                return Err(HandshakeError::AlreadyConsumed);
            }
            _ => {}
        }

        let outcome = self
            .store
            .compare_and_set(
                &key,
                &credential,
                CONSUMED,
                self.config.ephemeral_ttl_seconds(),
            )
            .await?;

        match outcome {
            CasOutcome::Applied => {}
            CasOutcome::Mismatch => {
                debug!("exchange lost the race");
                return Err(HandshakeError::AlreadyConsumed);
            }
            CasOutcome::NotFound => {
                debug!("exchange rejected: slot expired");
                return Err(HandshakeError::NotReady);
            }
        }

        // The slot is tombstoned at this point; a failure below cannot be
        // retried with the same token id.
        let credential = SecretString::from(credential);
        let grant = self
            .sessions
            .mint(&credential)
            .await
            .inspect_err(|err| error!("slot consumed but session mint failed: {err}"))?;

        info!("token exchanged for session");

        Ok(grant)
    }

    async fn reserve(&self, flow: FlowType) -> Result<Reservation, HandshakeError> {
        let token_id = TokenId::generate()?;
        self.store
            .set_with_ttl(
                &flow.key(&token_id),
                PENDING,
                self.config.ephemeral_ttl_seconds(),
            )
            .await?;

        let upload_url = self.config.upload_url(flow, &token_id);
        Ok(Reservation {
            token_id,
            upload_url,
        })
    }

    async fn release(&self, flow: FlowType, token_id: &TokenId) {
        if let Err(err) = self.store.delete(&flow.key(token_id)).await {
            error!(%token_id, "failed to roll back pending slot, leaving it to expire: {err}");
        }
    }
}
