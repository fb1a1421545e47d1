use crate::{remote::RemoteError, store::StoreError};

/// Every way a handshake call can fail.
///
/// `NotPending`, `NotReady` and `AlreadyConsumed` are ordinary outcomes of the
/// state machine and are returned to the caller as-is. `Store` and `Entropy`
/// are infrastructure failures; the call performed no retry and may be retried
/// by the caller.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("token is not pending")]
    NotPending,
    #[error("token is not ready")]
    NotReady,
    #[error("token was already consumed")]
    AlreadyConsumed,
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("random number generator failed: {0}")]
    Entropy(#[from] rand::Error),
}

impl HandshakeError {
    /// Stable wire code for this failure.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotPending => "not-pending",
            Self::NotReady => "not-ready",
            Self::AlreadyConsumed => "already-consumed",
            Self::Remote(_) => "remote-service",
            Self::Store(_) | Self::Entropy(_) => "infrastructure",
        }
    }

    /// True for the expected state-machine outcomes (as opposed to faults).
    #[must_use]
    pub const fn is_state_violation(&self) -> bool {
        matches!(
            self,
            Self::NotPending | Self::NotReady | Self::AlreadyConsumed
        )
    }
}
