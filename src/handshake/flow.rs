//! Flow identifiers and ephemeral token ids.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

use super::{error::HandshakeError, utils::random_token};

const TOKEN_ID_BYTES: usize = 16;

/// One of the three independent handshakes. Each owns its own key namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Register,
    Restore,
    Reset,
}

impl FlowType {
    pub const ALL: [Self; 3] = [Self::Register, Self::Restore, Self::Reset];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Restore => "restore",
            Self::Reset => "reset",
        }
    }

    /// Register and restore reserve their slot at issue time; reset waits for
    /// an explicit confirmation.
    #[must_use]
    pub const fn reserves_on_issue(self) -> bool {
        !matches!(self, Self::Reset)
    }

    pub(crate) fn key(self, token_id: &TokenId) -> String {
        format!("{}:{}", self.as_str(), token_id.as_str())
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowType {
    type Err = HandshakeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "register" => Ok(Self::Register),
            "restore" => Ok(Self::Restore),
            "reset" => Ok(Self::Reset),
            _ => Err(HandshakeError::Validation(format!(
                "unknown flow type: {value}"
            ))),
        }
    }
}

/// 128-bit random identifier of an ephemeral slot, base64url without padding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TokenId(String);

impl TokenId {
    /// Draw a fresh id from the OS random number generator.
    ///
    /// # Errors
    /// Returns an error if the OS RNG is unavailable.
    pub fn generate() -> Result<Self, HandshakeError> {
        Ok(Self(random_token(TOKEN_ID_BYTES)?))
    }

    /// Validate a client-supplied id.
    ///
    /// # Errors
    /// Returns `HandshakeError::Validation` unless `value` decodes to exactly 16 bytes.
    pub fn parse(value: &str) -> Result<Self, HandshakeError> {
        let value = value.trim();
        match Base64UrlUnpadded::decode_vec(value) {
            Ok(bytes) if bytes.len() == TOKEN_ID_BYTES => Ok(Self(value.to_string())),
            _ => Err(HandshakeError::Validation("malformed token id".to_string())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
