//! Handshake configuration.

use super::{FlowType, TokenId};

pub const DEFAULT_EPHEMERAL_TTL_SECONDS: u64 = 10 * 60;
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 60 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct HandshakeConfig {
    public_base_url: String,
    ephemeral_ttl_seconds: u64,
    session_ttl_seconds: u64,
}

impl HandshakeConfig {
    #[must_use]
    pub fn new(public_base_url: String) -> Self {
        Self {
            public_base_url,
            ephemeral_ttl_seconds: DEFAULT_EPHEMERAL_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_ephemeral_ttl_seconds(mut self, seconds: u64) -> Self {
        self.ephemeral_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    #[must_use]
    pub fn ephemeral_ttl_seconds(&self) -> u64 {
        self.ephemeral_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    /// Where the end client sends its credential for `token_id`.
    #[must_use]
    pub fn upload_url(&self, flow: FlowType, token_id: &TokenId) -> String {
        let base = self.public_base_url.trim_end_matches('/');
        format!("{base}/v1/flows/{flow}/{token_id}/upload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::HandshakeError;

    #[test]
    fn defaults_and_overrides() {
        let config = HandshakeConfig::new("https://handoff.dev".to_string());
        assert_eq!(config.public_base_url(), "https://handoff.dev");
        assert_eq!(config.ephemeral_ttl_seconds(), 600);
        assert_eq!(config.session_ttl_seconds(), 5_184_000);

        let config = config
            .with_ephemeral_ttl_seconds(30)
            .with_session_ttl_seconds(120);
        assert_eq!(config.ephemeral_ttl_seconds(), 30);
        assert_eq!(config.session_ttl_seconds(), 120);
    }

    #[test]
    fn upload_url_trims_trailing_slash() -> Result<(), HandshakeError> {
        let config = HandshakeConfig::new("https://handoff.dev/".to_string());
        let token_id = TokenId::generate()?;
        assert_eq!(
            config.upload_url(FlowType::Register, &token_id),
            format!("https://handoff.dev/v1/flows/register/{token_id}/upload")
        );
        Ok(())
    }
}
