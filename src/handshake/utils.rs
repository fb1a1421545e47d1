//! Input checks and random token generation shared by the handshake.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;

use super::{error::HandshakeError, CONSUMED, PENDING};

/// Longest credential accepted by `upload`.
pub(crate) const MAX_CREDENTIAL_BYTES: usize = 4096;

/// Normalize an email before it is handed to the remote service.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Reject credentials that are empty, oversized, or equal to a slot sentinel.
/// Storing a sentinel would make a filled slot look pending or consumed.
pub(crate) fn validate_credential(credential: &str) -> Result<&str, HandshakeError> {
    if credential.is_empty() {
        return Err(HandshakeError::Validation("missing credential".to_string()));
    }
    if credential.len() > MAX_CREDENTIAL_BYTES {
        return Err(HandshakeError::Validation(
            "credential too large".to_string(),
        ));
    }
    if credential == PENDING || credential == CONSUMED {
        return Err(HandshakeError::Validation(
            "credential is a reserved value".to_string(),
        ));
    }
    Ok(credential)
}

/// `bytes` random bytes from the OS RNG, base64url without padding.
pub(crate) fn random_token(bytes: usize) -> Result<String, HandshakeError> {
    let mut buffer = vec![0u8; bytes];
    OsRng.try_fill_bytes(&mut buffer)?;
    Ok(Base64UrlUnpadded::encode_string(&buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@b.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email(""));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("a b@example.com"));
    }

    #[test]
    fn validate_credential_rules() {
        assert_eq!(validate_credential("key123").ok(), Some("key123"));
        assert!(validate_credential("").is_err());
        assert!(validate_credential(PENDING).is_err());
        assert!(validate_credential(CONSUMED).is_err());
        assert!(validate_credential(&"x".repeat(MAX_CREDENTIAL_BYTES + 1)).is_err());
        assert!(validate_credential(&"x".repeat(MAX_CREDENTIAL_BYTES)).is_ok());
    }

    #[test]
    fn random_token_length_matches_encoding() -> Result<(), HandshakeError> {
        let token = random_token(32)?;
        assert_eq!(token.len(), 43);
        let decoded = Base64UrlUnpadded::decode_vec(&token).map(|bytes| bytes.len());
        assert_eq!(decoded.ok(), Some(32));
        Ok(())
    }
}
