//! Caller credentials and their trust level.
//!
//! Billed operations against the Kasumi service carry a token plus a
//! `token_type` discriminator. Plaintext tokens belong to the trusted
//! developer-side caller and never transit an end-user path; encrypted
//! tokens are relayed through untrusted end users and are only decrypted
//! and validated by the remote service itself.

use std::fmt;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{KasumiError, Result};

/// Trust-level discriminator sent as the wire field `token_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Developer-held secret, used directly by the trusted caller.
    Plaintext,
    /// Credential relayed through an untrusted end-user path; opaque to
    /// this SDK and decrypted server-side.
    Encrypted,
}

impl TokenType {
    /// Wire spelling of the discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Plaintext => "plaintext",
            TokenType::Encrypted => "encrypted",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential paired with its trust level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    kind: TokenType,
    payload: String,
}

impl Token {
    /// Wraps the developer-side secret held in configuration.
    pub fn plaintext(payload: impl Into<String>) -> Self {
        Self {
            kind: TokenType::Plaintext,
            payload: payload.into(),
        }
    }

    /// Wraps a credential relayed by an end user. The payload stays opaque
    /// here; only the remote service can decrypt it.
    pub fn encrypted(payload: impl Into<String>) -> Self {
        Self {
            kind: TokenType::Encrypted,
            payload: payload.into(),
        }
    }

    /// Trust level of this token.
    pub fn kind(&self) -> TokenType {
        self.kind
    }

    /// Raw payload as it will appear on the wire.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Validates the token before it is spent on a billed operation.
    ///
    /// Plaintext tokens must be non-empty. Encrypted tokens must also be
    /// well-formed base64, the only structural check possible without the
    /// service-side key. Returns the payload to forward.
    pub fn for_billing(&self) -> Result<&str> {
        if self.payload.is_empty() {
            return Err(KasumiError::InvalidToken(format!(
                "{} token payload is empty",
                self.kind
            )));
        }
        if self.kind == TokenType::Encrypted
            && base64::engine::general_purpose::STANDARD
                .decode(&self.payload)
                .is_err()
        {
            return Err(KasumiError::InvalidToken(
                "encrypted token payload is not valid base64".into(),
            ));
        }
        Ok(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TokenType::Plaintext).unwrap(),
            r#""plaintext""#
        );
        assert_eq!(
            serde_json::to_string(&TokenType::Encrypted).unwrap(),
            r#""encrypted""#
        );
    }

    #[test]
    fn billing_rejects_empty_payloads() {
        let err = Token::plaintext("").for_billing().unwrap_err();
        assert!(matches!(err, KasumiError::InvalidToken(_)));
    }

    #[test]
    fn billing_rejects_malformed_encrypted_payloads() {
        let err = Token::encrypted("not base64 !!").for_billing().unwrap_err();
        assert!(matches!(err, KasumiError::InvalidToken(_)));
    }

    #[test]
    fn billing_accepts_valid_tokens() {
        assert_eq!(
            Token::plaintext("dev-secret").for_billing().unwrap(),
            "dev-secret"
        );

        let relayed = base64::engine::general_purpose::STANDARD.encode(b"opaque blob");
        assert_eq!(
            Token::encrypted(relayed.clone()).for_billing().unwrap(),
            relayed
        );
    }
}
