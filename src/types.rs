//! Core error types for keyward.
//!
//! Every failure surfaced by this crate is one of a closed set of kinds so
//! callers can match on the variant instead of pattern-matching message
//! substrings. The remote service's original text is preserved verbatim
//! inside the variant for diagnostics.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, KeywardError>;

/// Errors surfaced by the wrapped-key lifecycle.
#[derive(Debug, Error)]
pub enum KeywardError {
    /// Missing, expired, foreign, or non-owner-backed session credential.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The execution network evaluated the access policy and declined to
    /// produce output for this caller.
    #[error("access policy denied decryption: {0}")]
    PolicyDenied(String),

    /// A malformed field detected before any remote call, or rejected by
    /// the backend's validation pass. Aborts whole batches.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Decrypted bytes did not carry the salt prefix. The threshold
    /// decrypt "succeeded" structurally but produced garbage.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// The execution network could not reach sufficient agreement; the
    /// remote error text is forwarded verbatim.
    #[error("execution network disagreement: {0}")]
    NetworkDisagreement(String),

    /// HTTP or transport-layer failure against the store or gateway.
    #[error("transport failure (status {status}): {message}")]
    Transport { status: u16, message: String },
}

impl KeywardError {
    /// Stable machine-readable code for this error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeywardError::Auth(_) => ErrorKind::Auth,
            KeywardError::PolicyDenied(_) => ErrorKind::PolicyDenied,
            KeywardError::Validation(_) => ErrorKind::Validation,
            KeywardError::Integrity(_) => ErrorKind::Integrity,
            KeywardError::NetworkDisagreement(_) => ErrorKind::NetworkDisagreement,
            KeywardError::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// Build a transport error from a reqwest failure that never reached
    /// an HTTP status (connect, timeout, body read).
    pub fn from_transport(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16()).unwrap_or(0);
        KeywardError::Transport {
            status,
            message: err.to_string(),
        }
    }

    /// Normalize a non-2xx response body into a typed error.
    ///
    /// Services reply with either JSON `{"message": ...}` or plain text;
    /// the text is preserved verbatim inside the typed variant.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| body.to_string());

        match status {
            401 | 403 => KeywardError::Auth(message),
            400 | 409 | 422 => KeywardError::Validation(message),
            _ => KeywardError::Transport { status, message },
        }
    }
}

/// Stable error-kind codes, serialized where a machine-readable
/// discriminant is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    PolicyDenied,
    Validation,
    Integrity,
    NetworkDisagreement,
    Transport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(KeywardError::Auth("x".into()).kind(), ErrorKind::Auth);
        assert_eq!(
            KeywardError::Transport {
                status: 502,
                message: "bad gateway".into()
            }
            .kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn test_display_preserves_remote_text() {
        let err = KeywardError::NetworkDisagreement("node quorum not met: 1/3".into());
        assert!(err.to_string().contains("node quorum not met: 1/3"));
    }

    #[test]
    fn test_from_response_extracts_json_message() {
        let err = KeywardError::from_response(400, r#"{"message": "publicKey is required"}"#);
        assert!(matches!(err, KeywardError::Validation(ref m) if m == "publicKey is required"));
    }

    #[test]
    fn test_from_response_falls_back_to_plain_text() {
        let err = KeywardError::from_response(503, "upstream unavailable");
        assert!(
            matches!(err, KeywardError::Transport { status: 503, ref message } if message == "upstream unavailable")
        );
    }

    #[test]
    fn test_from_response_maps_auth_statuses() {
        assert_eq!(
            KeywardError::from_response(401, "nope").kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            KeywardError::from_response(403, "nope").kind(),
            ErrorKind::Auth
        );
    }
}
