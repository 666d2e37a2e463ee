//! Session state types.

use serde::{Deserialize, Serialize};

/// Lifecycle status of the WhatsApp Web session.
///
/// Driven exclusively by transport events and explicit restarts; see
/// [`crate::SessionManager::apply_event`] for the transition table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// The pairing token and its rendered QR image.
///
/// The image is produced by a background task after the pairing event has
/// already been applied; a reader that sees `image: None` is looking at a
/// token whose rendering has not completed yet, which is a valid state and
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingArtifact {
    /// Raw pairing token as issued by the network.
    pub token: String,
    /// PNG data URL of the rendered QR code, once available.
    pub image: Option<String>,
}

impl PairingArtifact {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            image: None,
        }
    }
}

/// Mutable session state guarded by the manager's lock.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub status: SessionStatus,
    pub pairing: Option<PairingArtifact>,
    pub identity: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_format() {
        let json = serde_json::to_string(&SessionStatus::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
        assert_eq!(SessionStatus::Error.to_string(), "error");
    }

    #[test]
    fn initial_state_is_disconnected_and_empty() {
        let state = SessionState::default();
        assert_eq!(state.status, SessionStatus::Disconnected);
        assert!(state.pairing.is_none());
        assert!(state.identity.is_none());
    }
}
