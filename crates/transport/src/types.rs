//! JSON wire messages exchanged with the WhatsApp Web sidecar.

use serde::{Deserialize, Serialize};

/// Command sent from the bridge to the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Begin (or resume) a WhatsApp Web login. The sidecar answers with
    /// either `qr` (fresh pairing) or `ready` (persisted credentials).
    Login {
        #[serde(skip_serializing_if = "Option::is_none")]
        auth_dir: Option<String>,
    },
    /// Log out and drop persisted credentials.
    Logout,
    /// Send a text message to a recipient JID.
    Send {
        to: String,
        text: String,
        request_id: String,
    },
    /// Ask the sidecar for its current connection state.
    Status,
}

/// Event received from the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarEvent {
    /// A pairing QR token was issued; the operator must scan it.
    Qr { token: String },
    /// Credentials were accepted.
    Authenticated,
    /// The session is fully up and can send/receive.
    Ready {
        #[serde(default)]
        phone_number: Option<String>,
    },
    /// Authentication failed; a restart is required to pair again.
    AuthFailure { reason: String },
    /// The session dropped.
    Disconnected { reason: String },
    /// An inbound message arrived on the session.
    Message {
        from: String,
        body: String,
        #[serde(default = "default_message_kind")]
        kind: String,
        #[serde(default)]
        from_me: bool,
    },
    /// Outcome of a previously issued `send` command.
    SendResult {
        request_id: String,
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
    /// A sidecar-internal error not tied to the session lifecycle.
    Error { error: String },
}

fn default_message_kind() -> String {
    "chat".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_shape() {
        let cmd = ClientCommand::Send {
            to: "5511999990000@c.us".into(),
            text: "hi".into(),
            request_id: "r1".into(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "send");
        assert_eq!(json["to"], "5511999990000@c.us");
        assert_eq!(json["request_id"], "r1");
    }

    #[test]
    fn login_omits_absent_auth_dir() {
        let json = serde_json::to_value(ClientCommand::Login { auth_dir: None }).unwrap();
        assert!(json.get("auth_dir").is_none());
    }

    #[test]
    fn event_message_defaults() {
        let event: SidecarEvent = serde_json::from_str(
            r#"{"type":"message","from":"5511@c.us","body":"oi"}"#,
        )
        .unwrap();
        assert_eq!(event, SidecarEvent::Message {
            from: "5511@c.us".into(),
            body: "oi".into(),
            kind: "chat".into(),
            from_me: false,
        });
    }

    #[test]
    fn event_ready_without_number() {
        let event: SidecarEvent = serde_json::from_str(r#"{"type":"ready"}"#).unwrap();
        assert_eq!(event, SidecarEvent::Ready { phone_number: None });
    }
}
