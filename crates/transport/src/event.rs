//! Internal transport events consumed by the session state machine and the
//! message router.

use crate::types::SidecarEvent;

/// One received message, constructed per sidecar event and consumed
/// synchronously by the router; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Sender JID (e.g. `5511999990000@c.us`).
    pub from: String,
    pub body: String,
    /// Message kind as reported by the sidecar ("chat", "image", ...).
    pub kind: String,
    /// True for messages the session itself sent.
    pub from_me: bool,
}

/// The bounded set of transport events dispatched into the bridge via a
/// single channel. Everything else the sidecar emits is logged and dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    PairingIssued { token: String },
    Authenticated,
    Ready { identity: Option<String> },
    AuthFailed { reason: String },
    Disconnected { reason: String },
    Message(InboundMessage),
}

impl TransportEvent {
    /// Map a sidecar wire event into a transport event.
    ///
    /// Returns `None` for events the bridge deliberately ignores
    /// (send acknowledgements, sidecar-internal errors).
    pub fn from_sidecar(event: SidecarEvent) -> Option<Self> {
        match event {
            SidecarEvent::Qr { token } => Some(Self::PairingIssued { token }),
            SidecarEvent::Authenticated => Some(Self::Authenticated),
            SidecarEvent::Ready { phone_number } => Some(Self::Ready {
                identity: phone_number,
            }),
            SidecarEvent::AuthFailure { reason } => Some(Self::AuthFailed { reason }),
            SidecarEvent::Disconnected { reason } => Some(Self::Disconnected { reason }),
            SidecarEvent::Message {
                from,
                body,
                kind,
                from_me,
            } => Some(Self::Message(InboundMessage {
                from,
                body,
                kind,
                from_me,
            })),
            SidecarEvent::SendResult { .. } | SidecarEvent::Error { .. } => None,
        }
    }
}
