//! Inbound message routing for wabridge.
//!
//! Flow: transport message → skip self-originated → resolve the sender
//! against the backend's association store → either send the default
//! welcome (unknown sender) or forward to the conversation engine and relay
//! its reply. Every message terminates in at most one outbound send
//! (welcome, forwarded reply, or apology) or silence; failures degrade to
//! the fallback paths and never propagate back into the transport's event
//! handling.

pub mod error;
pub mod forward;
pub mod normalize;
pub mod resolve;
pub mod router;
pub mod texts;

pub use {
    error::{Error, Result},
    forward::ConversationForwarder,
    normalize::{conversation_key, normalize_sender},
    resolve::{AssociationClient, ConversationBinding},
    router::MessageRouter,
};
