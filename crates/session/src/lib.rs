//! Session lifecycle for the single WhatsApp Web session wabridge manages.
//!
//! [`SessionManager`] owns the process-wide session state (status, pairing
//! artifact, connected identity), applies transport lifecycle events to it,
//! and hands inbound messages to the registered [`InboundHandler`]. All
//! state mutation funnels through the manager so concurrent transport
//! events and control-API requests can never interleave into an
//! inconsistent view.

pub mod manager;
pub mod render;
pub mod state;

pub use {
    manager::{InboundHandler, SessionManager, SessionOutbound},
    state::{PairingArtifact, SessionStatus},
};
