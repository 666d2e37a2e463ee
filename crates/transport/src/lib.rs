//! WhatsApp Web transport boundary for wabridge.
//!
//! The actual WhatsApp Web protocol (wire format, encryption, QR pairing)
//! lives in a Node.js sidecar process; this crate manages that process,
//! speaks JSON to it over a local WebSocket, and exposes the narrow
//! [`Transport`] / [`Outbound`] / [`TransportLauncher`] seams the rest of
//! the bridge is written against.

pub mod error;
pub mod event;
pub mod link;
pub mod process;
pub mod sidecar;
pub mod types;

pub use {
    error::{Error, Result},
    event::{InboundMessage, TransportEvent},
    sidecar::{
        DEFAULT_SIDECAR_PORT, Outbound, SidecarLauncher, SidecarSettings, Transport,
        TransportLauncher,
    },
};
