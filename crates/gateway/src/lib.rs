//! HTTP control surface for wabridge.
//!
//! Operators use it to watch session health, fetch the pairing QR code,
//! trigger restarts, send test messages, and associate numbers with
//! conversations. Every handler reads or mutates session state, or
//! delegates to the association backend / transport — no business logic
//! lives here.

pub mod server;
pub mod state;

pub use {
    server::{build_app, serve},
    state::AppState,
};
