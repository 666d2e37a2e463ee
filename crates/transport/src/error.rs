/// Crate-wide result type for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed transport errors surfaced to callers of the send/teardown seams.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No authenticated session is available to send through.
    #[error("transport is not ready")]
    NotReady,

    /// The sidecar link has been closed or torn down.
    #[error("transport link is closed")]
    Closed,

    /// The WebSocket link to the sidecar failed.
    #[error("sidecar link error: {0}")]
    Link(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON (de)serialization of a wire message failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}
