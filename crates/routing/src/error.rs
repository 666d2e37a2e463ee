/// Crate-wide result type for routing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors for collaborator calls made by the routing pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The collaborator answered with an unexpected HTTP status.
    #[error("{context}: unexpected status {status}")]
    UnexpectedStatus {
        context: &'static str,
        status: reqwest::StatusCode,
    },

    /// The HTTP call itself failed (connect, timeout, body read).
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Sending through the transport failed.
    #[error(transparent)]
    Transport(#[from] wabridge_transport::Error),
}
