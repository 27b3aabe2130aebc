//! Error types for the Riva client connection layer.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the connection layer [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building a channel or an [`Auth`](crate::Auth).
#[derive(Debug, Error)]
pub enum Error {
    /// Certificate path given but the file is missing or unreadable.
    #[error("Failed to read certificate {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Target address cannot be used for the requested channel kind.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Endpoint or TLS setup rejected by the transport.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}
