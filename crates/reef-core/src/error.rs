//! Error types for reef-core

use thiserror::Error;

/// Result type alias for reef operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the reef dispatch engine
#[derive(Debug, Error)]
pub enum Error {
    /// Response status outside 1..=999
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(i32),

    /// Request body could not be decoded
    #[error("Malformed request body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    /// Multipart form body could not be parsed
    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    /// Response value could not be serialized
    #[error("JSON encoding failed: {0}")]
    Encode(serde_json::Error),

    /// Listen port could not be resolved
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// Listen address could not be parsed
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    /// TLS listener started without a certificate file
    #[error("certificate file is required")]
    MissingCertificate,

    /// TLS listener started without a private key file
    #[error("certificate private key file is required")]
    MissingPrivateKey,

    /// Connections still open when the shutdown deadline passed
    #[error("Shutdown deadline reached with {remaining} connection(s) still open")]
    ShutdownTimeout { remaining: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Hyper error
    #[error("HTTP error: {0}")]
    Hyper(String),

    /// TLS setup failed or TLS support is not compiled in
    #[error("TLS error: {0}")]
    Tls(String),
}
