//! Catalog errors.

use thiserror::Error;

/// Errors raised while talking to a map catalog.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// The request could not be sent or its body could not be read.
    #[error("Request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The response body is not what the endpoint serves.
    #[error("Invalid response from {url}: {reason}")]
    Parse { url: String, reason: String },
}
