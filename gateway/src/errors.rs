use thiserror::Error;

/// Errors of the gateway's own HTTP surface.
///
/// Upstream failures never appear here; they are mapped to response status
/// codes inside the handlers. These variants cover local I/O and
/// request/response plumbing only.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build response: {0}")]
    Http(#[from] http::Error),

    #[error("failed to read request body: {0}")]
    Body(String),
}
