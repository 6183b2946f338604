//! Collection of error handling types and aliases.

use thiserror::Error;

/// Errors raised by the dispatcher and the channels built on it.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Propagated from the underlying transport and session layer.
    #[error(transparent)]
    Transport(#[from] rssh::Error),

    /// A per-request failure reported by the peer; the session itself remains usable.
    #[error("Request failed: {0}")]
    RequestFailure(String),

    /// A local timeout elapsed while waiting on a response.
    #[error("Timed out waiting for a response")]
    Timeout,

    /// The connection was closed, locally or by the peer, while a request was pending.
    #[error("The connection has been closed")]
    ConnectionClosed,

    /// A channel-local I/O failure (e.g. the forwarded local socket).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
