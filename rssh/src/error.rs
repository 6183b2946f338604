//! Collection of error handling types and aliases.

use thiserror::Error;

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the underlying socket.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// RSA private-key (PKCS#8) (de)serialization error.
    #[error(transparent)]
    RsaPrivateKey(#[from] rsa::pkcs8::Error),

    /// RSA public-key (SPKI) (de)serialization error.
    #[error(transparent)]
    RsaPublicKey(#[from] rsa::pkcs8::spki::Error),

    /// RSA key generation or operation error.
    #[error(transparent)]
    Rsa(#[from] rsa::Error),

    /// RSA signing/verification error.
    #[error(transparent)]
    Signature(#[from] signature::Error),

    /// Base64 decoding error, while loading a persisted key.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    /// The frame's length prefix is malformed, or the frame was truncated.
    #[error("Malformed frame: {0}")]
    FramingError(String),

    /// HMAC verification failed on an encrypted frame.
    #[error("Integrity check failed on an incoming frame")]
    IntegrityFailure,

    /// A message was received out of order, of an unknown type, or missing a required field.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The server's host key did not match the pinned key in the trust store.
    #[error("The server's host key does not match the pinned key")]
    HostKeyMismatch,

    /// The server failed to prove ownership of its host key.
    #[error("The server failed to authenticate itself with its host key")]
    HostAuthFailure,

    /// The server rejected the authentication attempt.
    #[error("Authentication failed for method `{0}`")]
    AuthFailure(String),

    /// A per-request failure reported by the peer; the session itself remains usable.
    #[error("Request failed: {0}")]
    RequestFailure(String),

    /// A local timeout elapsed while waiting on a response.
    #[error("Timed out waiting for a response")]
    Timeout,

    /// The connection was closed, locally or by the peer.
    #[error("The connection has been closed")]
    ConnectionClosed,
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
