//! A minimal SSH-like secure transport: framing, a Diffie-Hellman handshake
//! with pinned-RSA host authentication, and a multi-stage session state
//! machine. Channel multiplexing (shell, file transfer, port forwarding)
//! lives in the `rssh-connect` crate, built atop this one.

pub mod codec;
pub mod crypto;
mod error;
pub mod protocol;
pub mod session;

pub use codec::{Codec, Pipe};
pub use error::{Error, Result};
pub use protocol::Message;
pub use session::{Session, Side, State};
