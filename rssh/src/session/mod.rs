//! The connection state machine: handshake, host-key pinning, authentication
//! and service request. Once `ServiceActive` is reached, control passes to
//! the dispatcher (outside this crate).

pub mod client;
mod config;
pub mod server;
pub mod trust;

pub use config::{ClientConfig, ServerConfig};

use crate::codec::{Codec, Pipe};
use crate::error::Result;
use crate::protocol::Message;

/// Which side of the handshake a [`Session`] is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

/// The connection's lifecycle state.
///
/// Transitions are total: any message received outside the state it is
/// expected in is a fatal [`Error::ProtocolError`], and the session moves to
/// `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Connected,
    KexInProgress,
    KexDone,
    AuthInProgress,
    Authenticated,
    ServiceActive,
    Closing,
    Closed,
}

/// A single connection's transport and state, shared by both sides.
///
/// Owns the [`Codec`] and drives it through the handshake in
/// [`client::connect`] / [`server::accept`]; once `ServiceActive`, ownership
/// of `receive()` passes to a dispatcher task.
#[derive(Debug)]
pub struct Session<S: Pipe> {
    codec: Codec<S>,
    side: Side,
    state: State,
    /// 128-bit session id, server-chosen, hex-encoded; used as the
    /// authentication challenge and for log correlation.
    pub session_id: String,
    /// Client-side bookkeeping of the remote working directory.
    pub cwd: String,
}

impl<S: Pipe> Session<S> {
    fn new(codec: Codec<S>, side: Side, session_id: String) -> Self {
        Self {
            codec,
            side,
            state: State::Connected,
            session_id,
            cwd: String::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, state: State) {
        tracing::debug!(from = ?self.state, to = ?state, "session state transition");
        self.state = state;
    }

    /// Send a message, encrypted if the handshake has completed.
    pub async fn send(&self, message: &Message) -> Result<()> {
        self.codec.send(&message.encode()).await
    }

    /// Receive and decode the next message.
    ///
    /// # Cancel safety
    /// Inherits [`Codec::receive`]'s cancel-unsafety: only a single task may
    /// call this for a given session.
    pub async fn receive(&self) -> Result<Message> {
        let bytes = self.codec.receive().await?;
        Message::decode(&bytes)
    }

    /// Enable the record layer once the shared secret has been derived.
    fn enable_encryption(&self, keys: crate::crypto::Keys) {
        self.codec.enable_encryption(keys);
    }

    /// Split this handshake-complete session into its raw halves for
    /// hand-off to a dispatcher.
    pub fn into_codec(self) -> Codec<S> {
        self.codec
    }

    pub fn is_encrypted(&self) -> bool {
        self.codec.is_encrypted()
    }
}
