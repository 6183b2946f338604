//! Frame encode/decode with optional record-layer protection.

mod frame;
mod record;

pub use frame::MAX_FRAME_SIZE;

use std::sync::OnceLock;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

use crate::crypto::Keys;
use crate::error::Result;

/// A trait alias for something _pipe-alike_: a duplex, owned, `'static` byte stream.
pub trait Pipe: AsyncRead + AsyncWrite + Unpin + Send + 'static {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Pipe for T {}

/// Wraps a [`Pipe`] to send and receive length-prefixed, optionally
/// encrypted, [`crate::protocol::Message`] frames.
///
/// Before the key-exchange completes, frames are sent and received in the
/// clear; [`Codec::enable_encryption`] flips the record layer on exactly
/// once, after which every frame is protected under [`Keys`]. The security
/// invariant this enforces: no plaintext message is ever written after
/// encryption is enabled, and no encrypted message is ever written before.
#[derive(Debug)]
pub struct Codec<S: Pipe> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    keys: OnceLock<Keys>,
}

impl<S: Pipe> Codec<S> {
    /// Wrap a fresh, unencrypted connection.
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);

        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            keys: OnceLock::new(),
        }
    }

    /// Whether the record layer is currently encrypting frames.
    pub fn is_encrypted(&self) -> bool {
        self.keys.get().is_some()
    }

    /// Enable the record layer with the derived session [`Keys`].
    ///
    /// Calling this more than once is a programming error: key material is
    /// immutable once the handshake completes.
    pub fn enable_encryption(&self, keys: Keys) {
        self.keys
            .set(keys)
            .unwrap_or_else(|_| panic!("Codec::enable_encryption called twice on one session"));
    }

    /// Encrypt (if enabled) and send one frame.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        let body = match self.keys.get() {
            Some(keys) => record::seal(payload, keys, &mut rand::thread_rng()),
            None => payload.to_vec(),
        };

        let mut writer = self.writer.lock().await;
        frame::write(&mut *writer, &body).await
    }

    /// Receive and, if enabled, decrypt one frame.
    ///
    /// By convention only a single dispatcher task ever calls this method;
    /// the lock exists to make [`Codec`] freely shareable via `Arc`, not to
    /// support concurrent readers.
    ///
    /// # Cancel safety
    /// Not cancel-safe: a cancelled call may have consumed part of a frame
    /// from the underlying socket.
    pub async fn receive(&self) -> Result<Vec<u8>> {
        let mut reader = self.reader.lock().await;
        let body = frame::read(&mut *reader).await?;
        drop(reader);

        match self.keys.get() {
            Some(keys) => record::open(&body, keys),
            None => Ok(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn plaintext_round_trip_before_encryption() {
        let (a, b) = duplex(4096);
        let codec_a = Codec::new(a);
        let codec_b = Codec::new(b);

        codec_a.send(b"hello").await.unwrap();
        let received = codec_b.receive().await.unwrap();

        assert_eq!(received, b"hello");
    }

    #[tokio::test]
    async fn encrypted_round_trip_after_enabling() {
        let (a, b) = duplex(4096);
        let codec_a = Codec::new(a);
        let codec_b = Codec::new(b);

        let keys = Keys::derive(b"shared secret");
        codec_a.enable_encryption(Keys::derive(b"shared secret"));
        codec_b.enable_encryption(keys);

        codec_a.send(b"secret payload").await.unwrap();
        let received = codec_b.receive().await.unwrap();

        assert_eq!(received, b"secret payload");
    }

    #[tokio::test]
    #[should_panic(expected = "called twice")]
    async fn enabling_encryption_twice_panics() {
        let (a, _b) = duplex(4096);
        let codec = Codec::new(a);

        codec.enable_encryption(Keys::derive(b"one"));
        codec.enable_encryption(Keys::derive(b"two"));
    }
}
