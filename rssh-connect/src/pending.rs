//! The `request_id → completion slot` map described in the data model: at
//! most one slot per id, removed on completion or session close.

use dashmap::DashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

use rssh::protocol::Message;

use crate::error::{Error, Result};

/// Pending unary RPCs (shell commands, transfer acks) keyed by `request_id`.
pub struct PendingResponses {
    slots: DashMap<Uuid, oneshot::Sender<Result<Message>>>,
}

impl Default for PendingResponses {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingResponses {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Register a new slot, returning the receiver half the caller awaits.
    ///
    /// Panics if `request_id` already has a slot: ids are generated fresh
    /// per request and a collision is a programming error, not a protocol one.
    pub fn register(&self, request_id: Uuid) -> oneshot::Receiver<Result<Message>> {
        let (tx, rx) = oneshot::channel();

        if self.slots.insert(request_id, tx).is_some() {
            panic!("duplicate pending slot for request_id {request_id}");
        }

        rx
    }

    /// Complete the slot for `request_id` with a successful response.
    /// Returns `false` if no such slot was registered (e.g. it already timed out).
    pub fn complete(&self, request_id: Uuid, message: Message) -> bool {
        match self.slots.remove(&request_id) {
            Some((_, tx)) => {
                let _ = tx.send(Ok(message));
                true
            }
            None => false,
        }
    }

    /// Fail the slot for `request_id` with `error`.
    pub fn fail(&self, request_id: Uuid, error: Error) -> bool {
        match self.slots.remove(&request_id) {
            Some((_, tx)) => {
                let _ = tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Drain every pending slot, failing each with a freshly minted error.
    /// Used on session close so no slot is ever orphaned.
    pub fn fail_all(&self, mut error: impl FnMut() -> Error) {
        let ids: Vec<Uuid> = self.slots.iter().map(|entry| *entry.key()).collect();

        for id in ids {
            self.fail(id, error());
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Per-`request_id` streaming channels, used for file downloads where a
/// single request yields many `FILE_DATA` messages rather than one reply.
pub struct ResponseStreams {
    slots: DashMap<Uuid, tokio::sync::mpsc::UnboundedSender<Message>>,
}

impl Default for ResponseStreams {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseStreams {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    pub fn register(&self, request_id: Uuid) -> tokio::sync::mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        if self.slots.insert(request_id, tx).is_some() {
            panic!("duplicate response stream for request_id {request_id}");
        }

        rx
    }

    /// Deliver `message` to the registered stream for `request_id`.
    /// Returns `false` if no stream is registered for that id.
    pub fn deliver(&self, request_id: Uuid, message: Message) -> bool {
        match self.slots.get(&request_id) {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    pub fn remove(&self, request_id: Uuid) {
        self.slots.remove(&request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_id() -> Uuid {
        Uuid::new_v4()
    }

    #[tokio::test]
    async fn complete_delivers_to_the_registered_receiver() {
        let pending = PendingResponses::new();
        let id = request_id();
        let rx = pending.register(id);

        assert!(pending.complete(id, Message::AuthSuccess));

        let result = rx.await.unwrap();
        assert!(matches!(result, Ok(Message::AuthSuccess)));
    }

    #[tokio::test]
    async fn completing_an_unknown_id_is_a_no_op() {
        let pending = PendingResponses::new();
        assert!(!pending.complete(request_id(), Message::AuthSuccess));
    }

    #[tokio::test]
    async fn fail_all_drains_every_slot() {
        let pending = PendingResponses::new();
        let a = pending.register(request_id());
        let b = pending.register(request_id());

        pending.fail_all(|| Error::ConnectionClosed);

        assert!(pending.is_empty());
        assert!(matches!(a.await.unwrap(), Err(Error::ConnectionClosed)));
        assert!(matches!(b.await.unwrap(), Err(Error::ConnectionClosed)));
    }
}
