//! The bespoke wire protocol: message types and their binary encoding.

mod message;
mod wire;

pub use message::{AuthType, FileAckStatus, Message, PortForwardKind, CHUNK_SIZE};
pub use wire::{Reader, Writer};
