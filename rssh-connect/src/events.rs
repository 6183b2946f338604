//! The façade event interface UIs observe instead of reading the wire
//! directly (§9: "Multiple client/UI variants in source").

/// Observer callbacks for a running [`crate::Connect`].
///
/// All methods default to doing nothing: a consumer implements only the
/// events it cares about.
pub trait Events: Send + Sync {
    /// A chunk of shell output arrived outside a `run()` completion — reserved
    /// for future streaming output; unused by the current unary shell RPC.
    fn on_shell_output(&self, _request_id: uuid::Uuid, _data: &[u8]) {}

    /// Progress on a file transfer: bytes transferred so far, and the total
    /// if known (uploads always know it; downloads know it after the first chunk).
    fn on_transfer_progress(&self, _request_id: uuid::Uuid, _transferred: u64, _total: Option<u64>) {}

    /// A session-level error not tied to any pending request (an `ERROR`
    /// message with no `request_id`, per §10.5).
    fn on_error(&self, _message: &str) {}

    /// The session's state machine moved to a new state. The handshake
    /// transitions all happen before a dispatcher exists to observe them, so
    /// in practice this fires exactly once, with `State::Closed`, when the
    /// reader loop exits.
    fn on_state_change(&self, _state: rssh::State) {}
}

/// An [`Events`] implementation that does nothing, for callers with no UI to drive.
#[derive(Default)]
pub struct NoopEvents;

impl Events for NoopEvents {}
