//! The single reader loop described in §4.5: owns the session's [`Codec`]
//! after the handshake, routes replies to whichever registry is awaiting
//! them, and services the peer's inbound requests through a [`RequestHandler`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use rssh::protocol::{FileAckStatus, Message, PortForwardKind};
use rssh::{Codec, Pipe, Session, Side, State};

use crate::chunking::file_data_messages;
use crate::error::Result;
use crate::events::Events;
use crate::handler::RequestHandler;
use crate::pending::{PendingResponses, ResponseStreams};
use crate::portforward::{serve_forward_listener, ForwardChannels, InboundForwardRequest};

struct PendingUpload {
    filename: String,
    target_path: String,
    buf: Vec<u8>,
}

/// A shareable handle onto one session's dispatch state.
///
/// Cloning is cheap: every field is an `Arc`. The background [`run`] task
/// owns the only reader; any number of clones may call [`Dispatcher::send`]
/// concurrently, serialized by the codec's writer lock.
pub struct Dispatcher<S: Pipe> {
    codec: Arc<Codec<S>>,
    pending: Arc<PendingResponses>,
    streams: Arc<ResponseStreams>,
    channels: Arc<ForwardChannels>,
    events: Arc<dyn Events>,
}

impl<S: Pipe> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            pending: Arc::clone(&self.pending),
            streams: Arc::clone(&self.streams),
            channels: Arc::clone(&self.channels),
            events: Arc::clone(&self.events),
        }
    }
}

impl<S: Pipe> Dispatcher<S> {
    /// Take ownership of a handshake-complete session and start its reader
    /// loop in the background.
    ///
    /// Returns the dispatcher handle, its reader task's join handle, and a
    /// stream of inbound-forward dial requests for the caller to pump into
    /// [`crate::portforward::serve_inbound_forwards`].
    pub fn spawn(
        session: Session<S>,
        events: Arc<dyn Events>,
        handler: Arc<dyn RequestHandler>,
    ) -> (Self, JoinHandle<()>, mpsc::UnboundedReceiver<InboundForwardRequest>) {
        assert_eq!(
            session.state(),
            State::ServiceActive,
            "a dispatcher only takes over a session once the service is active"
        );

        let side = session.side();
        let codec = Arc::new(session.into_codec());

        let dispatcher = Self {
            codec,
            pending: Arc::new(PendingResponses::new()),
            streams: Arc::new(ResponseStreams::new()),
            channels: Arc::new(ForwardChannels::new()),
            events,
        };

        let (forward_tx, forward_rx) = mpsc::unbounded_channel();

        let loop_dispatcher = dispatcher.clone();
        let join = tokio::spawn(async move {
            run(loop_dispatcher, side, handler, forward_tx).await;
        });

        (dispatcher, join, forward_rx)
    }

    pub fn pending(&self) -> &PendingResponses {
        &self.pending
    }

    pub fn streams(&self) -> &ResponseStreams {
        &self.streams
    }

    pub fn channels(&self) -> &ForwardChannels {
        &self.channels
    }

    /// Encode and send a message, transparently serialized with every other
    /// concurrent sender by the codec's writer lock.
    pub async fn send(&self, message: &Message) -> Result<()> {
        self.codec.send(&message.encode()).await?;
        Ok(())
    }
}

async fn run<S: Pipe>(
    dispatcher: Dispatcher<S>,
    side: Side,
    handler: Arc<dyn RequestHandler>,
    forward_tx: mpsc::UnboundedSender<InboundForwardRequest>,
) {
    let mut uploads: HashMap<Uuid, PendingUpload> = HashMap::new();

    loop {
        let bytes = match dispatcher.codec.receive().await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(%err, "session reader loop ending");
                break;
            }
        };

        let message = match Message::decode(&bytes) {
            Ok(message) => message,
            Err(err) => {
                dispatcher.events.on_error(&err.to_string());
                continue;
            }
        };

        route(&dispatcher, side, &handler, &forward_tx, &mut uploads, message).await;
    }

    dispatcher.pending.fail_all(|| crate::error::Error::ConnectionClosed);
    dispatcher.channels.close_all();
    dispatcher.events.on_state_change(State::Closed);
}

async fn route<S: Pipe>(
    dispatcher: &Dispatcher<S>,
    side: Side,
    handler: &Arc<dyn RequestHandler>,
    forward_tx: &mpsc::UnboundedSender<InboundForwardRequest>,
    uploads: &mut HashMap<Uuid, PendingUpload>,
    message: Message,
) {
    match message {
        Message::ShellResult { request_id, .. } => {
            dispatcher.pending.complete(request_id, message);
        }

        Message::ShellCommand {
            command,
            cwd,
            request_id,
        } => {
            let outcome = handler.run_shell(&command, &cwd).await;
            let _ = dispatcher
                .send(&Message::ShellResult {
                    stdout: outcome.stdout,
                    stderr: outcome.stderr,
                    exit_code: outcome.exit_code,
                    cwd: outcome.cwd,
                    request_id,
                })
                .await;
        }

        Message::FileUploadRequest {
            filename,
            file_size,
            target_path,
            request_id,
        } => {
            uploads.insert(
                request_id,
                PendingUpload {
                    filename,
                    target_path,
                    buf: Vec::with_capacity(file_size as usize),
                },
            );
            let _ = dispatcher
                .send(&Message::FileAck {
                    request_id,
                    status: FileAckStatus::Ready,
                    message: None,
                })
                .await;
        }

        Message::FileAck { request_id, .. } => {
            dispatcher.pending.complete(request_id, message);
        }

        Message::FileDownloadRequest {
            filename,
            request_id,
        } => {
            match handler.send_download(&filename).await {
                Ok(data) => send_file_chunks(dispatcher, &filename, request_id, data).await,
                Err(reason) => {
                    let _ = dispatcher
                        .send(&Message::Error {
                            request_id: Some(request_id),
                            message: reason,
                        })
                        .await;
                }
            }
        }

        Message::FileData {
            request_id,
            ref data,
            is_last,
            ..
        } => {
            if let Some(upload) = uploads.get_mut(&request_id) {
                upload.buf.extend_from_slice(data);

                if is_last {
                    let upload = uploads.remove(&request_id).expect("just looked up");
                    let result = handler
                        .receive_upload(&upload.filename, &upload.target_path, upload.buf)
                        .await;

                    let ack = match result {
                        Ok(()) => Message::FileAck {
                            request_id,
                            status: FileAckStatus::Completed,
                            message: None,
                        },
                        Err(reason) => Message::FileAck {
                            request_id,
                            status: FileAckStatus::Failed,
                            message: Some(reason),
                        },
                    };
                    let _ = dispatcher.send(&ack).await;
                }
            } else {
                dispatcher.streams.deliver(request_id, message);
            }
        }

        Message::PortForwardRequest {
            kind,
            source_port,
            dest_host,
            dest_port,
            connection_id,
        } => match (side, kind) {
            (Side::Server, PortForwardKind::Remote) => {
                let bind_result = TcpListener::bind(("0.0.0.0", source_port)).await;
                let success = bind_result.is_ok();
                let _ = dispatcher
                    .send(&Message::PortForwardAccept {
                        connection_id,
                        success,
                    })
                    .await;

                if let Ok(listener) = bind_result {
                    let listener_dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        if let Err(err) = serve_forward_listener(
                            listener_dispatcher,
                            listener,
                            PortForwardKind::Remote,
                            dest_host,
                            dest_port,
                        )
                        .await
                        {
                            tracing::warn!(%err, "remote forward listener ended");
                        }
                    });
                }
            }
            _ => {
                let _ = forward_tx.send(InboundForwardRequest {
                    connection_id,
                    dest_host,
                    dest_port,
                });
            }
        },

        Message::PortForwardAccept {
            connection_id,
            success,
        } => {
            dispatcher.channels.complete_accept(connection_id, success);
        }

        Message::PortForwardData { connection_id, data } => {
            if !dispatcher.channels.deliver(connection_id, data) {
                let _ = dispatcher
                    .send(&Message::PortForwardClose { connection_id })
                    .await;
                dispatcher.channels.remove(connection_id);
            }
        }

        Message::PortForwardClose { connection_id } => {
            dispatcher.channels.remove(connection_id);
        }

        Message::ReloadUsers => {
            if let Err(reason) = handler.reload_users().await {
                dispatcher.events.on_error(&reason);
            }
        }

        Message::Error { request_id, message } => match request_id {
            Some(id) => {
                let failed = dispatcher
                    .pending
                    .fail(id, crate::error::Error::RequestFailure(message.clone()));

                if !failed {
                    let delivered = dispatcher.streams.deliver(
                        id,
                        Message::Error {
                            request_id: Some(id),
                            message: message.clone(),
                        },
                    );

                    if !delivered {
                        dispatcher.events.on_error(&message);
                    }
                }
            }
            None => dispatcher.events.on_error(&message),
        },

        Message::Disconnect { reason } => {
            tracing::info!(%reason, "peer disconnected");
        }

        // Handshake-phase messages have no business appearing once the
        // dispatcher owns the session; a stray one is a protocol violation
        // from an otherwise-compliant peer, not a local bug.
        Message::KexInit { .. }
        | Message::KexReply { .. }
        | Message::AuthRequest { .. }
        | Message::AuthSuccess
        | Message::AuthFailure { .. }
        | Message::ServiceRequest { .. }
        | Message::ServiceAccept { .. } => {
            dispatcher
                .events
                .on_error("received a handshake message after the service was already active");
        }
    }
}

async fn send_file_chunks<S: Pipe>(
    dispatcher: &Dispatcher<S>,
    filename: &str,
    request_id: Uuid,
    data: Vec<u8>,
) {
    for message in file_data_messages(filename, request_id, &data) {
        if dispatcher.send(&message).await.is_err() {
            break;
        }
    }
}
