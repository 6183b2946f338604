//! TCP port forwarding: local (`L:lport -> rhost:rport`) and remote
//! (`R:rport -> lhost:lport`), multiplexed as forwarded channels over the
//! session.
//!
//! Both directions reduce to the same shape once the listening side has a
//! live local socket in hand: open a channel, ask the peer to dial the named
//! destination, and drive bytes between the socket and the channel until
//! either side closes. [`serve_forward_listener`] runs that loop for a bound
//! [`TcpListener`] (used by a client for `L:` and by a server for `R:`);
//! [`serve_inbound_forwards`] runs the dial-out half of it (used by a server
//! for `L:` and by a client for `R:`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use rssh::protocol::{Message, PortForwardKind, CHUNK_SIZE};

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};

/// Per-channel backpressure bound (§4.5): past this many buffered, undelivered
/// bytes the channel is torn down rather than let the dispatcher block.
pub const FORWARD_CHANNEL_BYTE_CAP: usize = 8 * 1024 * 1024;
/// How long a `PORT_FORWARD_REQUEST` waits for its accept/reject.
pub const FORWARD_ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

/// A peer-issued request to dial a destination locally and forward the
/// resulting connection over a fresh channel. Covers two symmetric cases:
/// a server asked to dial out for a client's `L:` forward, and a client
/// asked to dial out for a fresh connection on a server's `R:` listener.
pub struct InboundForwardRequest {
    pub connection_id: Uuid,
    pub dest_host: String,
    pub dest_port: u16,
}

struct OpenChannel {
    data_tx: mpsc::UnboundedSender<Vec<u8>>,
    buffered: Arc<AtomicUsize>,
}

/// The registry of open forwarded channels and pending forward-accepts for
/// one session, owned by the [`Dispatcher`].
#[derive(Default)]
pub struct ForwardChannels {
    open: DashMap<Uuid, OpenChannel>,
    accepts: DashMap<Uuid, oneshot::Sender<bool>>,
}

impl ForwardChannels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_accept(&self, connection_id: Uuid) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        self.accepts.insert(connection_id, tx);
        rx
    }

    pub fn complete_accept(&self, connection_id: Uuid, success: bool) {
        if let Some((_, tx)) = self.accepts.remove(&connection_id) {
            let _ = tx.send(success);
        }
    }

    /// Open a new channel, returning the receiver a local-socket writer task drains.
    pub fn open(&self, connection_id: Uuid) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (data_tx, rx) = mpsc::unbounded_channel();
        self.open.insert(
            connection_id,
            OpenChannel {
                data_tx,
                buffered: Arc::new(AtomicUsize::new(0)),
            },
        );

        rx
    }

    /// Deliver inbound wire data to the channel's local-socket writer.
    /// Returns `false` if the byte budget was exceeded, in which case the
    /// caller must close the channel; an unknown `connection_id` is a no-op
    /// (the channel may have just closed) and returns `true`.
    pub fn deliver(&self, connection_id: Uuid, data: Vec<u8>) -> bool {
        let Some(channel) = self.open.get(&connection_id) else {
            return true;
        };

        let len = data.len();
        let buffered = channel.buffered.fetch_add(len, Ordering::SeqCst) + len;

        if buffered > FORWARD_CHANNEL_BYTE_CAP {
            channel.buffered.fetch_sub(len, Ordering::SeqCst);
            return false;
        }

        channel.data_tx.send(data).is_ok()
    }

    pub fn mark_written(&self, connection_id: Uuid, len: usize) {
        if let Some(channel) = self.open.get(&connection_id) {
            channel.buffered.fetch_sub(len, Ordering::SeqCst);
        }
    }

    pub fn remove(&self, connection_id: Uuid) {
        self.open.remove(&connection_id);
    }

    /// Close every open channel and fail every pending accept, on session close.
    pub fn close_all(&self) {
        self.open.clear();

        let ids: Vec<Uuid> = self.accepts.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.accepts.remove(&id) {
                let _ = tx.send(false);
            }
        }
    }
}

/// Accept loop for a bound listener: for each inbound connection, open a
/// channel and ask the peer to dial `dest_host:dest_port`.
pub async fn serve_forward_listener<S: rssh::Pipe>(
    dispatcher: Dispatcher<S>,
    listener: TcpListener,
    kind: PortForwardKind,
    dest_host: String,
    dest_port: u16,
) -> Result<()> {
    loop {
        let (socket, _) = listener.accept().await?;
        let dispatcher = dispatcher.clone();
        let dest_host = dest_host.clone();

        tokio::spawn(async move {
            let connection_id = Uuid::new_v4();
            let source_port = socket.local_addr().map(|addr| addr.port()).unwrap_or(0);

            let inbound = match open_forward_channel(
                &dispatcher,
                connection_id,
                source_port,
                kind,
                &dest_host,
                dest_port,
            )
            .await
            {
                Ok(inbound) => inbound,
                Err(err) => {
                    tracing::warn!(%err, "forwarded connection rejected by peer");
                    dispatcher.channels().remove(connection_id);
                    return;
                }
            };

            if let Err(err) = drive(dispatcher, connection_id, socket, inbound).await {
                tracing::warn!(%err, "forwarded channel ended with an error");
            }
        });
    }
}

async fn open_forward_channel<S: rssh::Pipe>(
    dispatcher: &Dispatcher<S>,
    connection_id: Uuid,
    source_port: u16,
    kind: PortForwardKind,
    dest_host: &str,
    dest_port: u16,
) -> Result<mpsc::UnboundedReceiver<Vec<u8>>> {
    let accept_rx = dispatcher.channels().register_accept(connection_id);
    let inbound = dispatcher.channels().open(connection_id);

    dispatcher
        .send(&Message::PortForwardRequest {
            kind,
            source_port,
            dest_host: dest_host.to_string(),
            dest_port,
            connection_id,
        })
        .await?;

    let accepted = tokio::time::timeout(FORWARD_ACCEPT_TIMEOUT, accept_rx)
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|_| Error::ConnectionClosed)?;

    if accepted {
        Ok(inbound)
    } else {
        Err(Error::RequestFailure("peer refused port forward".into()))
    }
}

/// Ask the peer to start listening on `rport` and forward each inbound
/// connection it accepts to `lhost:lport` on this side.
pub async fn request_remote_forward<S: rssh::Pipe>(
    dispatcher: &Dispatcher<S>,
    rport: u16,
    lhost: &str,
    lport: u16,
) -> Result<()> {
    let request_id = Uuid::new_v4();
    let accept_rx = dispatcher.channels().register_accept(request_id);

    dispatcher
        .send(&Message::PortForwardRequest {
            kind: PortForwardKind::Remote,
            source_port: rport,
            dest_host: lhost.to_string(),
            dest_port: lport,
            connection_id: request_id,
        })
        .await?;

    let accepted = tokio::time::timeout(FORWARD_ACCEPT_TIMEOUT, accept_rx)
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|_| Error::ConnectionClosed)?;

    if accepted {
        Ok(())
    } else {
        Err(Error::RequestFailure(
            "peer could not bind the remote forward port".into(),
        ))
    }
}

/// Drain [`InboundForwardRequest`]s and, for each, dial the named local
/// destination, accept or refuse the resulting channel, and drive it until
/// it closes. Used both by a server serving a client's `L:` dial-outs and by
/// a client serving a server's `R:` listener's notifications.
pub async fn serve_inbound_forwards<S: rssh::Pipe>(
    dispatcher: Dispatcher<S>,
    mut requests: mpsc::UnboundedReceiver<InboundForwardRequest>,
) {
    while let Some(request) = requests.recv().await {
        let dispatcher = dispatcher.clone();

        tokio::spawn(async move {
            let connection_id = request.connection_id;

            let socket =
                match TcpStream::connect((request.dest_host.as_str(), request.dest_port)).await {
                    Ok(socket) => socket,
                    Err(err) => {
                        tracing::warn!(%err, "forward target refused connection");
                        let _ = dispatcher
                            .send(&Message::PortForwardAccept {
                                connection_id,
                                success: false,
                            })
                            .await;
                        return;
                    }
                };

            let inbound = dispatcher.channels().open(connection_id);

            if dispatcher
                .send(&Message::PortForwardAccept {
                    connection_id,
                    success: true,
                })
                .await
                .is_err()
            {
                return;
            }

            if let Err(err) = drive(dispatcher, connection_id, socket, inbound).await {
                tracing::warn!(%err, "forwarded channel ended with an error");
            }
        });
    }
}

/// Pump data between `socket` and the wire for an already-open channel,
/// until either side observes EOF, at which point it sends `PORT_FORWARD_CLOSE`.
async fn drive<S: rssh::Pipe>(
    dispatcher: Dispatcher<S>,
    connection_id: Uuid,
    socket: TcpStream,
    mut inbound: mpsc::UnboundedReceiver<Vec<u8>>,
) -> Result<()> {
    let (mut read_half, mut write_half) = socket.into_split();
    let write_dispatcher = dispatcher.clone();

    let writer = tokio::spawn(async move {
        while let Some(data) = inbound.recv().await {
            let len = data.len();
            if write_half.write_all(&data).await.is_err() {
                break;
            }
            write_dispatcher.channels().mark_written(connection_id, len);
        }
    });

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let sent = dispatcher
                    .send(&Message::PortForwardData {
                        connection_id,
                        data: buf[..n].to_vec(),
                    })
                    .await;

                if sent.is_err() {
                    break;
                }
            }
        }
    }

    let _ = dispatcher
        .send(&Message::PortForwardClose { connection_id })
        .await;
    dispatcher.channels().remove(connection_id);
    writer.abort();

    Ok(())
}
