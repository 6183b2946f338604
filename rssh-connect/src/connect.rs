//! The top-level façade: wires a handshake-complete [`Session`] to a
//! [`Dispatcher`] and the engines built on it.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use rssh::protocol::PortForwardKind;
use rssh::{Pipe, Session};

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::events::{Events, NoopEvents};
use crate::handler::{NoopRequestHandler, RequestHandler};
use crate::portforward::{request_remote_forward, serve_forward_listener, serve_inbound_forwards};
use crate::shell::ShellEngine;
use crate::transfer::TransferEngine;

/// A connected session with its channel multiplexing running in the
/// background: shell RPC, file transfer, and port forwarding all share one
/// [`Dispatcher`].
pub struct Connect<S: Pipe> {
    dispatcher: Dispatcher<S>,
    shell: ShellEngine<S>,
    transfer: TransferEngine<S>,
    reader_task: JoinHandle<()>,
    forward_task: JoinHandle<()>,
}

impl<S: Pipe> Connect<S> {
    /// Take over a handshake-complete client session. The client never
    /// services inbound requests of its own, so it runs with a
    /// [`NoopRequestHandler`].
    pub fn client(session: Session<S>) -> Self {
        Self::with_events(session, Arc::new(NoopEvents))
    }

    pub fn with_events(session: Session<S>, events: Arc<dyn Events>) -> Self {
        Self::new(session, events, Arc::new(NoopRequestHandler))
    }

    /// Take over a handshake-complete server session, servicing inbound
    /// requests through `handler`.
    pub fn server(session: Session<S>, handler: Arc<dyn RequestHandler>) -> Self {
        Self::new(session, Arc::new(NoopEvents), handler)
    }

    pub fn new(session: Session<S>, events: Arc<dyn Events>, handler: Arc<dyn RequestHandler>) -> Self {
        let cwd = session.cwd.clone();
        let (dispatcher, reader_task, forward_rx) = Dispatcher::spawn(session, events.clone(), handler);

        let forward_dispatcher = dispatcher.clone();
        let forward_task = tokio::spawn(serve_inbound_forwards(forward_dispatcher, forward_rx));

        let shell = ShellEngine::new(dispatcher.clone(), cwd);
        let transfer = TransferEngine::new(dispatcher.clone(), events);

        Self {
            dispatcher,
            shell,
            transfer,
            reader_task,
            forward_task,
        }
    }

    pub fn shell(&self) -> &ShellEngine<S> {
        &self.shell
    }

    pub fn transfer(&self) -> &TransferEngine<S> {
        &self.transfer
    }

    /// Bind `lport` locally and forward each connection to `rhost:rport` on the peer.
    pub async fn local_forward(&self, lport: u16, rhost: &str, rport: u16) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", lport)).await?;
        let dispatcher = self.dispatcher.clone();
        let rhost = rhost.to_string();

        tokio::spawn(async move {
            if let Err(err) =
                serve_forward_listener(dispatcher, listener, PortForwardKind::Local, rhost, rport).await
            {
                tracing::warn!(%err, "local forward listener ended");
            }
        });

        Ok(())
    }

    /// Ask the peer to listen on `rport` and forward each connection it
    /// accepts to `lhost:lport` locally.
    pub async fn remote_forward(&self, rport: u16, lhost: &str, lport: u16) -> Result<()> {
        request_remote_forward(&self.dispatcher, rport, lhost, lport).await
    }

    /// Tear down the background reader and forward-dial tasks. Any requests
    /// still pending are failed with [`crate::error::Error::ConnectionClosed`].
    pub fn shutdown(self) {
        self.reader_task.abort();
        self.forward_task.abort();
    }
}
