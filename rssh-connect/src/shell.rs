//! The shell-command RPC façade: one request, one correlated response.

use uuid::Uuid;

use rssh::protocol::Message;
use rssh::Pipe;

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};

/// The result of running one command on the peer.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Runs shell commands against a peer, tracking the remote working
/// directory across calls the way an interactive shell would.
pub struct ShellEngine<S: Pipe> {
    dispatcher: Dispatcher<S>,
    cwd: std::sync::Mutex<String>,
}

impl<S: Pipe> ShellEngine<S> {
    pub fn new(dispatcher: Dispatcher<S>, initial_cwd: impl Into<String>) -> Self {
        Self {
            dispatcher,
            cwd: std::sync::Mutex::new(initial_cwd.into()),
        }
    }

    pub fn cwd(&self) -> String {
        self.cwd.lock().expect("cwd mutex poisoned").clone()
    }

    /// Run `command` in the tracked working directory and wait for its result.
    pub async fn run(&self, command: &str) -> Result<ShellOutput> {
        let request_id = Uuid::new_v4();
        let cwd = self.cwd();
        let rx = self.dispatcher.pending().register(request_id);

        self.dispatcher
            .send(&Message::ShellCommand {
                command: command.to_string(),
                cwd,
                request_id,
            })
            .await?;

        let message = rx.await.map_err(|_| Error::ConnectionClosed)??;

        match message {
            Message::ShellResult {
                stdout,
                stderr,
                exit_code,
                cwd,
                ..
            } => {
                if !cwd.is_empty() {
                    *self.cwd.lock().expect("cwd mutex poisoned") = cwd;
                }
                Ok(ShellOutput {
                    stdout,
                    stderr,
                    exit_code,
                })
            }
            Message::Error { message, .. } => Err(Error::RequestFailure(message)),
            other => Err(Error::RequestFailure(format!(
                "unexpected reply to a shell command: {other:?}"
            ))),
        }
    }
}
