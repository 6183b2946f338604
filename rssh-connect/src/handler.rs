//! Server-side callbacks for the inbound service requests a [`crate::Dispatcher`]
//! cannot answer by itself: shell execution, file storage, and the user
//! directory reload. A client implements none of this and runs with
//! [`NoopRequestHandler`].

use async_trait::async_trait;

/// The result of running one shell command.
pub struct ShellOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// The working directory after the command runs (e.g. following a `cd`).
    pub cwd: String,
}

/// Injected server behavior. Every method defaults to reporting the service
/// as unsupported, so a server only wires up what it actually offers.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn run_shell(&self, _command: &str, cwd: &str) -> ShellOutcome {
        ShellOutcome {
            stdout: String::new(),
            stderr: "this server does not support shell commands".into(),
            exit_code: -1,
            cwd: cwd.to_string(),
        }
    }

    /// Called once a full upload has been reassembled from its chunks.
    async fn receive_upload(
        &self,
        _filename: &str,
        _target_path: &str,
        _data: Vec<u8>,
    ) -> Result<(), String> {
        Err("this server does not support file uploads".into())
    }

    async fn send_download(&self, _filename: &str) -> Result<Vec<u8>, String> {
        Err("this server does not support file downloads".into())
    }

    async fn reload_users(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A [`RequestHandler`] that declines every service, for clients (which
/// never receive these requests) and for servers with nothing configured yet.
#[derive(Default)]
pub struct NoopRequestHandler;

impl RequestHandler for NoopRequestHandler {}
