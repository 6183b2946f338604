use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::io::DuplexStream;

use rssh::crypto::rsa_keys;
use rssh::session::client::{self, Credentials};
use rssh::session::server;
use rssh::session::trust::{hash_password, UserDirectory, UserRecord};
use rssh::session::{ClientConfig, ServerConfig};

use rssh_connect::{Connect, Events, NoopEvents, RequestHandler, ShellOutcome};

/// An [`Events`] implementation that records every callback it receives, for
/// asserting on what a façade consumer would have observed.
#[derive(Default)]
pub struct RecordingEvents {
    states: Mutex<Vec<rssh::State>>,
}

impl RecordingEvents {
    pub fn states(&self) -> Vec<rssh::State> {
        self.states.lock().unwrap().clone()
    }
}

impl Events for RecordingEvents {
    fn on_state_change(&self, state: rssh::State) {
        self.states.lock().unwrap().push(state);
    }
}

/// A [`RequestHandler`] backed by an in-memory file store, for exercising
/// shell/transfer services without touching the real filesystem.
#[derive(Default)]
pub struct TestHandler {
    files: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl TestHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_file(&self, name: &str, data: Vec<u8>) {
        self.files.lock().unwrap().insert(name.to_string(), data);
    }
}

#[async_trait::async_trait]
impl RequestHandler for TestHandler {
    async fn run_shell(&self, command: &str, cwd: &str) -> ShellOutcome {
        match command {
            "pwd" => ShellOutcome {
                stdout: format!("{cwd}\n"),
                stderr: String::new(),
                exit_code: 0,
                cwd: cwd.to_string(),
            },
            "cd /tmp" => ShellOutcome {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
                cwd: "/tmp".to_string(),
            },
            "false" => ShellOutcome {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 1,
                cwd: cwd.to_string(),
            },
            other => ShellOutcome {
                stdout: String::new(),
                stderr: format!("unknown command: {other}"),
                exit_code: 127,
                cwd: cwd.to_string(),
            },
        }
    }

    async fn receive_upload(&self, _filename: &str, target_path: &str, data: Vec<u8>) -> Result<(), String> {
        self.files.lock().unwrap().insert(target_path.to_string(), data);
        Ok(())
    }

    async fn send_download(&self, filename: &str) -> Result<Vec<u8>, String> {
        self.files
            .lock()
            .unwrap()
            .get(filename)
            .cloned()
            .ok_or_else(|| "no such file".to_string())
    }
}

struct OneUser {
    username: String,
    record: UserRecord,
}

impl UserDirectory for OneUser {
    fn lookup(&self, username: &str) -> Option<UserRecord> {
        (username == self.username).then(|| self.record.clone())
    }
}

/// Drives a full client/server handshake over an in-memory duplex pipe and
/// hands both ends to [`Connect`], ready to exercise shell/transfer/forward
/// operations without a real socket.
pub async fn connected_pair(handler: Arc<dyn RequestHandler>) -> (Connect<DuplexStream>, Connect<DuplexStream>) {
    connected_pair_with_events(handler, Arc::new(NoopEvents)).await
}

pub async fn connected_pair_with_events(
    handler: Arc<dyn RequestHandler>,
    client_events: Arc<dyn Events>,
) -> (Connect<DuplexStream>, Connect<DuplexStream>) {
    let id = uuid::Uuid::new_v4();
    let private_path = std::env::temp_dir().join(format!("rssh-connect-test-host-{id}.key"));
    let public_path = std::env::temp_dir().join(format!("rssh-connect-test-host-{id}.pub"));

    let private = rsa_keys::generate(&mut rand::thread_rng()).unwrap();
    let public = rsa::RsaPublicKey::from(&private);
    rsa_keys::save_private(&private_path, &private).unwrap();
    rsa_keys::save_public(&public_path, &public).unwrap();

    let trust_path = std::env::temp_dir().join(format!("rssh-connect-test-trust-{id}.pub"));
    std::fs::copy(&public_path, &trust_path).unwrap();

    let users = OneUser {
        username: "alice".into(),
        record: UserRecord {
            password_hash: hash_password("p"),
            authorized_keys: Vec::new(),
        },
    };

    let (client_io, server_io) = tokio::io::duplex(1024 * 1024);

    let server_config = ServerConfig::new(&private_path, &public_path);
    let server_task = tokio::spawn(async move { server::accept(server_io, &server_config, &users).await });

    let client_config = ClientConfig::new(&trust_path);
    let client_session = client::connect(
        client_io,
        &client_config,
        "alice",
        Credentials::Password("p".into()),
    )
    .await
    .expect("client handshake should succeed");

    let server_session = server_task
        .await
        .expect("server task should not panic")
        .expect("server handshake should succeed");

    let _ = std::fs::remove_file(&private_path);
    let _ = std::fs::remove_file(&public_path);
    let _ = std::fs::remove_file(&trust_path);

    let client_connect = Connect::with_events(client_session, client_events);
    let server_connect = Connect::server(server_session, handler);

    (client_connect, server_connect)
}
