//! A demo `rssh` server: accepts connections, authenticates against a
//! single configured user, and services shell commands and file transfer
//! against the local filesystem.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use async_trait::async_trait;
use rssh::crypto::rsa_keys;
use rssh::session::trust::{hash_password, UserDirectory, UserRecord};
use rssh::session::ServerConfig;
use rssh_connect::handler::{RequestHandler, ShellOutcome};
use rssh_connect::Connect;

#[derive(Debug, Parser)]
struct Args {
    /// Address to bind the listener on.
    #[arg(short, long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind the listener on.
    #[arg(short, long)]
    port: u16,

    /// Path to the RSA host private key; generated on first run if absent.
    #[arg(long, default_value = "host_key")]
    host_private_key: PathBuf,

    /// Path to the RSA host public key; generated on first run if absent.
    #[arg(long, default_value = "host_key.pub")]
    host_public_key: PathBuf,

    /// The single demo account's username.
    #[arg(long, default_value = "demo")]
    username: String,

    /// The single demo account's password.
    #[arg(long, default_value = "demo")]
    password: String,
}

/// A fixed, single-user directory: enough to exercise authentication
/// without standing up a real user store.
struct StaticUsers {
    users: HashMap<String, UserRecord>,
}

impl UserDirectory for StaticUsers {
    fn lookup(&self, username: &str) -> Option<UserRecord> {
        self.users.get(username).cloned()
    }
}

/// Runs shell commands and serves file transfer against the process's
/// actual filesystem and working directory. A real deployment would sandbox
/// this; the demo trusts whoever already authenticated.
struct LocalHandler;

#[async_trait]
impl RequestHandler for LocalHandler {
    async fn run_shell(&self, command: &str, cwd: &str) -> ShellOutcome {
        let dir = if cwd.is_empty() { "." } else { cwd };

        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(dir)
            .output()
            .await;

        match output {
            Ok(output) => ShellOutcome {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(-1),
                cwd: dir.to_string(),
            },
            Err(err) => ShellOutcome {
                stdout: String::new(),
                stderr: err.to_string(),
                exit_code: -1,
                cwd: dir.to_string(),
            },
        }
    }

    async fn receive_upload(
        &self,
        _filename: &str,
        target_path: &str,
        data: Vec<u8>,
    ) -> Result<(), String> {
        tokio::fs::write(target_path, data)
            .await
            .map_err(|err| err.to_string())
    }

    async fn send_download(&self, filename: &str) -> Result<Vec<u8>, String> {
        tokio::fs::read(filename).await.map_err(|err| err.to_string())
    }
}

fn load_or_generate_host_keys(args: &Args) -> rssh::Result<()> {
    if args.host_private_key.exists() && args.host_public_key.exists() {
        return Ok(());
    }

    tracing::info!("generating a fresh host key pair");
    let private = rsa_keys::generate(&mut rand::thread_rng())?;
    let public = rsa::RsaPublicKey::from(&private);

    rsa_keys::save_private(&args.host_private_key, &private)?;
    rsa_keys::save_public(&args.host_public_key, &public)?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();
    load_or_generate_host_keys(&args)?;

    let config = ServerConfig::new(&args.host_private_key, &args.host_public_key);

    let mut users = HashMap::new();
    users.insert(
        args.username.clone(),
        UserRecord {
            password_hash: hash_password(&args.password),
            authorized_keys: Vec::new(),
        },
    );
    let users: Arc<dyn UserDirectory> = Arc::new(StaticUsers { users });

    let listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let config = config.clone();
        let users = Arc::clone(&users);

        tokio::spawn(async move {
            let session = match rssh::session::server::accept(stream, &config, users.as_ref()).await {
                Ok(session) => session,
                Err(err) => {
                    tracing::warn!(%peer, %err, "handshake failed");
                    return;
                }
            };

            tracing::info!(%peer, "session established");
            let connect = Connect::server(session, Arc::new(LocalHandler));

            // Hold the connection open; the dispatcher's reader loop drives it.
            std::future::pending::<()>().await;
            connect.shutdown();
        });
    }
}
