//! A demo `rssh` client: connects, authenticates with a password, and
//! drives one of a handful of actions against the server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpStream;

use rssh::session::client::{self, Credentials};
use rssh::session::ClientConfig;
use rssh_connect::Connect;

#[derive(Debug, Parser)]
struct Args {
    /// Address of the server to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port of the server to connect to.
    #[arg(short, long)]
    port: u16,

    /// Path to the pinned server host public key.
    #[arg(long, default_value = "host_key.pub")]
    trust_store: PathBuf,

    /// Username to authenticate as.
    #[arg(long, default_value = "demo")]
    username: String,

    /// Password to authenticate with.
    #[arg(long, default_value = "demo")]
    password: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Run a single shell command on the peer.
    Shell { command: String },
    /// Upload a local file to the peer.
    Upload {
        local_path: PathBuf,
        target_path: String,
    },
    /// Download a file from the peer.
    Download {
        filename: String,
        local_path: PathBuf,
    },
    /// Bind a local port and forward connections to a peer-side address.
    LocalForward { lport: u16, rhost: String, rport: u16 },
    /// Ask the peer to listen on a port and forward connections here.
    RemoteForward { rport: u16, lhost: String, lport: u16 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();
    let config = ClientConfig::new(&args.trust_store);

    let stream = TcpStream::connect((args.host.as_str(), args.port)).await?;
    let session = client::connect(
        stream,
        &config,
        &args.username,
        Credentials::Password(args.password.clone()),
    )
    .await?;

    tracing::info!("session established");
    let connect = Connect::client(session);

    match args.action {
        Action::Shell { command } => {
            let output = connect.shell().run(&command).await?;
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            std::process::exit(output.exit_code);
        }
        Action::Upload {
            local_path,
            target_path,
        } => {
            let data = tokio::fs::read(&local_path).await?;
            let filename = local_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            connect.transfer().upload(&filename, &target_path, &data).await?;
            tracing::info!(bytes = data.len(), "upload complete");
        }
        Action::Download {
            filename,
            local_path,
        } => {
            let data = connect.transfer().download(&filename).await?;
            tokio::fs::write(&local_path, &data).await?;
            tracing::info!(bytes = data.len(), "download complete");
        }
        Action::LocalForward { lport, rhost, rport } => {
            connect.local_forward(lport, &rhost, rport).await?;
            tracing::info!(lport, %rhost, rport, "forwarding; press ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
        }
        Action::RemoteForward { rport, lhost, lport } => {
            connect.remote_forward(rport, &lhost, lport).await?;
            tracing::info!(rport, %lhost, lport, "forwarding; press ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
        }
    }

    connect.shutdown();
    Ok(())
}
