mod common;

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use common::TestHandler;

/// Bind an ephemeral port and hand back its number, freeing the listener
/// immediately — good enough for a test that reuses the number right away.
async fn free_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Runs a single-shot TCP echo server on `port`: accepts one connection,
/// echoes everything it reads back until EOF.
async fn spawn_echo_server(port: u16) {
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if socket.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// S5 — a local forward relays bytes written to the bound local port through
/// to the peer-named destination (here, an echo server), verbatim and in order.
#[tokio::test]
async fn local_forward_relays_bytes_to_the_remote_destination() {
    let (client, server) = common::connected_pair(Arc::new(TestHandler::new())).await;

    let dest_port = free_port().await;
    spawn_echo_server(dest_port).await;

    let local_port = free_port().await;
    client
        .local_forward(local_port, "127.0.0.1", dest_port)
        .await
        .unwrap();

    // Give the listener task a moment to actually bind before dialing it.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut conn = TcpStream::connect(("127.0.0.1", local_port)).await.unwrap();
    conn.write_all(b"hello through the tunnel").await.unwrap();

    let mut buf = vec![0u8; 64];
    let n = conn.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"hello through the tunnel");

    client.shutdown();
    server.shutdown();
}

/// S5 variant — multiple forwarded connections on the same local forward are
/// each carried on their own channel without mixing bytes.
#[tokio::test]
async fn local_forward_keeps_concurrent_connections_separate() {
    let (client, server) = common::connected_pair(Arc::new(TestHandler::new())).await;

    let dest_port = free_port().await;
    spawn_echo_server(dest_port).await;
    spawn_echo_server(dest_port + 1).await;

    // Two local forwards to two distinct destinations on the same session.
    let local_a = free_port().await;
    client.local_forward(local_a, "127.0.0.1", dest_port).await.unwrap();
    let local_b = free_port().await;
    client
        .local_forward(local_b, "127.0.0.1", dest_port + 1)
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut conn_a = TcpStream::connect(("127.0.0.1", local_a)).await.unwrap();
    let mut conn_b = TcpStream::connect(("127.0.0.1", local_b)).await.unwrap();

    conn_a.write_all(b"aaaa").await.unwrap();
    conn_b.write_all(b"bbbb").await.unwrap();

    let mut buf_a = vec![0u8; 16];
    let n_a = conn_a.read(&mut buf_a).await.unwrap();
    let mut buf_b = vec![0u8; 16];
    let n_b = conn_b.read(&mut buf_b).await.unwrap();

    assert_eq!(&buf_a[..n_a], b"aaaa");
    assert_eq!(&buf_b[..n_b], b"bbbb");

    client.shutdown();
    server.shutdown();
}

/// Remote forward: the server listens on behalf of the client and relays
/// each inbound connection back over a fresh channel to a local destination.
#[tokio::test]
async fn remote_forward_relays_bytes_back_to_the_client_side_destination() {
    let (client, server) = common::connected_pair(Arc::new(TestHandler::new())).await;

    let dest_port = free_port().await;
    spawn_echo_server(dest_port).await;

    let remote_port = free_port().await;
    client
        .remote_forward(remote_port, "127.0.0.1", dest_port)
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut conn = TcpStream::connect(("127.0.0.1", remote_port)).await.unwrap();
    conn.write_all(b"remote round trip").await.unwrap();

    let mut buf = vec![0u8; 64];
    let n = conn.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"remote round trip");

    client.shutdown();
    server.shutdown();
}
