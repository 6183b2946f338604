mod common;

use std::sync::Arc;

use common::TestHandler;
use rssh::protocol::CHUNK_SIZE;

/// S4 — a 20000-byte upload chunks into exactly 3 `FILE_DATA` frames
/// (8192 + 8192 + 3616), and the bytes the server stores are identical.
#[tokio::test]
async fn upload_chunks_a_twenty_thousand_byte_file_correctly() {
    let (client, server) = common::connected_pair(Arc::new(TestHandler::new())).await;

    let data = vec![7u8; 20_000];
    client
        .transfer()
        .upload("payload.bin", "/uploads/payload.bin", &data)
        .await
        .unwrap();

    let downloaded = client.transfer().download("/uploads/payload.bin").await.unwrap();
    assert_eq!(downloaded, data);
    assert_eq!((data.len() + CHUNK_SIZE - 1) / CHUNK_SIZE, 3);
    assert_eq!(data.len() % CHUNK_SIZE, 3616);

    client.shutdown();
    server.shutdown();
}

/// Property 4 — upload then download round-trips identical bytes.
#[tokio::test]
async fn upload_then_download_round_trips() {
    let handler = Arc::new(TestHandler::new());
    let (client, server) = common::connected_pair(handler).await;

    let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    client
        .transfer()
        .upload("data.bin", "/data.bin", &data)
        .await
        .unwrap();

    let downloaded = client.transfer().download("/data.bin").await.unwrap();
    assert_eq!(downloaded, data);

    client.shutdown();
    server.shutdown();
}

/// A zero-byte file round-trips as one empty, `is_last` chunk.
#[tokio::test]
async fn zero_byte_file_round_trips() {
    let handler = Arc::new(TestHandler::new());
    let (client, server) = common::connected_pair(handler).await;

    client.transfer().upload("empty", "/empty", &[]).await.unwrap();
    let downloaded = client.transfer().download("/empty").await.unwrap();
    assert!(downloaded.is_empty());

    client.shutdown();
    server.shutdown();
}

/// A file exactly a multiple of the chunk size splits evenly, with the last
/// chunk still carrying `is_last=true` and a full (not empty) payload.
#[tokio::test]
async fn file_size_exact_multiple_of_chunk_size() {
    let handler = Arc::new(TestHandler::new());
    let (client, server) = common::connected_pair(handler).await;

    let data = vec![3u8; CHUNK_SIZE * 2];
    client.transfer().upload("exact", "/exact", &data).await.unwrap();
    let downloaded = client.transfer().download("/exact").await.unwrap();
    assert_eq!(downloaded, data);

    client.shutdown();
    server.shutdown();
}

/// Downloading a file the server doesn't have surfaces as a request failure,
/// not a dropped connection.
#[tokio::test]
async fn download_of_a_missing_file_fails_without_killing_the_session() {
    let handler = Arc::new(TestHandler::new());
    let (client, server) = common::connected_pair(handler).await;

    let err = client.transfer().download("/nope").await.unwrap_err();
    assert!(matches!(err, rssh_connect::Error::RequestFailure(_)));

    // The session is still usable after a non-fatal per-request failure.
    let output = client.shell().run("pwd").await.unwrap();
    assert_eq!(output.exit_code, 0);

    client.shutdown();
    server.shutdown();
}
