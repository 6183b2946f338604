mod common;

use std::sync::Arc;

use common::{RecordingEvents, TestHandler};

/// SPEC_FULL.md §9 — a façade consumer observes a `State::Closed` callback
/// once the peer closing its end causes the reader loop to exit.
#[tokio::test]
async fn peer_shutdown_fires_on_state_change_closed() {
    let events = Arc::new(RecordingEvents::default());
    let (client, server) =
        common::connected_pair_with_events(Arc::new(TestHandler::new()), events.clone()).await;

    server.shutdown();

    // Give the client's reader loop a moment to observe the closed pipe.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(events.states(), vec![rssh::State::Closed]);

    client.shutdown();
}
