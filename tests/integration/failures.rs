use crate::*;

use netsort_services::{FrameSender, SendOutcome};
use netsort_core::Frame;

/// A port with nothing listening on it.
fn dead_port() -> String {
    let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    l.local_addr().unwrap().port().to_string()
}

/// A peer that never comes up never sends its completion, and the
/// aggregation wait has no timeout: the node keeps waiting.
#[tokio::test]
async fn missing_peer_blocks_termination() {
    let listener = FrameListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port().to_string();
    let topology = Arc::new(
        ClusterTopology::new(vec![
            NodeAddr::new(0, "127.0.0.1", port),
            NodeAddr::new(1, "127.0.0.1", dead_port()),
        ])
        .unwrap(),
    );
    let settings = ShuffleConfig {
        startup_delay_ms: 0,
        connect_retries: 2,
        retry_backoff_ms: 5,
        max_in_flight: 4,
    };
    let sender = TcpFrameSender::from_config(&settings);
    let node = ShuffleNode::new(0, topology, settings, sender).unwrap();

    let run = tokio::spawn(node.run(listener, random_records(20)));
    let waited = tokio::time::timeout(Duration::from_millis(1500), async {
        while !run.is_finished() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(waited.is_err(), "node finished without its peer's completion");
    run.abort();
}

#[tokio::test]
async fn sends_to_dead_peer_are_abandoned_not_retried_forever() {
    let sender = TcpFrameSender::new(3, Duration::from_millis(5));
    let dest = NodeAddr::new(1, "127.0.0.1", dead_port());

    let started = std::time::Instant::now();
    let outcome = sender.send_frame(&dest, Frame::done()).await;
    assert!(matches!(outcome, SendOutcome::Abandoned(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}
