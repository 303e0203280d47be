use crate::*;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use zerocopy::AsBytes;

use netsort_core::{Frame, FRAME_ACK, FRAME_LEN};

/// Stand-in for a peer's listener: accept frames, read each in full, ack.
async fn fake_peer(listener: TcpListener) {
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        tokio::spawn(async move {
            let mut buf = [0u8; FRAME_LEN];
            if stream.read_exact(&mut buf).await.is_ok() {
                let _ = stream.write_all(&[FRAME_ACK]).await;
            }
        });
    }
}

/// Topology of `size` nodes where node 0 is real and the rest are driven
/// by the test.
async fn real_node_among(size: NodeId) -> (FrameListener, Arc<ClusterTopology>, String) {
    let real = FrameListener::bind("127.0.0.1:0").await.unwrap();
    let real_port = real.local_addr().unwrap().port().to_string();
    let mut nodes = vec![NodeAddr::new(0, "127.0.0.1", real_port.clone())];
    for id in 1..size {
        let fake = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let fake_port = fake.local_addr().unwrap().port().to_string();
        tokio::spawn(fake_peer(fake));
        nodes.push(NodeAddr::new(id, "127.0.0.1", fake_port));
    }

    let topology = ClusterTopology::new(nodes).unwrap();
    (real, Arc::new(topology), format!("127.0.0.1:{real_port}"))
}

async fn half_cluster() -> (FrameListener, Arc<ClusterTopology>, String) {
    real_node_among(2).await
}

/// Write `parts` with a pause between each, then wait for the receiver to close.
async fn send_in_pieces(addr: &str, parts: &[&[u8]]) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.set_nodelay(true).unwrap();
    for part in parts {
        stream.write_all(part).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    stream.shutdown().await.unwrap();
    let mut rest = Vec::new();
    let _ = stream.read_to_end(&mut rest).await;
}

fn node_zero_record() -> Record {
    let mut key = [0x11u8; KEY_LEN];
    key[0] = 0x05;
    Record::new(key, [0xc3; PAYLOAD_LEN])
}

#[tokio::test]
async fn frame_split_across_deliveries_is_reassembled() {
    let (listener, topology, addr) = half_cluster().await;
    let sender = TcpFrameSender::from_config(&test_settings());
    let node = ShuffleNode::new(0, topology, test_settings(), sender).unwrap();
    let run = tokio::spawn(node.run(listener, Vec::new()));

    let data = Frame::data(node_zero_record());
    let bytes = data.as_bytes();
    send_in_pieces(&addr, &[&bytes[..50], &bytes[50..]]).await;
    send_in_pieces(&addr, &[Frame::done().as_bytes()]).await;

    let (output, report) = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(output.records(), &[node_zero_record()]);
    assert_eq!(report.received, 1);
}

#[tokio::test]
async fn truncated_frame_is_discarded() {
    let (listener, topology, addr) = half_cluster().await;
    let sender = TcpFrameSender::from_config(&test_settings());
    let node = ShuffleNode::new(0, topology, test_settings(), sender).unwrap();
    let run = tokio::spawn(node.run(listener, Vec::new()));

    let data = Frame::data(node_zero_record());
    let bytes = data.as_bytes();
    send_in_pieces(&addr, &[&bytes[..64]]).await;
    send_in_pieces(&addr, &[Frame::done().as_bytes()]).await;

    let (output, _) = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(output.is_empty());
}

#[tokio::test]
async fn frames_packed_on_one_connection_are_all_accepted() {
    let (listener, topology, addr) = half_cluster().await;
    let sender = TcpFrameSender::from_config(&test_settings());
    let node = ShuffleNode::new(0, topology, test_settings(), sender).unwrap();
    let run = tokio::spawn(node.run(listener, Vec::new()));

    let mut stream = Vec::new();
    for _ in 0..3 {
        stream.extend_from_slice(Frame::data(node_zero_record()).as_bytes());
    }
    stream.extend_from_slice(Frame::done().as_bytes());
    send_in_pieces(&addr, &[&stream[..150], &stream[150..]]).await;

    let (output, _) = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(output.len(), 3);
}

#[tokio::test]
async fn zeroed_completion_frames_from_each_peer_close_the_shuffle() {
    let (listener, topology, addr) = real_node_among(3).await;
    let sender = TcpFrameSender::from_config(&test_settings());
    let node = ShuffleNode::new(0, topology, test_settings(), sender).unwrap();
    let run = tokio::spawn(node.run(listener, Vec::new()));

    // Control byte 0x01 followed by a body of 100 zero bytes, as any peer sends it.
    let mut done = [0u8; FRAME_LEN];
    done[0] = 0x01;
    send_in_pieces(&addr, &[&Frame::data(node_zero_record()).as_bytes()[..]]).await;
    send_in_pieces(&addr, &[&done[..]]).await;
    send_in_pieces(&addr, &[&done[..]]).await;

    let (output, report) = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("node waited forever on anonymous completions")
        .unwrap()
        .unwrap();
    assert_eq!(output.records(), &[node_zero_record()]);
    assert_eq!(report.completions_abandoned, 0);
}

#[tokio::test]
async fn every_accepted_frame_is_acknowledged() {
    let (listener, topology, addr) = half_cluster().await;
    let sender = TcpFrameSender::from_config(&test_settings());
    let node = ShuffleNode::new(0, topology, test_settings(), sender).unwrap();
    let run = tokio::spawn(node.run(listener, Vec::new()));

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    let mut bytes = Vec::new();
    bytes.extend_from_slice(Frame::data(node_zero_record()).as_bytes());
    bytes.extend_from_slice(Frame::data(node_zero_record()).as_bytes());
    stream.write_all(&bytes).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut acks = Vec::new();
    stream.read_to_end(&mut acks).await.unwrap();
    assert_eq!(acks, vec![FRAME_ACK, FRAME_ACK]);

    send_in_pieces(&addr, &[Frame::done().as_bytes()]).await;
    let (output, _) = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(output.len(), 2);
}
