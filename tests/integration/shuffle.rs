use crate::*;

use netsort_core::destination;

/// Every record ends up at its owner, exactly once, and every node's output
/// is sorted.
async fn check_cluster(nodes: usize, per_node: usize) {
    let shards: Vec<Vec<Record>> = (0..nodes).map(|_| random_records(per_node)).collect();
    let input = canonical(shards.iter().flatten().cloned());

    let results = run_cluster(shards).await.unwrap();
    assert_eq!(results.len(), nodes);

    let mut received = Vec::new();
    for (id, (output, report)) in results.iter().enumerate() {
        assert!(is_sorted(output.records()), "node {id} output not sorted");
        assert_eq!(report.abandoned, 0, "node {id} abandoned records");
        assert_eq!(report.unroutable, 0, "node {id} had unroutable records");
        assert_eq!(report.completions_abandoned, 0);
        assert_eq!(report.rejected_late, 0);
        assert_eq!(report.records_read, per_node);
        assert_eq!(report.received, output.len());
        for r in output.records() {
            assert_eq!(destination(&r.key, nodes), Some(id as NodeId), "record at wrong node");
        }
        received.extend(output.records().iter().cloned());
    }

    assert_eq!(canonical(received), input, "records lost or duplicated");
}

#[tokio::test]
async fn single_node_sorts_its_own_shard() {
    check_cluster(1, 200).await;
}

#[tokio::test]
async fn two_node_shuffle_conserves_records() {
    check_cluster(2, 300).await;
}

#[tokio::test]
async fn three_node_shuffle_idle_owner_still_terminates() {
    // N=3 routes with one bit, so node 2 owns nothing but must still close.
    let shards: Vec<Vec<Record>> = (0..3).map(|_| random_records(100)).collect();
    let results = run_cluster(shards).await.unwrap();
    assert!(results[2].0.is_empty());
    assert_eq!(results[0].0.len() + results[1].0.len(), 300);
}

#[tokio::test]
async fn four_node_shuffle_conserves_records() {
    check_cluster(4, 250).await;
}

#[tokio::test]
async fn empty_shards_produce_empty_outputs() {
    let results = run_cluster(vec![Vec::new(), Vec::new()]).await.unwrap();
    for (output, report) in results {
        assert!(output.is_empty());
        assert!(output.to_bytes().is_empty());
        assert_eq!(report, ShuffleReport::default());
    }
}

#[tokio::test]
async fn output_bytes_concatenate_sorted_records() {
    let results = run_cluster(vec![random_records(50), random_records(50)])
        .await
        .unwrap();
    for (output, _) in results {
        let bytes = output.to_bytes();
        assert_eq!(bytes.len(), output.len() * netsort_core::RECORD_LEN);
        for (chunk, record) in bytes.chunks(netsort_core::RECORD_LEN).zip(output.records()) {
            assert_eq!(Record::from_bytes(chunk).as_ref(), Some(record));
        }
    }
}
