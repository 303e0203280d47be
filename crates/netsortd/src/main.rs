//! netsortd: one node of a distributed shuffle-and-sort.
//!
//! Usage: netsortd <node_id> <input_path> <output_path> <topology_path>

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use netsort_core::config::NetsortConfig;
use netsort_core::{ClusterTopology, NodeId};
use netsort_services::{
    write_output, FrameListener, ShardFile, ShuffleNode, ShuffleReport, TcpFrameSender,
};

struct Args {
    node_id: NodeId,
    input: PathBuf,
    output: PathBuf,
    topology: PathBuf,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let [_, node_id, input, output, topology] = args else {
        bail!("usage: netsortd <node_id> <input_path> <output_path> <topology_path>");
    };
    Ok(Args {
        node_id: node_id
            .parse()
            .with_context(|| format!("invalid node id {node_id:?}, must be an integer"))?,
        input: input.into(),
        output: output.into(),
        topology: topology.into(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = parse_args(&std::env::args().collect::<Vec<_>>())?;
    tracing::info!(node = args.node_id, "netsortd starting");

    let config = NetsortConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        NetsortConfig::default()
    });

    let topology = Arc::new(
        ClusterTopology::load(&args.topology).context("cluster topology is unusable")?,
    );
    let local = topology.require(args.node_id)?.clone();
    tracing::info!(
        nodes = topology.len(),
        partition_bits = topology.partitioner().width(),
        listen = %local.address(),
        "topology loaded"
    );
    let uncovered = topology.uncovered_partitions();
    if !uncovered.is_empty() {
        tracing::warn!(?uncovered, "partitions with no owning node, their records cannot be delivered");
    }

    let shard = ShardFile::open(&args.input)?;
    tracing::info!(path = %shard.path().display(), records = shard.record_count(), "shard opened");

    let listener = FrameListener::bind(&local.address()).await?;
    let sender = TcpFrameSender::from_config(&config.shuffle);
    let node = ShuffleNode::new(args.node_id, topology, config.shuffle, sender)?;

    let (output, report) = node.run(listener, shard.records()).await?;

    write_output(&args.output, &output.to_bytes())
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    tracing::info!(
        path = %args.output.display(),
        records = output.len(),
        digest = hex::encode(output.digest()),
        "sorted output written"
    );

    check_report(&report)
}

/// Exit status for a finished run. Records with no owning node are a
/// topology error and fail the process even though the output was written.
fn check_report(report: &ShuffleReport) -> Result<()> {
    if report.unroutable > 0 {
        bail!(
            "{} records had no owning node and were dropped",
            report.unroutable
        );
    }
    Ok(())
}
