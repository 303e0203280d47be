//! Per-node shuffle driver.
//!
//! Listener up, short startup pause, scan the shard routing each record,
//! tell every peer we are done, then wait for the aggregator to close and
//! sort. Self-routed records and the local completion go straight onto the
//! handoff channel and never touch the network.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use netsort_core::config::ShuffleConfig;
use netsort_core::topology::TopologyError;
use netsort_core::{ClusterTopology, Frame, NodeId, Record, KEY_LEN};

use crate::aggregator::{Aggregator, SortedOutput};
use crate::handoff::{handoff_channel, Inbound, InboundTx};
use crate::termination::{Completion, TerminationDetector};
use crate::transport::{FrameListener, FrameSender, SendOutcome};

/// Counters for one shuffle run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShuffleReport {
    /// Records scanned from the local shard.
    pub records_read: usize,
    /// Shard records owned by this node.
    pub kept_local: usize,
    pub delivered: usize,
    pub abandoned: usize,
    /// Records whose partition has no node in the topology.
    pub unroutable: usize,
    /// Peers that never got our completion frame.
    pub completions_abandoned: usize,
    /// Records in the sorted output.
    pub received: usize,
    /// Messages rejected because they arrived after close.
    pub rejected_late: usize,
}

pub struct ShuffleNode<S> {
    local: NodeId,
    topology: Arc<ClusterTopology>,
    config: ShuffleConfig,
    sender: Arc<S>,
}

impl<S: FrameSender> ShuffleNode<S> {
    pub fn new(
        local: NodeId,
        topology: Arc<ClusterTopology>,
        config: ShuffleConfig,
        sender: S,
    ) -> Result<Self, TopologyError> {
        topology.require(local)?;
        Ok(Self {
            local,
            topology,
            config,
            sender: Arc::new(sender),
        })
    }

    pub fn local(&self) -> NodeId {
        self.local
    }

    /// Run the whole shuffle phase and return this node's sorted records.
    pub async fn run<I>(self, listener: FrameListener, shard: I) -> Result<(SortedOutput, ShuffleReport)>
    where
        I: IntoIterator<Item = Record>,
    {
        let (tx, rx) = handoff_channel();
        let _listener = AbortOnDrop(tokio::spawn(listener.run(tx.clone())));
        let detector = TerminationDetector::new(self.topology.peers(self.local).count());
        let aggregator = tokio::spawn(Aggregator::new(rx, detector).run());

        tokio::time::sleep(self.config.startup_delay()).await;

        let mut report = ShuffleReport::default();
        self.scatter(shard, &tx, &mut report).await?;
        report.completions_abandoned = self.broadcast_completion().await;

        // Own completion last: every self-routed record is already queued ahead of it.
        tx.send(Inbound::Done(Completion::Local))
            .map_err(|_| anyhow!("aggregator stopped before local completion"))?;
        drop(tx);

        let output = aggregator.await.context("aggregator task failed")??;
        report.received = output.len();
        report.rejected_late = output.rejected_late();

        tracing::info!(
            node = self.local,
            read = report.records_read,
            kept_local = report.kept_local,
            delivered = report.delivered,
            abandoned = report.abandoned,
            unroutable = report.unroutable,
            received = report.received,
            "shuffle complete"
        );
        Ok((output, report))
    }

    async fn scatter<I>(&self, shard: I, tx: &InboundTx, report: &mut ShuffleReport) -> Result<()>
    where
        I: IntoIterator<Item = Record>,
    {
        let partitioner = self.topology.partitioner();
        let limit = self.config.max_in_flight.max(1);
        let mut sends = JoinSet::new();

        for record in shard {
            report.records_read += 1;
            let dest = partitioner.destination(&record.key);

            if dest == self.local {
                tx.send(Inbound::Record(record))
                    .map_err(|_| anyhow!("aggregator stopped during shuffle"))?;
                report.kept_local += 1;
                continue;
            }

            let Some(node) = self.topology.node(dest).cloned() else {
                tracing::error!(
                    dest,
                    key = hex::encode(record.key),
                    "no node owns this partition, record dropped"
                );
                report.unroutable += 1;
                continue;
            };

            while sends.len() >= limit {
                if let Some(joined) = sends.join_next().await {
                    tally(joined, report);
                }
            }

            let sender = self.sender.clone();
            sends.spawn(async move {
                let key = record.key;
                let outcome = sender.send_frame(&node, Frame::data(record)).await;
                (node.server_id, key, outcome)
            });
        }

        while let Some(joined) = sends.join_next().await {
            tally(joined, report);
        }
        Ok(())
    }

    /// Send our completion to every peer. Returns how many were abandoned.
    async fn broadcast_completion(&self) -> usize {
        let mut sends = JoinSet::new();
        for peer in self.topology.peers(self.local) {
            let peer = peer.clone();
            let sender = self.sender.clone();
            sends.spawn(async move {
                let outcome = sender.send_frame(&peer, Frame::done()).await;
                (peer.server_id, outcome)
            });
        }

        let mut abandoned = 0;
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((_, SendOutcome::Delivered)) => {}
                Ok((peer, SendOutcome::Abandoned(reason))) => {
                    tracing::error!(peer, error = %reason, "completion not delivered, peer cannot finish");
                    abandoned += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "completion send task failed");
                    abandoned += 1;
                }
            }
        }
        abandoned
    }
}

fn tally(
    joined: Result<(NodeId, [u8; KEY_LEN], SendOutcome), JoinError>,
    report: &mut ShuffleReport,
) {
    match joined {
        Ok((_, _, SendOutcome::Delivered)) => report.delivered += 1,
        Ok((dest, key, SendOutcome::Abandoned(reason))) => {
            tracing::warn!(dest, key = hex::encode(key), error = %reason, "record abandoned");
            report.abandoned += 1;
        }
        Err(e) => {
            tracing::warn!(error = %e, "send task failed");
            report.abandoned += 1;
        }
    }
}

/// The listener runs until the shuffle closes; nothing is sent to a closed node.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
