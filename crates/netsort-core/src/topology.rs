//! Cluster topology: the fixed set of nodes taking part in a run.
//!
//! Loaded once before the shuffle starts and read-only afterwards. The
//! file is YAML:
//!
//! ```yaml
//! servers:
//!   - serverId: 0
//!     host: "127.0.0.1"
//!     port: "8080"
//! ```
//!
//! A file ending in `.toml` is read as TOML instead, with the same shape
//! (`[[servers]]` tables; `server_id` is accepted as well as `serverId`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::partition::{Partitioner, MAX_CLUSTER_SIZE};

/// Node identifier. Doubles as the partition number the node owns.
pub type NodeId = u32;

/// One node's listen address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddr {
    #[serde(rename = "serverId", alias = "server_id")]
    pub server_id: NodeId,
    pub host: String,
    #[serde(deserialize_with = "port_text")]
    pub port: String,
}

/// Ports are kept as text; an unquoted number in the file is accepted too.
fn port_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u16),
    }
    Ok(match Port::deserialize(deserializer)? {
        Port::Text(text) => text,
        Port::Number(n) => n.to_string(),
    })
}

impl NodeAddr {
    pub fn new(server_id: NodeId, host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            server_id,
            host: host.into(),
            port: port.into(),
        }
    }

    /// `host:port`, bracketing bare IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct TopologyFile {
    servers: Vec<NodeAddr>,
}

/// Validated, ordered cluster membership.
#[derive(Debug, Clone)]
pub struct ClusterTopology {
    nodes: Vec<NodeAddr>,
    index: HashMap<NodeId, usize>,
    partitioner: Partitioner,
}

impl ClusterTopology {
    /// Validate a node list. Ids must be unique and the cluster must fit the
    /// one-byte partition width.
    pub fn new(nodes: Vec<NodeAddr>) -> Result<Self, TopologyError> {
        if nodes.is_empty() {
            return Err(TopologyError::Empty);
        }
        let partitioner =
            Partitioner::for_cluster(nodes.len()).ok_or(TopologyError::TooLarge(nodes.len()))?;
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.server_id, i).is_some() {
                return Err(TopologyError::DuplicateNode(node.server_id));
            }
        }
        Ok(Self {
            nodes,
            index,
            partitioner,
        })
    }

    /// Load and validate a topology file. `.toml` files are TOML; anything
    /// else is YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TopologyError::ReadFailed(path.to_path_buf(), e))?;
        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&text),
            _ => Self::from_yaml(&text),
        };
        parsed.map_err(|e| match e {
            TopologyError::Toml(_) | TopologyError::Yaml(_) => TopologyError::ParseFailed {
                path: path.to_path_buf(),
                source: Box::new(e),
            },
            other => other,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, TopologyError> {
        let file: TopologyFile = serde_yaml::from_str(text)?;
        Self::new(file.servers)
    }

    pub fn from_toml(text: &str) -> Result<Self, TopologyError> {
        let file: TopologyFile = toml::from_str(text)?;
        Self::new(file.servers)
    }

    /// Cluster size N.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a validated topology.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeAddr] {
        &self.nodes
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.server_id)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeAddr> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Like [`node`](Self::node), but absence is a configuration error.
    pub fn require(&self, id: NodeId) -> Result<&NodeAddr, TopologyError> {
        self.node(id).ok_or(TopologyError::UnknownNode(id))
    }

    /// Every node except `local`, in topology order.
    pub fn peers(&self, local: NodeId) -> impl Iterator<Item = &NodeAddr> + '_ {
        self.nodes.iter().filter(move |n| n.server_id != local)
    }

    pub fn partitioner(&self) -> Partitioner {
        self.partitioner
    }

    /// Partition numbers that no node owns. Records routed to one of these
    /// cannot be delivered.
    pub fn uncovered_partitions(&self) -> Vec<NodeId> {
        (0..self.partitioner().partition_count())
            .filter(|id| !self.contains(*id))
            .collect()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("failed to read topology {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse topology {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: Box<TopologyError>,
    },
    #[error("malformed topology TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("malformed topology YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("topology lists no servers")]
    Empty,
    #[error("cluster of {0} nodes exceeds the one-byte partition limit of {max}", max = MAX_CLUSTER_SIZE)]
    TooLarge(usize),
    #[error("duplicate server id {0}")]
    DuplicateNode(NodeId),
    #[error("server id {0} is not in the topology")]
    UnknownNode(NodeId),
}
