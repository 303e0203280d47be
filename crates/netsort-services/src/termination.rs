//! Termination detection for the shuffle phase.
//!
//! Collecting → Closed. Completion frames carry no identity, so the detector
//! counts them: it closes once every peer's marker has arrived (N − 1 of
//! them) and the local scan has reported its own completion in-process.
//! Once closed it never reopens.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Closed,
}

/// Where a completion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The local shard scan and all of its sends have finished.
    Local,
    /// A completion frame arrived from the network.
    Peer,
}

#[derive(Debug)]
pub struct TerminationDetector {
    peers: usize,
    peers_done: usize,
    local_done: bool,
    phase: Phase,
}

impl TerminationDetector {
    /// Detector for a node with `peers` other nodes in the topology.
    pub fn new(peers: usize) -> Self {
        Self {
            peers,
            peers_done: 0,
            local_done: false,
            phase: Phase::Collecting,
        }
    }

    /// Record one completion. Errors leave the state unchanged.
    pub fn observe(&mut self, completion: Completion) -> Result<Phase, TerminationError> {
        if self.phase == Phase::Closed {
            return Err(TerminationError::AlreadyClosed(completion));
        }
        match completion {
            Completion::Local if self.local_done => return Err(TerminationError::LocalRepeated),
            Completion::Local => self.local_done = true,
            Completion::Peer if self.peers_done == self.peers => {
                return Err(TerminationError::ExcessPeer {
                    expected: self.peers,
                })
            }
            Completion::Peer => self.peers_done += 1,
        }
        if self.local_done && self.peers_done == self.peers {
            self.phase = Phase::Closed;
        }
        Ok(self.phase)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    /// Peer completion markers counted so far.
    pub fn peers_done(&self) -> usize {
        self.peers_done
    }

    /// Peer markers still outstanding.
    pub fn peers_pending(&self) -> usize {
        self.peers - self.peers_done
    }

    pub fn local_done(&self) -> bool {
        self.local_done
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TerminationError {
    #[error("local completion reported twice")]
    LocalRepeated,
    #[error("more peer completions than the {expected} peers in the topology")]
    ExcessPeer { expected: usize },
    #[error("{0:?} completion after the shuffle closed")]
    AlreadyClosed(Completion),
}
