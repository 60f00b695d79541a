use std::sync::Arc;

use async_trait::async_trait;

use crate::LogError;

/// LogIndex is the position of an entry in the log. The first entry is at 1.
pub type LogIndex = u64;

pub type Term = u64;

pub type ReplicaId = u64;

/// Proposal identifies where a proposed entry would be committed, if it ever is.
///
/// The entry committed at `index` is the proposed one only if it carries the same `term`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub index: LogIndex,
    pub term: Term,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Committed<E> {
    pub index: LogIndex,
    pub term: Term,
    pub entry: E,
}

/// Delivery is one step of the committed stream: an entry, or a snapshot that replaces all
/// entries up to and including `index`.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<E> {
    Entry(Committed<E>),
    Snapshot { index: LogIndex, data: Vec<u8> },
}

/// ConsensusLog is the replicated log of one replica group, seen from one replica.
///
/// Every replica observes the same committed entries in the same order. Entries are never
/// revoked once committed.
#[async_trait]
pub trait ConsensusLog<E>: Send + Sync
where
    E: Clone + Send + Sync + 'static,
{
    /// propose appends `entry` if the local replica is the leader.
    /// It returns as soon as the entry is accepted, not when it is committed.
    fn propose(&self, entry: E) -> Result<Proposal, LogError>;

    fn is_leader(&self) -> bool;

    /// wait_committed returns the committed entry at `index`, waiting until it is committed.
    /// If `index` has been compacted away, it returns the snapshot covering it.
    async fn wait_committed(&self, index: LogIndex) -> Result<Delivery<E>, LogError>;

    /// compact discards entries up to `index`; `snapshot` must reflect exactly these entries.
    fn compact(&self, index: LogIndex, snapshot: Vec<u8>) -> Result<(), LogError>;
}

/// CommittedStream reads committed entries in order, starting at any index.
///
/// Restarting from a snapshot is creating a stream at `snapshot_index + 1`.
pub struct CommittedStream<E>
where
    E: Clone + Send + Sync + 'static,
{
    log: Arc<dyn ConsensusLog<E>>,
    next: LogIndex,
}

impl<E> CommittedStream<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new(log: Arc<dyn ConsensusLog<E>>, from: LogIndex) -> Self {
        CommittedStream {
            log,
            next: std::cmp::max(from, 1),
        }
    }

    /// position returns the index of the next entry to read.
    pub fn position(&self) -> LogIndex {
        self.next
    }

    pub async fn next(&mut self) -> Result<Delivery<E>, LogError> {
        let d = self.log.wait_committed(self.next).await?;
        self.next = match &d {
            Delivery::Entry(c) => c.index + 1,
            Delivery::Snapshot { index, .. } => index + 1,
        };
        Ok(d)
    }
}
