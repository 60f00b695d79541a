use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::Committed;
use crate::ConsensusLog;
use crate::Delivery;
use crate::LogError;
use crate::LogIndex;
use crate::Proposal;
use crate::ReplicaId;
use crate::Term;

struct Inner<E> {
    term: Term,
    leader: Option<ReplicaId>,
    down: BTreeSet<ReplicaId>,

    snapshot_index: LogIndex,
    snapshot: Vec<u8>,

    /// committed entries after `snapshot_index`.
    entries: Vec<(Term, E)>,

    /// accepted by the leader but not committed, only used while `hold` is set.
    pending: Vec<(Term, E)>,
    hold: bool,

    closed: bool,
}

impl<E: Clone> Inner<E> {
    fn last_committed(&self) -> LogIndex {
        self.snapshot_index + self.entries.len() as LogIndex
    }

    fn delivery(&self, index: LogIndex) -> Option<Delivery<E>> {
        if index <= self.snapshot_index {
            return Some(Delivery::Snapshot {
                index: self.snapshot_index,
                data: self.snapshot.clone(),
            });
        }

        let off = (index - self.snapshot_index - 1) as usize;
        let (term, entry) = self.entries.get(off)?;
        Some(Delivery::Entry(Committed {
            index,
            term: *term,
            entry: entry.clone(),
        }))
    }
}

/// MemLog is an in-process log shared by all replicas of one group.
///
/// Consensus is assumed: an entry proposed by the leader commits at once, unless `hold` is
/// set, in which case it waits for `release` and may be lost by a leader change.
pub struct MemLog<E> {
    inner: Arc<Mutex<Inner<E>>>,
    notify: Arc<Notify>,
}

impl<E> Clone for MemLog<E> {
    fn clone(&self) -> Self {
        MemLog {
            inner: self.inner.clone(),
            notify: self.notify.clone(),
        }
    }
}

impl<E> MemLog<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// new creates a log led by `leader` at term 1.
    pub fn new(leader: ReplicaId) -> Self {
        MemLog {
            inner: Arc::new(Mutex::new(Inner {
                term: 1,
                leader: Some(leader),
                down: BTreeSet::new(),
                snapshot_index: 0,
                snapshot: vec![],
                entries: vec![],
                pending: vec![],
                hold: false,
                closed: false,
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    /// replica returns the view of the log from replica `rid`.
    pub fn replica(&self, rid: ReplicaId) -> Arc<dyn ConsensusLog<E>> {
        Arc::new(MemLogReplica {
            me: rid,
            log: self.clone(),
        })
    }

    pub fn leader(&self) -> Option<ReplicaId> {
        self.inner.lock().leader
    }

    pub fn term(&self) -> Term {
        self.inner.lock().term
    }

    pub fn last_committed(&self) -> LogIndex {
        self.inner.lock().last_committed()
    }

    pub fn snapshot_index(&self) -> LogIndex {
        self.inner.lock().snapshot_index
    }

    /// elect makes `rid` the leader of a new term.
    ///
    /// Entries the old leader accepted but did not commit are committed if `keep_pending`,
    /// otherwise they are lost.
    pub fn elect(&self, rid: ReplicaId, keep_pending: bool) {
        {
            let mut inner = self.inner.lock();
            let pending = std::mem::replace(&mut inner.pending, vec![]);
            if keep_pending {
                inner.entries.extend(pending);
            }
            inner.term += 1;
            inner.leader = Some(rid);
            info!("leader elected"; "leader" => rid, "term" => inner.term, "keep_pending" => keep_pending);
        }
        self.notify.notify_waiters();
    }

    /// crash stops replica `rid` from reading or writing the log. A crashed leader leaves the
    /// group leaderless and loses its uncommitted entries.
    pub fn crash(&self, rid: ReplicaId) {
        {
            let mut inner = self.inner.lock();
            inner.down.insert(rid);
            if inner.leader == Some(rid) {
                inner.leader = None;
                inner.pending.clear();
            }
            warn!("replica crashed"; "rid" => rid, "term" => inner.term);
        }
        self.notify.notify_waiters();
    }

    pub fn restart(&self, rid: ReplicaId) {
        let mut inner = self.inner.lock();
        inner.down.remove(&rid);
        info!("replica restarted"; "rid" => rid);
    }

    /// hold makes the leader stop committing proposals until `release`.
    pub fn hold(&self) {
        self.inner.lock().hold = true;
    }

    /// release commits every held proposal and resumes committing at once.
    pub fn release(&self) {
        {
            let mut inner = self.inner.lock();
            let pending = std::mem::replace(&mut inner.pending, vec![]);
            inner.entries.extend(pending);
            inner.hold = false;
        }
        self.notify.notify_waiters();
    }

    /// close wakes every waiter with `LogError::Closed`.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }
}

struct MemLogReplica<E> {
    me: ReplicaId,
    log: MemLog<E>,
}

#[async_trait]
impl<E> ConsensusLog<E> for MemLogReplica<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn propose(&self, entry: E) -> Result<Proposal, LogError> {
        let proposal = {
            let mut inner = self.log.inner.lock();
            if inner.closed {
                return Err(LogError::Closed);
            }
            if inner.down.contains(&self.me) || inner.leader != Some(self.me) {
                return Err(LogError::NotLeader(inner.leader));
            }

            let term = inner.term;
            let index = inner.last_committed() + inner.pending.len() as LogIndex + 1;
            if inner.hold {
                inner.pending.push((term, entry));
            } else {
                inner.entries.push((term, entry));
            }
            Proposal { index, term }
        };

        self.log.notify.notify_waiters();
        Ok(proposal)
    }

    fn is_leader(&self) -> bool {
        let inner = self.log.inner.lock();
        inner.leader == Some(self.me) && !inner.down.contains(&self.me)
    }

    async fn wait_committed(&self, index: LogIndex) -> Result<Delivery<E>, LogError> {
        loop {
            let notified = self.log.notify.notified();
            {
                let inner = self.log.inner.lock();
                if inner.closed {
                    return Err(LogError::Closed);
                }
                if inner.down.contains(&self.me) {
                    return Err(LogError::Down(self.me));
                }
                if let Some(d) = inner.delivery(index) {
                    return Ok(d);
                }
            }
            notified.await;
        }
    }

    fn compact(&self, index: LogIndex, snapshot: Vec<u8>) -> Result<(), LogError> {
        let mut inner = self.log.inner.lock();
        if inner.closed {
            return Err(LogError::Closed);
        }
        if index <= inner.snapshot_index || index > inner.last_committed() {
            return Ok(());
        }

        let n = (index - inner.snapshot_index) as usize;
        inner.entries.drain(..n);
        inner.snapshot_index = index;
        inner.snapshot = snapshot;

        debug!("log compacted"; "rid" => self.me, "index" => index);
        Ok(())
    }
}
