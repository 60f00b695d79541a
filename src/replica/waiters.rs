use std::collections::BTreeMap;
use std::mem;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use replog::ConsensusLog;
use replog::LogError;
use replog::LogIndex;
use replog::Proposal;
use replog::Term;
use storage::OpReply;

use crate::Command;
use crate::EntryId;
use crate::KvError;

pub type ApplyResult = Result<OpReply, KvError>;

struct Waiter {
    term: Term,
    id: EntryId,
    tx: oneshot::Sender<ApplyResult>,
}

/// Waiters connects a proposal to the result of applying it.
///
/// A waiter is keyed by the log index its entry was proposed at. When the applier applies an
/// entry at that index, the waiter gets the result if the applied entry is the proposed one,
/// i.e. same term and same `EntryId`, and `WrongLeader` otherwise.
#[derive(Default)]
pub struct Waiters {
    by_index: Mutex<BTreeMap<LogIndex, Waiter>>,
}

impl Waiters {
    pub fn new() -> Waiters {
        Self::default()
    }

    /// propose proposes `cmd` and registers a waiter for it.
    ///
    /// The waiter lock is held across the proposal, so the applier can not publish the entry
    /// before its waiter exists.
    pub fn propose(
        &self,
        log: &dyn ConsensusLog<Command>,
        cmd: Command,
    ) -> Result<(Proposal, oneshot::Receiver<ApplyResult>), KvError> {
        let id = cmd.id();
        let mut ws = self.by_index.lock();

        let p = log.propose(cmd).map_err(|e| match e {
            LogError::NotLeader(_) => KvError::WrongLeader,
            e => KvError::Log(e),
        })?;

        let (tx, rx) = oneshot::channel();

        // A waiter left at this index by a lost proposal of an older term is dropped here, its
        // receiver sees the channel closed.
        ws.insert(
            p.index,
            Waiter {
                term: p.term,
                id,
                tx,
            },
        );

        Ok((p, rx))
    }

    /// notify publishes the result of the entry applied at `index`.
    /// Waiters of lower indexes can never be satisfied any more and get `WrongLeader`.
    pub fn notify(&self, index: LogIndex, term: Term, id: EntryId, result: ApplyResult) {
        let done = {
            let mut ws = self.by_index.lock();
            let rest = ws.split_off(&(index + 1));
            mem::replace(&mut *ws, rest)
        };

        let mut result = Some(result);
        for (i, w) in done.into_iter() {
            let r = if i == index && w.term == term && w.id == id {
                result.take().unwrap_or(Err(KvError::WrongLeader))
            } else {
                Err(KvError::WrongLeader)
            };
            let _ = w.tx.send(r);
        }
    }

    /// skip_to fails every waiter up to `index`, e.g. when a snapshot replaces those entries.
    pub fn skip_to(&self, index: LogIndex) {
        let done = {
            let mut ws = self.by_index.lock();
            let rest = ws.split_off(&(index + 1));
            mem::replace(&mut *ws, rest)
        };

        for (_, w) in done.into_iter() {
            let _ = w.tx.send(Err(KvError::WrongLeader));
        }
    }

    /// cancel removes a waiter that gave up, only if it is still the one proposed.
    pub fn cancel(&self, index: LogIndex, term: Term, id: EntryId) {
        let mut ws = self.by_index.lock();
        let mine = match ws.get(&index) {
            Some(w) => w.term == term && w.id == id,
            None => false,
        };
        if mine {
            ws.remove(&index);
        }
    }

    /// clear fails every waiter with `Shutdown`.
    pub fn clear(&self) {
        let done = mem::replace(&mut *self.by_index.lock(), BTreeMap::new());
        for (_, w) in done.into_iter() {
            let _ = w.tx.send(Err(KvError::Shutdown));
        }
    }

    pub fn len(&self) -> usize {
        self.by_index.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
