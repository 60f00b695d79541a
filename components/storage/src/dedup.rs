use std::collections::BTreeMap;

/// ClientId identifies a client for its whole lifetime.
pub type ClientId = i64;

/// SeqNum strictly increases across all operations of one client.
pub type SeqNum = u64;

/// OpReply is the outcome of an executed operation, as remembered for retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpReply {
    Ok,
    Value(String),
    NoKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupEntry {
    pub seq: SeqNum,
    pub reply: OpReply,
}

/// DedupTable remembers, per client, the last executed sequence number and its reply.
///
/// A request with a sequence number not greater than the recorded one has been executed
/// already. This includes a client that restarts and reuses small sequence numbers: it is
/// treated as a retry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupTable {
    entries: BTreeMap<ClientId, DedupEntry>,
}

impl DedupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_duplicate(&self, client: ClientId, seq: SeqNum) -> bool {
        match self.entries.get(&client) {
            Some(e) => seq <= e.seq,
            None => false,
        }
    }

    /// lookup returns the cached reply if `seq` has been executed.
    pub fn lookup(&self, client: ClientId, seq: SeqNum) -> Option<&OpReply> {
        let e = self.entries.get(&client)?;
        if seq <= e.seq {
            Some(&e.reply)
        } else {
            None
        }
    }

    /// record remembers the reply of `seq`. A record older than the current one is ignored.
    pub fn record(&mut self, client: ClientId, seq: SeqNum, reply: OpReply) {
        if self.is_duplicate(client, seq) {
            return;
        }
        self.entries.insert(client, DedupEntry { seq, reply });
    }

    /// merge takes every entry of `other` that is newer than the local one.
    pub fn merge(&mut self, other: DedupTable) {
        for (client, e) in other.entries.into_iter() {
            self.record(client, e.seq, e.reply);
        }
    }

    /// trim forgets a client once it acknowledged every reply up to `acked`.
    /// It is a memory knob only: a forgotten client must never retry an acknowledged request.
    pub fn trim(&mut self, client: ClientId, acked: SeqNum) {
        if let Some(e) = self.entries.get(&client) {
            if e.seq <= acked {
                self.entries.remove(&client);
            }
        }
    }

    pub fn get(&self, client: ClientId) -> Option<&DedupEntry> {
        self.entries.get(&client)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClientId, &DedupEntry)> {
        self.entries.iter()
    }
}

impl std::iter::FromIterator<(ClientId, DedupEntry)> for DedupTable {
    fn from_iter<I: IntoIterator<Item = (ClientId, DedupEntry)>>(iter: I) -> Self {
        let mut t = DedupTable::new();
        for (client, e) in iter {
            t.record(client, e.seq, e.reply);
        }
        t
    }
}
