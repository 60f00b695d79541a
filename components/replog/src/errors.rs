use crate::ReplicaId;

quick_error! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LogError {
        /// The local replica is not the leader. It carries the leader known locally, if any.
        NotLeader(leader: Option<ReplicaId>) {
            display("not leader, leader is: {:?}", leader)
        }

        /// The local replica is down and can not read or write the log.
        Down(rid: ReplicaId) {
            display("replica {} is down", rid)
        }

        Closed {
            display("log closed")
        }
    }
}
