use crate::Gid;
use crate::ShardId;

quick_error! {
    /// CtrlerError is returned by the shard controller.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CtrlerError {
        /// The controller can not be reached; callers retry later.
        Unavailable {
            display("shard controller unavailable")
        }

        DupGroup(gid: Gid) {
            display("group {} already joined", gid)
        }

        UnknownGroup(gid: Gid) {
            display("group {} is not in the latest config", gid)
        }

        InvalidGid(gid: Gid) {
            display("gid {} is reserved", gid)
        }

        BadShard(shard: ShardId) {
            display("no such shard: {}", shard)
        }
    }
}
