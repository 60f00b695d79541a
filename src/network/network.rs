use async_trait::async_trait;

use crate::DeleteShardArgs;
use crate::DeleteShardReply;
use crate::GetArgs;
use crate::GetReply;
use crate::PullShardArgs;
use crate::PullShardReply;
use crate::PutAppendArgs;
use crate::PutAppendReply;

use super::NetError;

/// KvService is what a replica serves to clients and to other groups.
#[async_trait]
pub trait KvService: Send + Sync {
    async fn get(&self, args: GetArgs) -> GetReply;

    async fn put_append(&self, args: PutAppendArgs) -> PutAppendReply;

    /// pull_shard returns the data of a shard handed off by a config.
    async fn pull_shard(&self, args: PullShardArgs) -> PullShardReply;

    /// delete_shard tells the previous owner of a shard that its copy is no longer needed.
    async fn delete_shard(&self, args: DeleteShardArgs) -> DeleteShardReply;
}

/// Network calls a `KvService` by server name.
///
/// A call fails with `NetError` when the request or the reply does not get through; the
/// request may or may not have been executed.
#[async_trait]
pub trait Network: Send + Sync {
    async fn get(&self, server: &str, args: GetArgs) -> Result<GetReply, NetError>;

    async fn put_append(
        &self,
        server: &str,
        args: PutAppendArgs,
    ) -> Result<PutAppendReply, NetError>;

    async fn pull_shard(
        &self,
        server: &str,
        args: PullShardArgs,
    ) -> Result<PullShardReply, NetError>;

    async fn delete_shard(
        &self,
        server: &str,
        args: DeleteShardArgs,
    ) -> Result<DeleteShardReply, NetError>;
}
