use prost::{DecodeError, EncodeError};
use shardctrler::ConfigNum;
use shardctrler::ShardId;

quick_error! {
    /// Errors occur when reading or changing the replicated group state, or when accessing the
    /// underlying engine.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum StorageError {
        DBError(msg: String) {
            from(msg: String) -> (msg)
            display("got db error:{}", msg)
        }

        ProstError(err: String) {
            from(err: DecodeError) -> (format!("{:?}", err))
            from(err: EncodeError) -> (format!("{:?}", err))
            display("prost error: {:?}", err)
        }

        /// The shard is not in `Owned` state here.
        NotOwned(shard: ShardId) {
            display("shard {} is not owned", shard)
        }

        /// A config change that is not the next one.
        ConfigOutOfOrder(current: ConfigNum, got: ConfigNum) {
            display("current config: {}, can not apply config: {}", current, got)
        }

        /// Config `current + 1` can not be applied while shards of `current` are still pulled.
        MigrationUnsettled(current: ConfigNum) {
            display("shards of config {} are still being pulled", current)
        }

        /// The requested shard hand-off has not been reached yet.
        NotReady(current: ConfigNum, want: ConfigNum) {
            display("current config: {}, shard wanted for config: {}", current, want)
        }

        /// No hand-off data for this shard at that config.
        NotOwner(shard: ShardId, num: ConfigNum) {
            display("no data of shard {} for config {}", shard, num)
        }

        /// A transfer that does not match what is being pulled.
        StaleTransfer(shard: ShardId, num: ConfigNum) {
            display("shard {} of config {} is not being pulled", shard, num)
        }

        InvalidTransfer(msg: String) {
            display("invalid shard transfer: {}", msg)
        }
    }
}
