use storage::StorageError;

quick_error! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum NetError {
        NoSuchServer(server: String) {
            display("no such server: {}", server)
        }

        Unreachable(server: String) {
            display("server {} is unreachable", server)
        }

        /// The request was delivered but the reply was not.
        ReplyLost(server: String) {
            display("reply from {} is lost", server)
        }

        Codec(msg: String) {
            from(e: StorageError) -> (format!("{}", e))
            display("codec error: {}", msg)
        }
    }
}
