use shardctrler::Gid;

quick_error! {
    #[derive(Debug)]
    pub enum ConfError {
        IOError(e: std::io::Error) {
            from(e: std::io::Error) -> (e)
            display("io error: {}", e)
        }

        BadYaml(e: serde_yaml::Error) {
            from(e: serde_yaml::Error) -> (e)
            display("bad yaml: {}", e)
        }

        /// Gid 0 means "no group" and can not be configured.
        InvalidGid(gid: Gid) {
            display("invalid gid: {}", gid)
        }

        EmptyGroup(gid: Gid) {
            display("group {} has no replica", gid)
        }

        DupReplica(name: String) {
            display("replica {} appears more than once", name)
        }

        BadLevel(level: String) {
            display("unknown log level: {}", level)
        }

        BadValue(field: &'static str) {
            display("bad value of {}", field)
        }
    }
}

impl PartialEq<ConfError> for ConfError {
    fn eq(&self, other: &ConfError) -> bool {
        match (self, other) {
            (Self::IOError(a), Self::IOError(b)) => a.kind() == b.kind(),
            (Self::BadYaml(_), Self::BadYaml(_)) => true,
            (Self::InvalidGid(a), Self::InvalidGid(b)) => a == b,
            (Self::EmptyGroup(a), Self::EmptyGroup(b)) => a == b,
            (Self::DupReplica(a), Self::DupReplica(b)) => a == b,
            (Self::BadLevel(a), Self::BadLevel(b)) => a == b,
            (Self::BadValue(a), Self::BadValue(b)) => a == b,
            _ => false,
        }
    }
}
