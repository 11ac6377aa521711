use std::time::Duration;

/// Heartbeat cadence for a peer that believes it is leader.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(180);

/// Lower/upper bounds for the randomized election timeout, used by
/// followers, pre-candidates and candidates alike.
pub const ELECTION_TIMEOUT_MIN: Duration = Duration::from_millis(400);
pub const ELECTION_TIMEOUT_MAX: Duration = Duration::from_millis(600);

/// Static description of the cluster a peer participates in, mirroring the
/// shape of the teacher's `server::Config` but generalized away from a
/// fixed socket-address transport: how peers are actually reached is the
/// job of the `RpcClient` the peer is constructed with, not this struct.
#[derive(Debug, Clone)]
pub struct RaftConfig {
    /// Number of peers in the cluster, including this one.
    pub cluster_size: usize,
    /// This peer's index into `0..cluster_size`.
    pub me: usize,
    pub heartbeat_interval: Duration,
    pub election_timeout_min: Duration,
    pub election_timeout_max: Duration,
}

impl RaftConfig {
    pub fn new(cluster_size: usize, me: usize) -> Self {
        RaftConfig {
            cluster_size,
            me,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            election_timeout_min: ELECTION_TIMEOUT_MIN,
            election_timeout_max: ELECTION_TIMEOUT_MAX,
        }
    }
}
