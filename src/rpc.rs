use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::types::LogEntry;

#[derive(Debug, Clone)]
pub struct RequestVoteArgs {
    pub term: u64,
    pub candidate_id: usize,
    pub last_log_index: u64,
    pub last_log_term: u64,
    /// `true` for a non-binding PreVote poll; `false` for a real election.
    pub pre_vote: bool,
}

#[derive(Debug, Clone)]
pub struct RequestVoteReply {
    pub term: u64,
    pub vote_granted: bool,
    pub pre_vote: bool,
    pub from_id: usize,
}

#[derive(Debug, Clone)]
pub struct AppendEntriesArgs {
    pub term: u64,
    pub leader_id: usize,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub entries: Vec<LogEntry>,
    pub leader_commit: u64,
    pub request_id: u64,
}

#[derive(Debug, Clone)]
pub struct AppendEntriesReply {
    pub term: u64,
    pub success: bool,
    pub inconsistency: bool,
    pub back_up_next_index: u64,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub entries_count: u64,
    pub index: u64,
    pub commit_index: u64,
    pub from_id: usize,
    pub request_id: u64,
}

/// Transport seam. A peer never opens a socket itself — it asks its
/// `RpcClient` to deliver a request to `peer` and either hands back the
/// reply or, on any transport failure (timeout, connection refused,
/// partition), returns `None`. The core loop treats `None` exactly like a
/// reply that never arrived: no retry bookkeeping lives in the transport.
pub trait RpcClient: Send + Sync {
    fn request_vote(&self, peer: usize, args: RequestVoteArgs) -> Option<RequestVoteReply>;
    fn append_entries(&self, peer: usize, args: AppendEntriesArgs) -> Option<AppendEntriesReply>;
}

/// The pair of public RPC handlers a peer exposes to the rest of the
/// cluster. `ChannelRpcClient` holds one of these per registered peer and
/// calls straight into it, standing in for whatever framing a real network
/// transport would use.
pub trait RaftEndpoint: Send + Sync {
    fn handle_request_vote(&self, args: RequestVoteArgs) -> RequestVoteReply;
    fn handle_append_entries(&self, args: AppendEntriesArgs) -> AppendEntriesReply;
}

/// An in-memory `RpcClient` that wires a set of peers together by direct
/// method call instead of a network, for tests and for embedding several
/// peers in one process. Registration is by peer index; delivery to an
/// unregistered or since-removed peer is treated as a transport failure.
#[derive(Clone, Default)]
pub struct ChannelRpcClient {
    endpoints: Arc<Mutex<HashMap<usize, Arc<dyn RaftEndpoint>>>>,
}

impl ChannelRpcClient {
    pub fn new() -> Self {
        ChannelRpcClient {
            endpoints: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn register(&self, peer: usize, endpoint: Arc<dyn RaftEndpoint>) {
        self.endpoints.lock().unwrap().insert(peer, endpoint);
    }
}

impl RpcClient for ChannelRpcClient {
    fn request_vote(&self, peer: usize, args: RequestVoteArgs) -> Option<RequestVoteReply> {
        let endpoint = self.endpoints.lock().unwrap().get(&peer).cloned()?;
        Some(endpoint.handle_request_vote(args))
    }

    fn append_entries(&self, peer: usize, args: AppendEntriesArgs) -> Option<AppendEntriesReply> {
        let endpoint = self.endpoints.lock().unwrap().get(&peer).cloned()?;
        Some(endpoint.handle_append_entries(args))
    }
}
