use serde::{Deserialize, Serialize};

/// A single replicated log entry. `command` is an opaque byte blob — the
/// host application is responsible for encoding/decoding it; the peer never
/// looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: u64,
    pub command: Vec<u8>,
}

/// Role in the PreVote-extended Raft automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    PreCandidate,
    Candidate,
    Leader,
    Stopped,
}

/// Delivered to the host application's apply channel, in commit order, once
/// per committed log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyMsg {
    pub command_valid: bool,
    pub command: Vec<u8>,
    pub command_index: u64,
}
