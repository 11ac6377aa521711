mod config;
mod consensus;
mod error;
mod peer;
mod persist;
mod raft;
mod rpc;
mod types;

pub use config::RaftConfig;
pub use error::RaftError;
pub use persist::{FilePersister, MemoryPersister, Persister, PersistentState};
pub use raft::Raft;
pub use rpc::{
    AppendEntriesArgs, AppendEntriesReply, ChannelRpcClient, RaftEndpoint, RequestVoteArgs, RequestVoteReply,
    RpcClient,
};
pub use types::{ApplyMsg, LogEntry, Role};
