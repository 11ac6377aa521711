use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use crate::config::RaftConfig;
use crate::consensus::{Event, RaftCore, SharedView};
use crate::error::RaftError;
use crate::persist::Persister;
use crate::rpc::{
    AppendEntriesArgs, AppendEntriesReply, RaftEndpoint, RequestVoteArgs, RequestVoteReply, RpcClient,
};
use crate::types::{ApplyMsg, Role};

/// The public face of one cluster member. Everything this struct does is
/// submit an `Event` to the loop thread spawned by `new` and wait for its
/// reply — no state lives here beyond the handles needed to do that.
pub struct Raft {
    to_loop: std::sync::mpsc::Sender<Event>,
    shared: Arc<RwLock<SharedView>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Raft {
    /// Spawns the event loop thread and the per-peer RPC fan-out threads,
    /// restoring `current_term`/`voted_for`/`log`/`commit_index`/`last_applied`
    /// from `persister` if a valid blob is found there.
    pub fn new(
        config: RaftConfig,
        persister: Arc<dyn Persister>,
        rpc: Arc<dyn RpcClient>,
        apply_tx: SyncSender<ApplyMsg>,
    ) -> Raft {
        let (to_loop, rx) = std::sync::mpsc::channel();
        let shared = Arc::new(RwLock::new(SharedView { current_term: 0, role: Role::Follower }));
        let core = RaftCore::new(config, persister, rpc, apply_tx, shared.clone(), rx, to_loop.clone());
        let thread = std::thread::Builder::new()
            .name("raft-core".to_string())
            .spawn(move || core.run())
            .expect("failed to spawn raft event loop thread");
        Raft { to_loop, shared, thread: Mutex::new(Some(thread)) }
    }

    /// Submits `command` for replication. Succeeds immediately with the
    /// index/term the entry was appended at if this peer currently
    /// believes it is leader; that entry is not yet committed, and may
    /// still be overwritten if this peer turns out to have been partitioned.
    pub fn start(&self, command: Vec<u8>) -> Result<(u64, u64), RaftError> {
        let (reply_tx, reply_rx) = std::sync::mpsc::channel();
        self.to_loop
            .send(Event::Command { command, reply: reply_tx })
            .map_err(|_| RaftError::Stopped)?;
        reply_rx.recv().map_err(|_| RaftError::Stopped)?
    }

    pub fn get_state(&self) -> (u64, bool) {
        let shared = self.shared.read().unwrap();
        (shared.current_term, shared.role == Role::Leader)
    }

    /// Stops the event loop and joins every background thread it owns.
    /// Idempotent: calling it twice is harmless, the second call just joins
    /// a thread that has already exited.
    pub fn kill(&self) {
        let _ = self.to_loop.send(Event::Stop);
        if let Some(thread) = self.thread.lock().unwrap().take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Raft {
    fn drop(&mut self) {
        self.kill();
    }
}

impl RaftEndpoint for Raft {
    fn handle_request_vote(&self, args: RequestVoteArgs) -> RequestVoteReply {
        let (reply_tx, reply_rx) = std::sync::mpsc::channel();
        if self.to_loop.send(Event::RequestVote { args: args.clone(), reply: reply_tx }).is_err() {
            return RequestVoteReply { term: 0, vote_granted: false, pre_vote: args.pre_vote, from_id: 0 };
        }
        reply_rx.recv().unwrap_or(RequestVoteReply {
            term: 0,
            vote_granted: false,
            pre_vote: args.pre_vote,
            from_id: 0,
        })
    }

    fn handle_append_entries(&self, args: AppendEntriesArgs) -> AppendEntriesReply {
        let (reply_tx, reply_rx) = std::sync::mpsc::channel();
        let fallback = AppendEntriesReply {
            term: 0,
            success: false,
            inconsistency: false,
            back_up_next_index: 0,
            prev_log_index: args.prev_log_index,
            prev_log_term: args.prev_log_term,
            entries_count: args.entries.len() as u64,
            index: 0,
            commit_index: 0,
            from_id: 0,
            request_id: args.request_id,
        };
        if self.to_loop.send(Event::AppendEntries { args, reply: reply_tx }).is_err() {
            return fallback;
        }
        reply_rx.recv().unwrap_or(fallback)
    }
}
