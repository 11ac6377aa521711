use std::collections::HashSet;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::Rng;

use crate::config::RaftConfig;
use crate::error::RaftError;
use crate::peer::{PeerHandle, PeerThreadMessage};
use crate::persist::{PersistentState, Persister};
use crate::rpc::{AppendEntriesArgs, AppendEntriesReply, RequestVoteArgs, RequestVoteReply, RpcClient};
use crate::types::{ApplyMsg, LogEntry, Role};

/// Everything that can arrive at the event loop's single ingress queue.
/// Requests carry a one-shot reply channel; replies to our own outbound
/// RPCs (delivered by the peer threads) and `Stop` do not, since nothing is
/// blocked waiting on them.
pub enum Event {
    Command {
        command: Vec<u8>,
        reply: Sender<Result<(u64, u64), RaftError>>,
    },
    RequestVote {
        args: RequestVoteArgs,
        reply: Sender<RequestVoteReply>,
    },
    AppendEntries {
        args: AppendEntriesArgs,
        reply: Sender<AppendEntriesReply>,
    },
    RequestVoteReply(RequestVoteReply),
    AppendEntriesReply(AppendEntriesReply),
    Stop,
}

/// Cross-thread view of the fields `GetState` needs, kept in lockstep with
/// the event loop's private copies of `current_term` and `role` so readers
/// never have to reach into the loop itself.
pub struct SharedView {
    pub current_term: u64,
    pub role: Role,
}

/// The event loop's private state. Every field here is touched by exactly
/// one thread — the thread running `RaftCore::run` — which is what lets the
/// rest of the crate skip locking almost everywhere; only `shared` and the
/// peer/RPC/persistence collaborators cross thread boundaries.
pub struct RaftCore {
    id: usize,
    config: RaftConfig,
    persister: Arc<dyn Persister>,
    apply_tx: std::sync::mpsc::SyncSender<ApplyMsg>,
    shared: Arc<RwLock<SharedView>>,
    rx: Receiver<Event>,
    peers: Vec<Option<PeerHandle>>,

    role: Role,
    current_term: u64,
    voted_for: Option<usize>,
    log: Vec<LogEntry>,
    commit_index: u64,
    last_applied: u64,
    leader_id: Option<usize>,

    next_index: Vec<u64>,
    match_index: Vec<u64>,
    request_seq: Vec<u64>,
    votes_received: HashSet<usize>,

    election_deadline: Instant,
    next_heartbeat: Instant,
}

impl RaftCore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RaftConfig,
        persister: Arc<dyn Persister>,
        rpc: Arc<dyn RpcClient>,
        apply_tx: std::sync::mpsc::SyncSender<ApplyMsg>,
        shared: Arc<RwLock<SharedView>>,
        rx: Receiver<Event>,
        self_tx: Sender<Event>,
    ) -> RaftCore {
        let n = config.cluster_size;
        let id = config.me;
        let state = PersistentState::decode(&persister.read()).unwrap_or_else(|| {
            warn!("peer {id}: no valid persisted state found, starting from zero state");
            PersistentState::zero()
        });

        let mut peers = Vec::with_capacity(n);
        for p in 0..n {
            if p == id {
                peers.push(None);
            } else {
                peers.push(Some(PeerHandle::spawn(p, rpc.clone(), self_tx.clone())));
            }
        }

        let now = Instant::now();
        RaftCore {
            id,
            config,
            persister,
            apply_tx,
            shared,
            rx,
            peers,
            role: Role::Follower,
            current_term: state.current_term,
            voted_for: state.voted_for,
            log: state.log,
            commit_index: state.commit_index,
            last_applied: state.last_applied,
            leader_id: None,
            next_index: vec![1; n],
            match_index: vec![0; n],
            request_seq: vec![0; n],
            votes_received: HashSet::new(),
            election_deadline: now,
            next_heartbeat: now,
        }
    }

    pub fn run(mut self) {
        self.update_shared();
        loop {
            match self.role {
                Role::Follower => self.run_follower(),
                Role::PreCandidate => self.run_pre_candidate(),
                Role::Candidate => self.run_candidate(),
                Role::Leader => self.run_leader(),
                Role::Stopped => break,
            }
        }
        debug!("peer {}: event loop exiting", self.id);
    }

    // ---- role loops ----------------------------------------------------

    fn run_follower(&mut self) {
        self.reset_election_deadline();
        debug!("peer {}: became follower at term {}", self.id, self.current_term);
        loop {
            match self.rx.recv_timeout(self.time_until(self.election_deadline)) {
                Ok(event) => {
                    self.handle_event(event);
                    if self.role != Role::Follower {
                        return;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    info!("peer {}: election timeout, becoming pre-candidate", self.id);
                    self.role = Role::PreCandidate;
                    return;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.role = Role::Stopped;
                    return;
                }
            }
        }
    }

    fn run_pre_candidate(&mut self) {
        self.start_pre_vote_round();
        if self.reached_quorum() {
            info!("peer {}: pre-vote quorum reached, becoming candidate", self.id);
            self.role = Role::Candidate;
            return;
        }
        loop {
            match self.rx.recv_timeout(self.time_until(self.election_deadline)) {
                Ok(event) => {
                    self.handle_event(event);
                    if self.role != Role::PreCandidate {
                        return;
                    }
                    if self.reached_quorum() {
                        info!("peer {}: pre-vote quorum reached, becoming candidate", self.id);
                        self.role = Role::Candidate;
                        return;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!("peer {}: pre-vote round timed out, retrying", self.id);
                    self.start_pre_vote_round();
                    if self.reached_quorum() {
                        self.role = Role::Candidate;
                        return;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.role = Role::Stopped;
                    return;
                }
            }
        }
    }

    fn run_candidate(&mut self) {
        self.start_candidate_round();
        if self.reached_quorum() {
            info!("peer {}: election won at term {}", self.id, self.current_term);
            self.role = Role::Leader;
            return;
        }
        loop {
            match self.rx.recv_timeout(self.time_until(self.election_deadline)) {
                Ok(event) => {
                    self.handle_event(event);
                    if self.role != Role::Candidate {
                        return;
                    }
                    if self.reached_quorum() {
                        info!("peer {}: election won at term {}", self.id, self.current_term);
                        self.role = Role::Leader;
                        return;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!("peer {}: election timed out, starting new election", self.id);
                    self.start_candidate_round();
                    if self.reached_quorum() {
                        self.role = Role::Leader;
                        return;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.role = Role::Stopped;
                    return;
                }
            }
        }
    }

    fn run_leader(&mut self) {
        self.become_leader();
        loop {
            match self.rx.recv_timeout(self.time_until(self.next_heartbeat)) {
                Ok(event) => {
                    self.handle_event(event);
                    if self.role != Role::Leader {
                        return;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.broadcast_append_entries();
                    self.next_heartbeat = Instant::now() + self.config.heartbeat_interval;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.role = Role::Stopped;
                    return;
                }
            }
        }
    }

    // ---- shared event dispatch ------------------------------------------

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Command { command, reply } => {
                let result = self.process_command(command);
                let _ = reply.send(result);
            }
            Event::RequestVote { args, reply } => {
                let (resp, reset) = self.process_request_vote(args);
                if reset {
                    self.reset_election_deadline();
                }
                let _ = reply.send(resp);
            }
            Event::AppendEntries { args, reply } => {
                let (resp, reset) = self.process_append_entries(args);
                if reset {
                    self.reset_election_deadline();
                }
                let _ = reply.send(resp);
            }
            Event::RequestVoteReply(resp) => self.process_request_vote_reply(resp),
            Event::AppendEntriesReply(resp) => self.process_append_entries_reply(resp),
            Event::Stop => {
                info!("peer {}: stop requested", self.id);
                self.role = Role::Stopped;
                self.update_shared();
            }
        }
    }

    // ---- command submission ---------------------------------------------

    fn process_command(&mut self, command: Vec<u8>) -> Result<(u64, u64), RaftError> {
        if self.role != Role::Leader {
            return Err(RaftError::NotLeader { leader_hint: self.leader_id });
        }
        let term = self.current_term;
        self.log.push(LogEntry { term, command });
        self.persist();
        let index = self.last_log_index();
        debug!("peer {}: appended command at index {} term {}", self.id, index, term);
        // match_index[self] just moved; a single-node cluster (or one where
        // every other peer already matches) can commit on this append alone,
        // with no AppendEntriesReply ever arriving to trigger it.
        self.try_advance_commit_index();
        self.apply_committed();
        Ok((index, term))
    }

    // ---- RequestVote handling --------------------------------------------

    fn process_request_vote(&mut self, args: RequestVoteArgs) -> (RequestVoteReply, bool) {
        if !args.pre_vote {
            if args.term < self.current_term {
                return (self.deny_vote(false), false);
            }
            if args.term > self.current_term {
                self.adopt_term(args.term);
            }
            if let Some(voted_for) = self.voted_for {
                if voted_for != args.candidate_id {
                    return (self.deny_vote(false), false);
                }
            }
        } else if args.term.saturating_sub(1) < self.current_term {
            return (self.deny_vote(true), false);
        }

        if !self.candidate_log_up_to_date(&args) {
            return (self.deny_vote(args.pre_vote), false);
        }

        if !args.pre_vote {
            self.voted_for = Some(args.candidate_id);
            self.persist();
            info!("peer {}: voted for {} at term {}", self.id, args.candidate_id, self.current_term);
        }

        (
            RequestVoteReply {
                term: self.current_term,
                vote_granted: true,
                pre_vote: args.pre_vote,
                from_id: self.id,
            },
            true,
        )
    }

    fn candidate_log_up_to_date(&self, args: &RequestVoteArgs) -> bool {
        args.last_log_term > self.last_log_term()
            || (args.last_log_term == self.last_log_term() && args.last_log_index >= self.last_log_index())
    }

    fn deny_vote(&self, pre_vote: bool) -> RequestVoteReply {
        RequestVoteReply {
            term: self.current_term,
            vote_granted: false,
            pre_vote,
            from_id: self.id,
        }
    }

    fn process_request_vote_reply(&mut self, reply: RequestVoteReply) {
        let awaiting_pre_vote = self.role == Role::PreCandidate && reply.pre_vote;
        let awaiting_real_vote = self.role == Role::Candidate && !reply.pre_vote;
        if !awaiting_pre_vote && !awaiting_real_vote {
            return;
        }
        if reply.term > self.current_term {
            self.adopt_term(reply.term);
            return;
        }
        if reply.term == self.current_term && reply.vote_granted {
            self.votes_received.insert(reply.from_id);
        }
    }

    // ---- AppendEntries handling -------------------------------------------

    fn process_append_entries(&mut self, args: AppendEntriesArgs) -> (AppendEntriesReply, bool) {
        let mut reply = AppendEntriesReply {
            term: self.current_term,
            success: false,
            inconsistency: false,
            back_up_next_index: 0,
            prev_log_index: args.prev_log_index,
            prev_log_term: args.prev_log_term,
            entries_count: args.entries.len() as u64,
            index: self.last_log_index(),
            commit_index: self.commit_index,
            from_id: self.id,
            request_id: args.request_id,
        };

        if args.term < self.current_term {
            return (reply, false);
        }

        if args.term == self.current_term {
            if matches!(self.role, Role::Candidate | Role::PreCandidate) {
                self.role = Role::Follower;
            }
        } else {
            self.adopt_term(args.term);
        }
        self.leader_id = Some(args.leader_id);
        reply.term = self.current_term;

        if args.prev_log_index < self.commit_index {
            return (reply, true);
        }

        if args.prev_log_index > 0 {
            let len = self.last_log_index();
            let mismatch = len < args.prev_log_index
                || self.log[(args.prev_log_index - 1) as usize].term != args.prev_log_term;
            if mismatch {
                reply.inconsistency = true;
                reply.back_up_next_index = self.back_up_next_index(args.prev_log_index, len);
                return (reply, true);
            }
        }

        self.reconcile_log(&args);

        if args.leader_commit > self.commit_index && self.last_log_index() > self.commit_index {
            self.commit_index = std::cmp::min(args.leader_commit, self.last_log_index());
            self.persist();
        }
        self.apply_committed();

        reply.success = true;
        reply.index = self.last_log_index();
        reply.commit_index = self.commit_index;
        (reply, true)
    }

    /// Computes the earliest index sharing the conflicting entry's term, so
    /// the leader can skip the rest of that term's run in one round trip
    /// instead of backing off by one index per rejected AppendEntries.
    fn back_up_next_index(&self, prev_log_index: u64, existing_len: u64) -> u64 {
        if existing_len < prev_log_index {
            return existing_len + 1;
        }
        let conflict_term = self.log[(prev_log_index - 1) as usize].term;
        let mut idx = prev_log_index;
        while idx > 1 && self.log[(idx - 2) as usize].term == conflict_term {
            idx -= 1;
        }
        idx
    }

    fn reconcile_log(&mut self, args: &AppendEntriesArgs) {
        let existing_len = self.last_log_index();
        let overlap = existing_len.saturating_sub(args.prev_log_index).min(args.entries.len() as u64);
        let mut match_count = 0u64;
        let mut changed = false;
        for k in 0..overlap {
            let pos = (args.prev_log_index + k) as usize;
            let incoming = &args.entries[k as usize];
            if incoming.term != self.log[pos].term || incoming.command != self.log[pos].command {
                if self.log[pos].term == incoming.term {
                    warn!(
                        "peer {}: same-term log mismatch at index {}, truncating",
                        self.id,
                        pos + 1
                    );
                }
                self.log.truncate((args.prev_log_index + k) as usize);
                changed = true;
                break;
            }
            match_count += 1;
        }
        let remaining = &args.entries[match_count as usize..];
        if !remaining.is_empty() {
            self.log.extend_from_slice(remaining);
            changed = true;
        }
        if changed {
            self.persist();
        }
    }

    fn process_append_entries_reply(&mut self, reply: AppendEntriesReply) {
        if self.role != Role::Leader {
            return;
        }
        if reply.request_id < self.request_seq[reply.from_id] {
            return;
        }
        if reply.term > self.current_term {
            self.adopt_term(reply.term);
            return;
        }
        if reply.term < self.current_term {
            return;
        }

        if !reply.success {
            let from = reply.from_id;
            if self.next_index[from] < reply.commit_index + 1 {
                self.next_index[from] = reply.commit_index + 1;
                self.match_index[from] = reply.commit_index;
            } else if reply.inconsistency && self.next_index[from] > 1 {
                if reply.back_up_next_index < self.next_index[from] {
                    self.next_index[from] = reply.back_up_next_index;
                }
                if self.next_index[from] < self.match_index[from] + 1 {
                    self.next_index[from] = self.match_index[from] + 1;
                }
            }
            return;
        }

        let from = reply.from_id;
        let advanced_to = reply.prev_log_index + reply.entries_count + 1;
        if self.next_index[from] < advanced_to {
            self.next_index[from] = advanced_to;
            self.match_index[from] = self.next_index[from] - 1;
        }

        self.try_advance_commit_index();
        self.apply_committed();
    }

    fn try_advance_commit_index(&mut self) {
        let n = self.config.cluster_size;
        let mut match_indices: Vec<u64> = (0..n)
            .map(|p| if p == self.id { self.last_log_index() } else { self.match_index[p] })
            .collect();
        match_indices.sort_unstable_by(|a, b| b.cmp(a));
        let candidate = match_indices[self.quorum() - 1];
        if candidate > self.commit_index
            && candidate >= 1
            && self.log[(candidate - 1) as usize].term == self.current_term
        {
            self.commit_index = candidate;
            self.persist();
            debug!("peer {}: advanced commit index to {}", self.id, candidate);
        }
    }

    fn apply_committed(&mut self) {
        while self.last_applied < self.commit_index {
            self.last_applied += 1;
            let index = self.last_applied;
            let command = self.log[(index - 1) as usize].command.clone();
            let _ = self.apply_tx.send(ApplyMsg {
                command_valid: true,
                command,
                command_index: index,
            });
            self.persist();
        }
    }

    // ---- election / leadership bookkeeping --------------------------------

    fn start_pre_vote_round(&mut self) {
        self.votes_received.clear();
        self.reset_election_deadline();
        let args = RequestVoteArgs {
            term: self.current_term + 1,
            candidate_id: self.id,
            last_log_index: self.last_log_index(),
            last_log_term: self.last_log_term(),
            pre_vote: true,
        };
        self.broadcast_request_vote(args);
    }

    fn start_candidate_round(&mut self) {
        self.current_term += 1;
        self.voted_for = Some(self.id);
        self.persist();
        self.update_shared();
        self.votes_received.clear();
        self.reset_election_deadline();
        info!("peer {}: starting election at term {}", self.id, self.current_term);
        let args = RequestVoteArgs {
            term: self.current_term,
            candidate_id: self.id,
            last_log_index: self.last_log_index(),
            last_log_term: self.last_log_term(),
            pre_vote: false,
        };
        self.broadcast_request_vote(args);
    }

    fn become_leader(&mut self) {
        let last_index = self.last_log_index();
        for p in self.other_peers() {
            self.next_index[p] = last_index + 1;
            self.match_index[p] = 0;
            self.request_seq[p] = self.current_term << 30;
        }
        self.leader_id = Some(self.id);
        self.update_shared();
        info!("peer {}: became leader at term {}", self.id, self.current_term);
        self.broadcast_append_entries();
        self.next_heartbeat = Instant::now() + self.config.heartbeat_interval;
    }

    fn broadcast_request_vote(&mut self, args: RequestVoteArgs) {
        for p in self.other_peers() {
            if let Some(handle) = &self.peers[p] {
                handle.send(PeerThreadMessage::RequestVote(args.clone()));
            }
        }
    }

    fn broadcast_append_entries(&mut self) {
        for p in self.other_peers() {
            let prev_log_index = self.next_index[p].saturating_sub(1);
            let prev_log_term = if prev_log_index == 0 {
                0
            } else {
                self.log[(prev_log_index - 1) as usize].term
            };
            let entries = self.log[(self.next_index[p] - 1) as usize..].to_vec();
            self.request_seq[p] += 1;
            let args = AppendEntriesArgs {
                term: self.current_term,
                leader_id: self.id,
                prev_log_index,
                prev_log_term,
                entries,
                leader_commit: self.commit_index,
                request_id: self.request_seq[p],
            };
            if let Some(handle) = &self.peers[p] {
                handle.send(PeerThreadMessage::AppendEntries(args));
            }
        }
    }

    // ---- small helpers ------------------------------------------------------

    fn other_peers(&self) -> impl Iterator<Item = usize> {
        let id = self.id;
        (0..self.config.cluster_size).filter(move |&p| p != id)
    }

    fn quorum(&self) -> usize {
        self.config.cluster_size / 2 + 1
    }

    fn reached_quorum(&self) -> bool {
        self.votes_received.len() + 1 >= self.quorum()
    }

    fn last_log_index(&self) -> u64 {
        self.log.len() as u64
    }

    fn last_log_term(&self) -> u64 {
        self.log.last().map(|e| e.term).unwrap_or(0)
    }

    fn adopt_term(&mut self, term: u64) {
        self.current_term = term;
        self.voted_for = None;
        self.role = Role::Follower;
        self.persist();
        self.update_shared();
    }

    fn persist(&self) {
        let state = PersistentState {
            current_term: self.current_term,
            voted_for: self.voted_for,
            log: self.log.clone(),
            commit_index: self.commit_index,
            last_applied: self.last_applied,
        };
        self.persister.save(state.encode());
    }

    fn update_shared(&self) {
        let mut shared = self.shared.write().unwrap();
        shared.current_term = self.current_term;
        shared.role = self.role;
    }

    fn reset_election_deadline(&mut self) {
        self.election_deadline = Instant::now() + self.random_election_timeout();
    }

    fn random_election_timeout(&self) -> Duration {
        let min = self.config.election_timeout_min.as_millis() as u64;
        let max = self.config.election_timeout_max.as_millis() as u64;
        let millis = rand::thread_rng().gen_range(min..=max);
        Duration::from_millis(millis)
    }

    fn time_until(&self, deadline: Instant) -> Duration {
        deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryPersister;
    use crate::rpc::RpcClient as RpcClientTrait;
    use std::sync::mpsc::sync_channel;

    struct NullRpc;
    impl RpcClientTrait for NullRpc {
        fn request_vote(&self, _peer: usize, _args: RequestVoteArgs) -> Option<RequestVoteReply> {
            None
        }
        fn append_entries(&self, _peer: usize, _args: AppendEntriesArgs) -> Option<AppendEntriesReply> {
            None
        }
    }

    fn make_core(n: usize, me: usize) -> RaftCore {
        let config = RaftConfig::new(n, me);
        let persister: Arc<dyn Persister> = Arc::new(MemoryPersister::new());
        let rpc: Arc<dyn RpcClient> = Arc::new(NullRpc);
        let (apply_tx, _apply_rx) = sync_channel(16);
        let shared = Arc::new(RwLock::new(SharedView { current_term: 0, role: Role::Follower }));
        let (tx, rx) = std::sync::mpsc::channel();
        RaftCore::new(config, persister, rpc, apply_tx, shared, rx, tx)
    }

    #[test]
    fn grants_vote_to_up_to_date_candidate() {
        let mut core = make_core(3, 0);
        let args = RequestVoteArgs {
            term: 1,
            candidate_id: 1,
            last_log_index: 0,
            last_log_term: 0,
            pre_vote: false,
        };
        let (reply, reset) = core.process_request_vote(args);
        assert!(reply.vote_granted);
        assert!(reset);
        assert_eq!(core.voted_for, Some(1));
    }

    #[test]
    fn denies_second_vote_in_same_term() {
        let mut core = make_core(3, 0);
        let first = RequestVoteArgs { term: 1, candidate_id: 1, last_log_index: 0, last_log_term: 0, pre_vote: false };
        core.process_request_vote(first);
        let second = RequestVoteArgs { term: 1, candidate_id: 2, last_log_index: 0, last_log_term: 0, pre_vote: false };
        let (reply, _) = core.process_request_vote(second);
        assert!(!reply.vote_granted);
    }

    #[test]
    fn denies_vote_for_stale_log() {
        let mut core = make_core(3, 0);
        core.log.push(LogEntry { term: 1, command: vec![1] });
        core.log.push(LogEntry { term: 2, command: vec![2] });
        core.current_term = 2;
        let args = RequestVoteArgs { term: 3, candidate_id: 1, last_log_index: 1, last_log_term: 1, pre_vote: false };
        let (reply, _) = core.process_request_vote(args);
        assert!(!reply.vote_granted);
    }

    #[test]
    fn pre_vote_does_not_mutate_term_or_voted_for() {
        let mut core = make_core(3, 0);
        let args = RequestVoteArgs { term: 1, candidate_id: 1, last_log_index: 0, last_log_term: 0, pre_vote: true };
        let (reply, _) = core.process_request_vote(args);
        assert!(reply.vote_granted);
        assert_eq!(core.current_term, 0);
        assert_eq!(core.voted_for, None);
    }

    #[test]
    fn append_entries_rejects_stale_term() {
        let mut core = make_core(3, 0);
        core.current_term = 5;
        let args = AppendEntriesArgs {
            term: 3,
            leader_id: 1,
            prev_log_index: 0,
            prev_log_term: 0,
            entries: vec![],
            leader_commit: 0,
            request_id: 1,
        };
        let (reply, reset) = core.process_append_entries(args);
        assert!(!reply.success);
        assert!(!reset);
        assert_eq!(reply.term, 5);
    }

    #[test]
    fn append_entries_computes_back_up_next_index_across_term_run() {
        let mut core = make_core(3, 0);
        core.log = vec![
            LogEntry { term: 1, command: vec![] },
            LogEntry { term: 1, command: vec![] },
            LogEntry { term: 1, command: vec![] },
            LogEntry { term: 2, command: vec![] },
        ];
        let args = AppendEntriesArgs {
            term: 2,
            leader_id: 1,
            prev_log_index: 4,
            prev_log_term: 5,
            entries: vec![],
            leader_commit: 0,
            request_id: 1,
        };
        let (reply, _) = core.process_append_entries(args);
        assert!(reply.inconsistency);
        assert_eq!(reply.back_up_next_index, 4);
    }

    #[test]
    fn append_entries_truncates_on_conflicting_entry() {
        let mut core = make_core(3, 0);
        core.log = vec![
            LogEntry { term: 1, command: vec![1] },
            LogEntry { term: 1, command: vec![2] },
        ];
        let args = AppendEntriesArgs {
            term: 2,
            leader_id: 1,
            prev_log_index: 1,
            prev_log_term: 1,
            entries: vec![LogEntry { term: 2, command: vec![9] }],
            leader_commit: 0,
            request_id: 1,
        };
        let (reply, _) = core.process_append_entries(args);
        assert!(reply.success);
        assert_eq!(core.log.len(), 2);
        assert_eq!(core.log[1].term, 2);
        assert_eq!(core.log[1].command, vec![9]);
    }

    #[test]
    fn append_entries_reply_filters_stale_request_id() {
        let mut core = make_core(3, 0);
        core.role = Role::Leader;
        core.current_term = 1;
        core.request_seq[1] = 10;
        let reply = AppendEntriesReply {
            term: 1,
            success: true,
            inconsistency: false,
            back_up_next_index: 0,
            prev_log_index: 0,
            prev_log_term: 0,
            entries_count: 0,
            index: 0,
            commit_index: 0,
            from_id: 1,
            request_id: 5,
        };
        core.next_index[1] = 1;
        core.process_append_entries_reply(reply);
        assert_eq!(core.next_index[1], 1);
    }
}
