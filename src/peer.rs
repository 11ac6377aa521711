use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use log::trace;

use crate::consensus::Event;
use crate::rpc::{AppendEntriesArgs, RequestVoteArgs, RpcClient};

/// Work handed from the event loop to one peer's background sender thread.
pub enum PeerThreadMessage {
    AppendEntries(AppendEntriesArgs),
    RequestVote(RequestVoteArgs),
    Shutdown,
}

/// The event loop's handle onto one other cluster member's background
/// thread. Dropping it signals `Shutdown` and joins, so a peer's RPC fan-out
/// threads never outlive the `RaftCore` that owns them.
pub struct PeerHandle {
    pub id: usize,
    to_peer: Sender<PeerThreadMessage>,
    thread: Option<JoinHandle<()>>,
}

impl PeerHandle {
    pub fn spawn(id: usize, rpc: Arc<dyn RpcClient>, to_main: Sender<Event>) -> PeerHandle {
        let (to_peer, from_main) = std::sync::mpsc::channel();
        let peer = Peer { id, rpc, to_main, from_main };
        let thread = thread::Builder::new()
            .name(format!("raft-peer-{id}"))
            .spawn(move || peer.run())
            .expect("failed to spawn peer thread");
        PeerHandle { id, to_peer, thread: Some(thread) }
    }

    /// Best-effort dispatch: a peer thread that has already been asked to
    /// shut down (or whose mailbox is full of a crashed receiver) simply
    /// drops the message, matching how a real transport would drop a
    /// request it can no longer deliver.
    pub fn send(&self, msg: PeerThreadMessage) {
        let _ = self.to_peer.send(msg);
    }
}

impl Drop for PeerHandle {
    fn drop(&mut self) {
        let _ = self.to_peer.send(PeerThreadMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Background thread that turns `PeerThreadMessage`s into blocking calls on
/// the shared `RpcClient` and feeds replies back into the event loop's
/// ingress channel. One of these runs per other cluster member so a slow
/// or partitioned peer never stalls delivery to the rest of the cluster.
struct Peer {
    id: usize,
    rpc: Arc<dyn RpcClient>,
    to_main: Sender<Event>,
    from_main: Receiver<PeerThreadMessage>,
}

impl Peer {
    fn run(self) {
        loop {
            match self.from_main.recv() {
                Ok(PeerThreadMessage::AppendEntries(args)) => {
                    if let Some(reply) = self.rpc.append_entries(self.id, args) {
                        let _ = self.to_main.send(Event::AppendEntriesReply(reply));
                    } else {
                        trace!("append_entries to peer {} failed (transport)", self.id);
                    }
                }
                Ok(PeerThreadMessage::RequestVote(args)) => {
                    if let Some(reply) = self.rpc.request_vote(self.id, args) {
                        let _ = self.to_main.send(Event::RequestVoteReply(reply));
                    } else {
                        trace!("request_vote to peer {} failed (transport)", self.id);
                    }
                }
                Ok(PeerThreadMessage::Shutdown) | Err(_) => return,
            }
        }
    }
}
