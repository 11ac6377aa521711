use thiserror::Error;

/// Errors surfaced across the peer's public API and external-collaborator traits.
///
/// Protocol denials (stale term, log mismatch, already voted) are never
/// represented here — they live in the RPC reply structs themselves, per the
/// Raft wire protocol. This enum only covers the handful of things that can
/// go wrong at the edges of the peer: submitting a command to a non-leader,
/// or losing durable state.
#[derive(Debug, Error)]
pub enum RaftError {
    /// `Start` was called on a peer that does not currently believe it is
    /// the leader. `leader_hint` carries the last peer id this peer saw
    /// acting as leader, if any, so the caller can redirect.
    #[error("not the leader (hint: {leader_hint:?})")]
    NotLeader { leader_hint: Option<usize> },

    /// The event loop has already stopped; submissions made after `Kill()`
    /// land here instead of silently hanging.
    #[error("peer has been killed")]
    Stopped,

    /// A durable write failed. Per the persistence contract (see
    /// `Persister`), this is unrecoverable: we must never acknowledge an
    /// RPC whose backing mutation wasn't made durable, so this variant
    /// exists mostly for the `Persister` impls to report through, not for
    /// the core loop to recover from.
    #[error("failed to persist durable state: {0}")]
    PersistenceFailed(String),
}
