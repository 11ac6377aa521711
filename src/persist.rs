use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::types::LogEntry;

/// The durable tuple a peer must write before acknowledging any RPC whose
/// correctness depends on it. Encoded with `bincode`; decode failure (empty
/// blob on first boot, or corruption) is handled by the caller, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistentState {
    pub current_term: u64,
    pub voted_for: Option<usize>,
    pub log: Vec<LogEntry>,
    pub commit_index: u64,
    pub last_applied: u64,
}

impl PersistentState {
    pub fn zero() -> Self {
        PersistentState {
            current_term: 0,
            voted_for: None,
            log: Vec::new(),
            commit_index: 0,
            last_applied: 0,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("PersistentState is always serializable")
    }

    pub fn decode(blob: &[u8]) -> Option<Self> {
        if blob.is_empty() {
            return None;
        }
        bincode::deserialize(blob).ok()
    }
}

/// Durable storage seam for a peer's `PersistentState`. `save` must not
/// return until the blob is durable; a peer that can't guarantee that has
/// no business implementing this trait, since the core loop treats a
/// failed `save` as fatal.
pub trait Persister: Send + Sync {
    fn save(&self, blob: Vec<u8>);
    fn read(&self) -> Vec<u8>;
}

/// A `Persister` backed by nothing but process memory. Useful for tests and
/// for embedding a peer that doesn't need to survive a restart.
#[derive(Default)]
pub struct MemoryPersister {
    blob: Mutex<Vec<u8>>,
}

impl MemoryPersister {
    pub fn new() -> Self {
        MemoryPersister::default()
    }
}

impl Persister for MemoryPersister {
    fn save(&self, blob: Vec<u8>) {
        *self.blob.lock().unwrap() = blob;
    }

    fn read(&self) -> Vec<u8> {
        self.blob.lock().unwrap().clone()
    }
}

/// A `Persister` backed by a single file on disk, written via a
/// write-to-temp-then-rename so a crash mid-write never leaves a
/// half-written blob in place of the previous good one.
pub struct FilePersister {
    path: PathBuf,
}

impl FilePersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePersister { path: path.into() }
    }

    fn write_atomic(&self, blob: &[u8]) -> io::Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, blob)?;
        fs::rename(&tmp_path, &self.path)
    }
}

impl Persister for FilePersister {
    fn save(&self, blob: Vec<u8>) {
        self.write_atomic(&blob)
            .unwrap_or_else(|e| panic!("failed to persist durable raft state to {:?}: {}", self.path, e));
    }

    fn read(&self) -> Vec<u8> {
        fs::read(&self.path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let state = PersistentState {
            current_term: 7,
            voted_for: Some(2),
            log: vec![
                LogEntry { term: 1, command: b"a".to_vec() },
                LogEntry { term: 3, command: b"b".to_vec() },
            ],
            commit_index: 2,
            last_applied: 1,
        };
        let blob = state.encode();
        let decoded = PersistentState::decode(&blob).unwrap();
        assert_eq!(state, decoded);
    }

    #[test]
    fn empty_blob_decodes_to_none() {
        assert!(PersistentState::decode(&[]).is_none());
    }

    #[test]
    fn corrupt_blob_decodes_to_none() {
        assert!(PersistentState::decode(&[1, 2, 3]).is_none());
    }

    #[test]
    fn memory_persister_round_trips() {
        let p = MemoryPersister::new();
        assert!(p.read().is_empty());
        let state = PersistentState::zero();
        p.save(state.encode());
        let decoded = PersistentState::decode(&p.read()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn file_persister_round_trips() {
        let mut path = std::env::temp_dir();
        path.push(format!("rusty_raft_test_{}.bin", std::process::id()));
        let p = FilePersister::new(path.clone());
        let state = PersistentState {
            current_term: 4,
            voted_for: None,
            log: vec![LogEntry { term: 1, command: b"x".to_vec() }],
            commit_index: 1,
            last_applied: 1,
        };
        p.save(state.encode());
        let decoded = PersistentState::decode(&p.read()).unwrap();
        assert_eq!(decoded, state);
        let _ = fs::remove_file(&path);
    }
}
