use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rusty_raft::{ApplyMsg, ChannelRpcClient, MemoryPersister, Raft, RaftConfig, RaftEndpoint};

fn build_cluster(n: usize) -> (Vec<Arc<Raft>>, Vec<Receiver<ApplyMsg>>) {
    let rpc = Arc::new(ChannelRpcClient::new());
    let mut rafts = Vec::with_capacity(n);
    let mut applies = Vec::with_capacity(n);
    for me in 0..n {
        let config = RaftConfig::new(n, me);
        let persister = Arc::new(MemoryPersister::new());
        let (apply_tx, apply_rx) = sync_channel(64);
        let raft = Arc::new(Raft::new(config, persister, rpc.clone(), apply_tx));
        rpc.register(me, raft.clone() as Arc<dyn RaftEndpoint>);
        rafts.push(raft);
        applies.push(apply_rx);
    }
    (rafts, applies)
}

fn await_leader(rafts: &[Arc<Raft>], timeout: Duration) -> Option<usize> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(i) = rafts.iter().position(|r| r.get_state().1) {
            return Some(i);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    None
}

#[test]
fn elects_exactly_one_leader() {
    let (rafts, _applies) = build_cluster(3);
    let leader = await_leader(&rafts, Duration::from_secs(2)).expect("no leader elected");
    let leader_count = rafts.iter().filter(|r| r.get_state().1).count();
    assert_eq!(leader_count, 1);
    let (term, _) = rafts[leader].get_state();
    assert!(term >= 1);
}

#[test]
fn replicates_a_command_to_a_majority() {
    let (rafts, applies) = build_cluster(3);
    let leader = await_leader(&rafts, Duration::from_secs(2)).expect("no leader elected");

    let (index, term) = rafts[leader].start(b"hello".to_vec()).expect("start failed on leader");
    assert_eq!(index, 1);
    assert!(term >= 1);

    let mut applied = 0;
    for rx in &applies {
        if let Ok(msg) = rx.recv_timeout(Duration::from_secs(2)) {
            assert!(msg.command_valid);
            assert_eq!(msg.command, b"hello".to_vec());
            assert_eq!(msg.command_index, 1);
            applied += 1;
        }
    }
    assert!(applied >= 2, "expected a majority to apply the command, only {applied} did");
}

#[test]
fn non_leader_rejects_start_with_leader_hint() {
    let (rafts, _applies) = build_cluster(3);
    let leader = await_leader(&rafts, Duration::from_secs(2)).expect("no leader elected");
    let follower = (0..rafts.len()).find(|&i| i != leader).unwrap();

    let err = rafts[follower].start(b"nope".to_vec()).unwrap_err();
    assert!(matches!(err, rusty_raft::RaftError::NotLeader { .. }));
}

#[test]
fn cluster_re_elects_after_leader_is_killed() {
    let (rafts, _applies) = build_cluster(3);
    let first_leader = await_leader(&rafts, Duration::from_secs(2)).expect("no leader elected");
    rafts[first_leader].kill();

    let second_leader =
        await_leader(&rafts, Duration::from_secs(3)).expect("no replacement leader elected");
    assert_ne!(first_leader, second_leader);
}

#[test]
fn single_node_cluster_is_trivially_its_own_leader() {
    let (rafts, applies) = build_cluster(1);
    let leader = await_leader(&rafts, Duration::from_secs(2)).expect("single node never self-elects");
    assert_eq!(leader, 0);

    let (index, _term) = rafts[0].start(b"solo".to_vec()).unwrap();
    let msg = applies[0].recv_timeout(Duration::from_secs(1)).expect("command never applied");
    assert_eq!(msg.command_index, index);
}

#[test]
fn survives_five_node_cluster_with_repeated_commands() {
    let (rafts, applies) = build_cluster(5);
    let leader = await_leader(&rafts, Duration::from_secs(2)).expect("no leader elected");

    for i in 0..5u8 {
        rafts[leader].start(vec![i]).expect("start failed");
    }

    let mut counts = vec![0usize; 5];
    for (i, rx) in applies.iter().enumerate() {
        while let Ok(_msg) = rx.recv_timeout(Duration::from_millis(500)) {
            counts[i] += 1;
        }
    }
    let fully_caught_up = counts.iter().filter(|&&c| c == 5).count();
    assert!(fully_caught_up >= 3, "expected a majority fully caught up, got {counts:?}");
}
