// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenario suite.
//!
//! Drives the fusion daemon through its request dispatch with a fake clock
//! (deterministic election, TTL, and readiness behavior), plus one real
//! end-to-end run: fusiond on a TCP socket, an agent pipe watching a
//! tempdir, and a query converging on physical reality.

use std::sync::Arc;
use std::time::Duration;

use fustor_core::{
    AgentId, Clock, Consistency, Event, EventKind, FakeClock, MessageSource, PipeId, SessionId,
    ViewId,
};
use fustor_fusion::config::{FusionConfig, PipeConfig, ViewConfig};
use fustor_fusion::{FusionState, ListenCtx, Listener};
use fustor_wire::{
    ErrorKind, NotReadyReason, PendingCommand, Request, Response, Role,
};
use tokio::sync::Notify;

fn test_config() -> FusionConfig {
    FusionConfig {
        listen: "127.0.0.1:0".into(),
        trust_window_secs: 1.0,
        views: vec![ViewConfig { id: ViewId::new("v") }],
        pipes: vec![PipeConfig {
            id: PipeId::new("p"),
            api_key: "key-p".into(),
            view: ViewId::new("v"),
            schema: "fs".into(),
            enabled: true,
            consistency: Consistency::default(),
        }],
    }
}

fn fusion() -> (ListenCtx<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    let state = Arc::new(FusionState::from_config(&test_config(), clock.clone()));
    (ListenCtx { state, shutdown: Arc::new(Notify::new()) }, clock)
}

fn create_session(ctx: &ListenCtx<FakeClock>, agent: &str) -> (SessionId, Role, u64) {
    match ctx.handle(Request::CreateSession {
        api_key: "key-p".into(),
        agent_id: AgentId::new(agent),
        task_id: format!("{agent}:p"),
    }) {
        Response::SessionCreated { session_id, role, committed_index, .. } => {
            (session_id, role, committed_index)
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

fn heartbeat(ctx: &ListenCtx<FakeClock>, session: &SessionId) -> Response {
    ctx.handle(Request::Heartbeat { session_id: session.clone(), status: None })
}

fn event(
    session: &SessionId,
    kind: EventKind,
    source: MessageSource,
    path: &str,
    mtime: f64,
    index: u64,
) -> Event {
    Event {
        schema: "fs".into(),
        kind,
        path: path.into(),
        mtime,
        size: 1,
        is_dir: false,
        ctime: None,
        parent_mtime: None,
        index,
        source,
        session_id: session.clone(),
        agent_id: AgentId::new("node-a"),
    }
}

fn ingest(
    ctx: &ListenCtx<FakeClock>,
    session: &SessionId,
    source: MessageSource,
    events: Vec<Event>,
    snapshot_end: bool,
) -> Response {
    ctx.handle(Request::Ingest { session_id: session.clone(), source, events, snapshot_end })
}

fn tree(ctx: &ListenCtx<FakeClock>) -> Response {
    ctx.handle(Request::Tree {
        view_id: ViewId::new("v"),
        path: None,
        recursive: true,
        max_depth: None,
        only_path: false,
    })
}

/// Scenario 1: first-come-first-served election and takeover at 3×hb.
#[test]
fn leader_election_fcfs_and_takeover() {
    let (ctx, clock) = fusion();
    let (first, role1, _) = create_session(&ctx, "agent-1");
    let (second, role2, _) = create_session(&ctx, "agent-2");
    assert_eq!(role1, Role::Leader);
    assert_eq!(role2, Role::Follower);

    // Keep agent-2 alive while agent-1 dies silently.
    clock.advance(Duration::from_secs(29));
    assert!(matches!(heartbeat(&ctx, &second), Response::HeartbeatAck { role: Role::Follower, .. }));

    clock.advance(Duration::from_secs(2));
    match heartbeat(&ctx, &second) {
        Response::HeartbeatAck { role, .. } => assert_eq!(role, Role::Leader),
        other => panic!("unexpected response: {other:?}"),
    }
    // The late incumbent converges to follower via its own heartbeat.
    match heartbeat(&ctx, &first) {
        Response::HeartbeatAck { role, .. } => assert_eq!(role, Role::Follower),
        other => panic!("unexpected response: {other:?}"),
    }
}

/// Scenario 2: blind-spot discovery via an audit cycle.
#[test]
fn blind_spot_discovery_marks_agent_missing() {
    let (ctx, _clock) = fusion();
    let (leader, _, _) = create_session(&ctx, "agent-1");
    ingest(&ctx, &leader, MessageSource::Snapshot, vec![], true);

    assert!(matches!(ctx.handle(Request::AuditStart { session_id: leader.clone() }), Response::Ok));
    let response = ingest(
        &ctx,
        &leader,
        MessageSource::Audit,
        vec![event(&leader, EventKind::Insert, MessageSource::Audit, "/share/b.txt", 500_000.0, 1)],
        false,
    );
    assert!(matches!(response, Response::Ingested { accepted: 1, .. }));
    assert!(matches!(ctx.handle(Request::AuditEnd { session_id: leader.clone() }), Response::Ok));

    match tree(&ctx) {
        Response::Tree { root } => {
            let share = &root.children[0];
            let b = &share.children[0];
            assert_eq!(b.path, "/share/b.txt");
            assert!(b.agent_missing, "audit-only path is flagged until realtime clears it");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    // A later realtime event clears the flag.
    ingest(
        &ctx,
        &leader,
        MessageSource::Realtime,
        vec![event(&leader, EventKind::Update, MessageSource::Realtime, "/share/b.txt", 500_001.0, 2)],
        false,
    );
    match tree(&ctx) {
        Response::Tree { root } => {
            assert!(!root.children[0].children[0].agent_missing);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

/// Scenario 3: tombstones forbid late resurrections.
#[test]
fn tombstone_anti_resurrect() {
    let (ctx, _clock) = fusion();
    let (leader, _, _) = create_session(&ctx, "agent-1");
    ingest(&ctx, &leader, MessageSource::Snapshot, vec![], true);

    ingest(
        &ctx,
        &leader,
        MessageSource::Realtime,
        vec![event(&leader, EventKind::Delete, MessageSource::Realtime, "/x", 100.0, 1)],
        false,
    );

    let response = ingest(
        &ctx,
        &leader,
        MessageSource::Snapshot,
        vec![event(&leader, EventKind::Insert, MessageSource::Snapshot, "/x", 90.0, 2)],
        false,
    );
    match response {
        Response::Ingested { accepted, dropped, .. } => {
            assert_eq!(accepted, 0);
            assert_eq!(dropped[0].reason, fustor_wire::DropReason::Tombstoned);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    let response = ingest(
        &ctx,
        &leader,
        MessageSource::Audit,
        vec![event(&leader, EventKind::Insert, MessageSource::Audit, "/x", 95.0, 3)],
        false,
    );
    assert!(matches!(response, Response::Ingested { accepted: 0, .. }));

    // Even a scan row newer than the delete cannot resurrect the path.
    let response = ingest(
        &ctx,
        &leader,
        MessageSource::Audit,
        vec![event(&leader, EventKind::Insert, MessageSource::Audit, "/x", 110.0, 4)],
        false,
    );
    match response {
        Response::Ingested { accepted, dropped, .. } => {
            assert_eq!(accepted, 0);
            assert_eq!(dropped[0].reason, fustor_wire::DropReason::Tombstoned);
        }
        other => panic!("unexpected response: {other:?}"),
    }
    match tree(&ctx) {
        Response::Tree { root } => assert!(root.children.is_empty(), "no node behind a tombstone"),
        other => panic!("unexpected response: {other:?}"),
    }

    let response = ingest(
        &ctx,
        &leader,
        MessageSource::Realtime,
        vec![event(&leader, EventKind::Insert, MessageSource::Realtime, "/x", 110.0, 5)],
        false,
    );
    assert!(matches!(response, Response::Ingested { accepted: 1, .. }));
    match tree(&ctx) {
        Response::Tree { root } => assert_eq!(root.children[0].path, "/x"),
        other => panic!("unexpected response: {other:?}"),
    }
}

/// Scenario 4: a +7200s node cannot poison logical now for others.
#[test]
fn future_dated_mtime_is_contained() {
    let (ctx, clock) = fusion();
    let (leader, _, _) = create_session(&ctx, "agent-1");
    ingest(&ctx, &leader, MessageSource::Snapshot, vec![], true);

    let wall = clock.epoch_secs();
    // A well-behaved stream seeds the skew estimate.
    let mut index = 0;
    for i in 0..16 {
        index += 1;
        ingest(
            &ctx,
            &leader,
            MessageSource::Realtime,
            vec![event(
                &leader,
                EventKind::Insert,
                MessageSource::Realtime,
                &format!("/ok-{i}"),
                wall - 100.0 + i as f64,
                index,
            )],
            false,
        );
    }
    // Then the skewed node reports from two hours in the future.
    index += 1;
    ingest(
        &ctx,
        &leader,
        MessageSource::Realtime,
        vec![event(
            &leader,
            EventKind::Insert,
            MessageSource::Realtime,
            "/future",
            wall + 7200.0,
            index,
        )],
        false,
    );

    let logical_now = ctx.state.skew.now(clock.epoch_secs());
    assert!(
        logical_now < wall + 60.0,
        "logical now {logical_now} must not jump toward the future outlier"
    );
    match tree(&ctx) {
        Response::Tree { root } => {
            let future = root.children.iter().find(|n| n.path == "/future").expect("stored");
            assert!(future.mtime < wall + 60.0, "stored mtime is clamped to the baseline");
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

/// Scenario 5: offsets survive agent restarts; replays are acknowledged
/// without mutation.
#[test]
fn resumable_offset_across_sessions() {
    let (ctx, _clock) = fusion();
    let (first, _, committed) = create_session(&ctx, "agent-1");
    assert_eq!(committed, 0);

    let batch: Vec<Event> = (1..=1000)
        .map(|i| {
            event(
                &first,
                EventKind::Insert,
                MessageSource::Realtime,
                &format!("/f-{i}"),
                1000.0 + i as f64,
                i,
            )
        })
        .collect();
    match ingest(&ctx, &first, MessageSource::Realtime, batch.clone(), false) {
        Response::Ingested { committed_index, .. } => assert_eq!(committed_index, 1000),
        other => panic!("unexpected response: {other:?}"),
    }

    ctx.handle(Request::CloseSession { session_id: first });

    let (second, _, committed) = create_session(&ctx, "agent-1");
    assert_eq!(committed, 1000, "restart resumes after the last acknowledged batch");

    // A replay of already-committed ids mutates nothing.
    match ingest(&ctx, &second, MessageSource::Realtime, batch, false) {
        Response::Ingested { committed_index, accepted, .. } => {
            assert_eq!(committed_index, 1000);
            assert_eq!(accepted, 0);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

/// Scenario 6: readiness transitions around snapshot-end and leader loss.
#[test]
fn readiness_gating() {
    let (ctx, clock) = fusion();
    let (leader, _, _) = create_session(&ctx, "agent-1");

    assert_eq!(tree(&ctx), Response::Unavailable { reason: NotReadyReason::SnapshotIncomplete });

    ingest(
        &ctx,
        &leader,
        MessageSource::Snapshot,
        vec![event(&leader, EventKind::Insert, MessageSource::Snapshot, "/seed", 100.0, 1)],
        true,
    );
    assert!(matches!(tree(&ctx), Response::Tree { .. }));

    // Kill the leader: queries 503 with no_leader until a takeover.
    clock.advance(Duration::from_secs(31));
    assert_eq!(tree(&ctx), Response::Unavailable { reason: NotReadyReason::NoLeader });

    let (follower, _, _) = create_session(&ctx, "agent-2");
    match heartbeat(&ctx, &follower) {
        Response::HeartbeatAck { role, .. } => assert_eq!(role, Role::Leader),
        other => panic!("unexpected response: {other:?}"),
    }
    assert!(matches!(tree(&ctx), Response::Tree { .. }));
}

/// Boundary: leadership lease holds at exactly 3×hb, lapses just beyond.
#[test]
fn leader_timeout_boundary() {
    let (ctx, clock) = fusion();
    let (_leader, _, _) = create_session(&ctx, "agent-1");
    let (follower, _, _) = create_session(&ctx, "agent-2");

    clock.advance(Duration::from_secs(30));
    match heartbeat(&ctx, &follower) {
        Response::HeartbeatAck { role, .. } => assert_eq!(role, Role::Follower),
        other => panic!("unexpected response: {other:?}"),
    }
    clock.advance(Duration::from_millis(50));
    match heartbeat(&ctx, &follower) {
        Response::HeartbeatAck { role, .. } => assert_eq!(role, Role::Leader),
        other => panic!("unexpected response: {other:?}"),
    }
}

/// An audit cycle with no events marks every node and a later full cycle
/// recovers them.
#[test]
fn empty_audit_cycle_is_reversible() {
    let (ctx, _clock) = fusion();
    let (leader, _, _) = create_session(&ctx, "agent-1");
    ingest(
        &ctx,
        &leader,
        MessageSource::Snapshot,
        vec![event(&leader, EventKind::Insert, MessageSource::Snapshot, "/a", 100.0, 1)],
        true,
    );

    ctx.handle(Request::AuditStart { session_id: leader.clone() });
    ctx.handle(Request::AuditEnd { session_id: leader.clone() });
    match tree(&ctx) {
        Response::Tree { root } => assert!(root.children[0].agent_missing),
        other => panic!("unexpected response: {other:?}"),
    }

    ctx.handle(Request::AuditStart { session_id: leader.clone() });
    ingest(
        &ctx,
        &leader,
        MessageSource::Audit,
        vec![event(&leader, EventKind::Update, MessageSource::Audit, "/a", 101.0, 2)],
        false,
    );
    ctx.handle(Request::AuditEnd { session_id: leader.clone() });
    match tree(&ctx) {
        Response::Tree { root } => assert!(!root.children[0].agent_missing),
        other => panic!("unexpected response: {other:?}"),
    }
}

/// Followers cannot run the consistency protocol.
#[test]
fn consistency_api_requires_leadership() {
    let (ctx, _clock) = fusion();
    let (_leader, _, _) = create_session(&ctx, "agent-1");
    let (follower, role, _) = create_session(&ctx, "agent-2");
    assert_eq!(role, Role::Follower);

    for request in [
        Request::AuditStart { session_id: follower.clone() },
        Request::AuditEnd { session_id: follower.clone() },
        Request::SentinelTasks { session_id: follower.clone() },
        Request::SentinelFeedback { session_id: follower.clone(), results: vec![] },
    ] {
        assert!(
            matches!(ctx.handle(request), Response::Error { kind: ErrorKind::NotLeader, .. }),
            "followers must be rejected"
        );
    }
}

/// A new leader on an unseeded pipe is told to snapshot.
#[test]
fn first_leader_is_asked_for_snapshot() {
    let (ctx, _clock) = fusion();
    let (leader, role, _) = create_session(&ctx, "agent-1");
    assert_eq!(role, Role::Leader);
    match heartbeat(&ctx, &leader) {
        Response::HeartbeatAck { pending_commands, .. } => {
            assert!(pending_commands.contains(&PendingCommand::StartSnapshot));
        }
        other => panic!("unexpected response: {other:?}"),
    }
    // Once the snapshot lands, the request stops.
    ingest(&ctx, &leader, MessageSource::Snapshot, vec![], true);
    match heartbeat(&ctx, &leader) {
        Response::HeartbeatAck { pending_commands, .. } => {
            assert!(!pending_commands.contains(&PendingCommand::StartSnapshot));
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

/// End to end: fusiond on TCP, an agent pipe on a tempdir, one realtime
/// mutation observed through the queryable view.
#[tokio::test(flavor = "multi_thread")]
async fn end_to_end_agent_to_view() {
    use fustor_agent::{Client, FsSource, Pipe, TcpTransport};
    use fustor_core::SystemClock;

    let mut config = test_config();
    config.pipes[0].consistency.heartbeat_secs = 0.2;
    config.pipes[0].consistency.batch_interval_ms = 50;
    let state = Arc::new(FusionState::from_config(&config, SystemClock));
    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx { state: Arc::clone(&state), shutdown: Arc::clone(&shutdown) });

    let tcp = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = tcp.local_addr().expect("addr");
    tokio::spawn(Listener::new(tcp, Arc::clone(&ctx)).run());

    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("seed.txt"), b"seed").expect("write");

    let pipe_config = fustor_agent::AgentPipeConfig {
        name: "p".into(),
        root: dir.path().to_path_buf(),
        api_key: "key-p".into(),
        schema: "fs".into(),
        fields_mapping: Default::default(),
        watch_limit: 1024,
        consistency: Consistency {
            heartbeat_secs: 0.2,
            batch_interval_ms: 50,
            ..Default::default()
        },
    };
    let transport = TcpTransport::new(addr.to_string(), Duration::from_secs(5));
    let pipe = Pipe::new(
        pipe_config,
        AgentId::new("node-e2e"),
        FsSource::new(dir.path(), 1024),
        Client::new(transport),
    );
    let runner = Arc::clone(&pipe);
    let task = tokio::spawn(async move { runner.run().await });

    // Wait for the snapshot to land and the view to go ready.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let response = ctx.handle(Request::Tree {
            view_id: ViewId::new("v"),
            path: None,
            recursive: true,
            max_depth: None,
            only_path: false,
        });
        if let Response::Tree { root } = &response {
            if root.children.iter().any(|n| n.path == "/seed.txt") {
                break;
            }
        }
        assert!(tokio::time::Instant::now() < deadline, "view never became ready: {response:?}");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // A realtime mutation flows through.
    std::fs::write(dir.path().join("live.txt"), b"live").expect("write");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let response = ctx.handle(Request::Tree {
            view_id: ViewId::new("v"),
            path: None,
            recursive: true,
            max_depth: None,
            only_path: false,
        });
        if let Response::Tree { root } = &response {
            if root.children.iter().any(|n| n.path == "/live.txt") {
                break;
            }
        }
        assert!(tokio::time::Instant::now() < deadline, "realtime event never arrived");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    pipe.stop();
    task.await.expect("join").expect("clean stop");
}
