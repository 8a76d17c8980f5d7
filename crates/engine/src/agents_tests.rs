// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use weft_core::FakeClock;

fn known(id: &str, name: &str) -> KnownAgent {
    KnownAgent {
        id: AgentId::new(id),
        name: name.to_string(),
        token: format!("tok-{id}"),
        capabilities: vec![],
        max_concurrent_jobs: 1,
    }
}

fn registry(agents: &[(&str, &str)]) -> (AgentRegistry<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    let known = agents.iter().map(|(id, name)| known(id, name)).collect();
    (AgentRegistry::new(known, clock.clone()), clock)
}

/// Authenticate and register, returning the receiving half.
fn connect(
    reg: &AgentRegistry<FakeClock>,
    id: &str,
) -> mpsc::UnboundedReceiver<ServerMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    reg.authenticate(&format!("tok-{id}"), tx).unwrap();
    reg.register(&AgentId::new(id), SystemInfo::default()).unwrap();
    rx
}

#[test]
fn bad_token_is_rejected() {
    let (reg, _) = registry(&[("a1", "A1")]);
    let (tx, _rx) = mpsc::unbounded_channel();
    assert_eq!(reg.authenticate("nope", tx), Err(AuthError::InvalidToken));
    assert!(!reg.is_connected(&AgentId::new("a1")));
}

#[test]
fn register_requires_connection() {
    let (reg, _) = registry(&[("a1", "A1")]);
    let err = reg.register(&AgentId::new("a1"), SystemInfo::default()).unwrap_err();
    assert_eq!(err, AuthError::NotAuthenticated(AgentId::new("a1")));
}

#[test]
fn register_brings_agent_online() {
    let (reg, _) = registry(&[("a1", "A1")]);
    let _rx = connect(&reg, "a1");
    let record = reg.get(&AgentId::new("a1")).unwrap();
    assert_eq!(record.status, AgentStatus::Online);
    assert!(record.connected_at_ms.is_some());
}

#[test]
fn authenticated_but_unregistered_is_not_available() {
    let (reg, _) = registry(&[("a1", "A1")]);
    let (tx, _rx) = mpsc::unbounded_channel();
    reg.authenticate("tok-a1", tx).unwrap();
    assert_eq!(reg.find_available(None), None);
}

#[test]
fn required_agent_is_never_substituted() {
    let (reg, _) = registry(&[("a1", "A1"), ("a2", "A2")]);
    let _rx = connect(&reg, "a1");
    assert_eq!(reg.find_available(Some("a2")), None);
    assert_eq!(reg.find_available(Some("a1")), Some(AgentId::new("a1")));
}

#[test]
fn unrequired_selection_is_first_by_id() {
    let (reg, _) = registry(&[("b", "B"), ("a", "A"), ("c", "C")]);
    let _rb = connect(&reg, "b");
    let _rc = connect(&reg, "c");
    assert_eq!(reg.find_available(None), Some(AgentId::new("b")));
}

#[test]
fn local_alias_resolves_by_name() {
    let (reg, _) = registry(&[("a1", "A1"), ("box", LOCAL_AGENT_NAME)]);
    let _r1 = connect(&reg, "a1");
    assert_eq!(reg.find_available(Some(LOCAL_AGENT_ALIAS)), None);
    let _r2 = connect(&reg, "box");
    assert_eq!(reg.find_available(Some(LOCAL_AGENT_ALIAS)), Some(AgentId::new("box")));
    assert!(reg.satisfies(&AgentId::new("box"), Some(LOCAL_AGENT_ALIAS)));
    assert!(!reg.satisfies(&AgentId::new("a1"), Some(LOCAL_AGENT_ALIAS)));
}

#[yare::parameterized(
    busy  = { "busy" },
    idle  = { "idle" },
    ready = { "ready" },
)]
fn live_statuses_are_selectable(status: &str) {
    let (reg, _) = registry(&[("a1", "A1")]);
    let _rx = connect(&reg, "a1");
    reg.heartbeat(&AgentId::new("a1"), Some(status), 1);
    assert_eq!(reg.find_available(Some("a1")), Some(AgentId::new("a1")));
}

#[test]
fn offline_heartbeat_removes_from_selection() {
    let (reg, _) = registry(&[("a1", "A1")]);
    let _rx = connect(&reg, "a1");
    reg.heartbeat(&AgentId::new("a1"), Some("offline"), 0);
    assert_eq!(reg.find_available(None), None);
}

#[test]
fn heartbeat_before_register_creates_record() {
    let (reg, _) = registry(&[]);
    reg.heartbeat(&AgentId::new("ghost"), None, 3);
    let record = reg.get(&AgentId::new("ghost")).unwrap();
    assert_eq!(record.current_jobs, 3);
    assert_eq!(record.status, AgentStatus::Offline);
}

#[test]
fn send_reaches_connection() {
    let (reg, _) = registry(&[("a1", "A1")]);
    let mut rx = connect(&reg, "a1");
    let job_id = weft_core::JobId::from_string("job-1");
    assert!(reg.send(&AgentId::new("a1"), ServerMessage::CancelJob { job_id: job_id.clone() }));
    assert_eq!(rx.try_recv().unwrap(), ServerMessage::CancelJob { job_id });
}

#[test]
fn send_fails_without_connection() {
    let (reg, _) = registry(&[("a1", "A1")]);
    let job_id = weft_core::JobId::from_string("job-1");
    assert!(!reg.send(&AgentId::new("a1"), ServerMessage::CancelJob { job_id }));
}

#[test]
fn disconnect_marks_offline_and_keeps_metadata() {
    let (reg, _) = registry(&[("a1", "A1")]);
    let _rx = connect(&reg, "a1");
    assert!(reg.disconnect(&AgentId::new("a1"), None));
    let record = reg.get(&AgentId::new("a1")).unwrap();
    assert_eq!(record.status, AgentStatus::Offline);
    assert_eq!(record.name, "A1");
    assert!(!reg.disconnect(&AgentId::new("a1"), None));
}

#[test]
fn stale_session_disconnect_leaves_new_connection() {
    let (reg, _) = registry(&[("a1", "A1")]);
    let (tx1, _rx1) = mpsc::unbounded_channel();
    let old = reg.authenticate("tok-a1", tx1).unwrap();
    let (tx2, _rx2) = mpsc::unbounded_channel();
    let new = reg.authenticate("tok-a1", tx2).unwrap();
    assert_ne!(old.session, new.session);

    assert!(!reg.disconnect(&old.agent_id, Some(old.session)));
    assert!(reg.is_connected(&old.agent_id));
    assert!(reg.disconnect(&new.agent_id, Some(new.session)));
}

#[test]
fn stale_agents_by_heartbeat_age() {
    let (reg, clock) = registry(&[("a1", "A1"), ("a2", "A2")]);
    let _r1 = connect(&reg, "a1");
    let _r2 = connect(&reg, "a2");
    clock.advance(Duration::from_secs(30));
    reg.heartbeat(&AgentId::new("a2"), None, 0);
    clock.advance(Duration::from_secs(40));

    assert_eq!(reg.stale_agents(Duration::from_secs(60)), vec![AgentId::new("a1")]);
}

#[test]
fn list_is_sorted() {
    let (reg, _) = registry(&[("z", "Z"), ("a", "A")]);
    let ids: Vec<String> = reg.list().into_iter().map(|r| r.id.to_string()).collect();
    assert_eq!(ids, vec!["a", "z"]);
}
