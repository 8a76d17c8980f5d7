// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    online  = { "online",  Some(AgentStatus::Online) },
    idle    = { "idle",    Some(AgentStatus::Idle) },
    busy    = { "busy",    Some(AgentStatus::Busy) },
    ready   = { "ready",   Some(AgentStatus::Ready) },
    offline = { "offline", Some(AgentStatus::Offline) },
    bogus   = { "napping", None },
)]
fn parse_status(s: &str, expected: Option<AgentStatus>) {
    assert_eq!(AgentStatus::parse(s), expected);
}

#[test]
fn register_goes_online_and_takes_capabilities() {
    let mut record = AgentRecord::new(AgentId::new("a1"), "Agent One");
    assert_eq!(record.status, AgentStatus::Offline);
    let system = SystemInfo {
        hostname: "box".to_string(),
        capabilities: vec!["docker".to_string()],
        ..Default::default()
    };
    record.register(system, 500);
    assert_eq!(record.status, AgentStatus::Online);
    assert_eq!(record.capabilities, vec!["docker"]);
    assert_eq!(record.last_heartbeat_ms, 500);
}

#[test]
fn staleness_uses_heartbeat_age() {
    let mut record = AgentRecord::new(AgentId::new("a1"), "a1");
    record.record_heartbeat(Some(AgentStatus::Idle), 0, 1_000);
    let timeout = Duration::from_secs(60);
    assert!(!record.is_stale(61_000, timeout));
    assert!(record.is_stale(61_001, timeout));
    record.mark_offline();
    assert!(!record.is_stale(1_000_000, timeout));
}

#[test]
fn heartbeat_without_status_keeps_status() {
    let mut record = AgentRecord::new(AgentId::new("a1"), "a1");
    record.record_heartbeat(Some(AgentStatus::Busy), 2, 10);
    record.record_heartbeat(None, 1, 20);
    assert_eq!(record.status, AgentStatus::Busy);
    assert_eq!(record.current_jobs, 1);
}
