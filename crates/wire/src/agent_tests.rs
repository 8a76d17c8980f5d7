// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use weft_core::ShellKind;

#[test]
fn parses_authenticate() {
    let msg = parse_agent_message(r#"{"type":"authenticate","token":"s3cret"}"#).unwrap();
    assert_eq!(msg, AgentMessage::Authenticate { token: "s3cret".into() });
    assert_eq!(msg.kind(), "authenticate");
}

#[test]
fn parses_register_with_system_info() {
    let msg = parse_agent_message(
        r#"{"type":"register","hostname":"box","platform":"linux","architecture":"x86_64",
            "capabilities":["docker"],"version":"1.2.0","systemInfo":{"cpus":8}}"#,
    )
    .unwrap();
    let AgentMessage::Register(reg) = msg else { panic!("not register") };
    let info: SystemInfo = reg.into();
    assert_eq!(info.hostname, "box");
    assert_eq!(info.capabilities, vec!["docker"]);
    assert_eq!(info.extra, json!({"cpus": 8}));
}

#[test]
fn heartbeat_fields_are_optional() {
    let msg = parse_agent_message(r#"{"type":"heartbeat"}"#).unwrap();
    assert_eq!(msg, AgentMessage::Heartbeat { status: None, current_jobs: 0 });
    let msg = parse_agent_message(r#"{"type":"heartbeat","status":"busy","currentJobs":2}"#).unwrap();
    assert_eq!(msg, AgentMessage::Heartbeat { status: Some("busy".into()), current_jobs: 2 });
}

#[yare::parameterized(
    started       = { "started",       ReportedStatus::Started },
    failed        = { "failed",        ReportedStatus::Failed },
    cancelled     = { "cancelled",     ReportedStatus::Cancelled },
    cancelling    = { "cancelling",    ReportedStatus::Cancelling },
    cancel_failed = { "cancel_failed", ReportedStatus::CancelFailed },
)]
fn parses_job_status(raw: &str, expected: ReportedStatus) {
    let text = json!({"type": "job_status", "jobId": "job-1", "status": raw}).to_string();
    let msg = parse_agent_message(&text).unwrap();
    assert_eq!(msg.job_id().map(|j| j.as_str()), Some("job-1"));
    let AgentMessage::JobStatus { status, message, .. } = msg else { panic!("not job_status") };
    assert_eq!(status, expected);
    assert_eq!(message, None);
}

#[test]
fn job_complete_uses_camel_case() {
    let msg = parse_agent_message(r#"{"type":"job_complete","jobId":"job-9","exitCode":3}"#).unwrap();
    assert_eq!(
        msg,
        AgentMessage::JobComplete { job_id: JobId::from_string("job-9"), exit_code: 3, output: None }
    );
}

#[test]
fn unknown_message_type_is_an_error() {
    assert!(parse_agent_message(r#"{"type":"teleport"}"#).is_err());
    assert!(parse_agent_message("not json").is_err());
}

#[test]
fn execute_job_wire_shape() {
    let msg = ServerMessage::ExecuteJob(ExecuteJob {
        job_id: JobId::from_string("job-1"),
        project_id: "proj".into(),
        commands: vec![AgentScript {
            shell: ShellKind::Bash,
            script: "echo hi".into(),
            label: "Say hi".into(),
            node_id: "n1".into(),
        }],
        environment: HashMap::from([("A".to_string(), "1".to_string())]),
        working_directory: None,
        timeout: Some(60),
        job_type: "script".into(),
        retry: None,
        sequence: Sequence { index: 0, total: 2, node_id: "n1".into(), label: "Say hi".into() },
    });
    let value: Value = serde_json::from_str(&to_text(&msg).unwrap()).unwrap();
    assert_eq!(value["type"], "execute_job");
    assert_eq!(value["jobId"], "job-1");
    assert_eq!(value["jobType"], "script");
    assert_eq!(value["commands"][0]["type"], "bash");
    assert_eq!(value["commands"][0]["nodeId"], "n1");
    assert_eq!(value["sequence"]["total"], 2);
    assert!(value.get("workingDirectory").is_none());
}

#[test]
fn cancel_job_wire_shape() {
    let msg = ServerMessage::CancelJob { job_id: JobId::from_string("job-2") };
    assert_eq!(to_text(&msg).unwrap(), r#"{"type":"cancel_job","jobId":"job-2"}"#);
}

#[test]
fn auth_messages_wire_shape() {
    let ok = ServerMessage::Authenticated { agent_id: AgentId::new("a1") };
    assert_eq!(to_text(&ok).unwrap(), r#"{"type":"authenticated","agentId":"a1"}"#);
    let err = ServerMessage::AuthError { message: "bad token".into() };
    assert_eq!(err.kind(), "auth_error");
}
