// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::graph::ShellKind;
use crate::test_support::strategies::*;
use crate::FakeClock;
use proptest::prelude::*;

fn two_step_job(clock: &FakeClock) -> Job {
    let commands = vec![
        Command::script("a", ShellKind::Bash, "echo a"),
        Command::script("b", ShellKind::Bash, "echo b"),
    ];
    Job::new(JobConfig::new("proj", 7, commands), clock)
}

#[test]
fn job_creation() {
    let clock = FakeClock::new();
    let job = two_step_job(&clock);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.current_command, 0);
    assert_eq!(job.build_number, 7);
    assert_eq!(job.created_at_ms, clock.epoch_ms());
    assert!(!job.is_last_command());
    assert!(!job.is_sub_job());
}

#[test]
fn advance_stops_at_end() {
    let clock = FakeClock::new();
    let mut job = two_step_job(&clock);
    assert_eq!(job.advance().map(|c| c.node_id.as_str()), Some("b"));
    assert!(job.is_last_command());
    assert!(job.advance().is_none());
    assert!(job.advance().is_none());
    assert_eq!(job.current_command, job.commands.len());
}

#[test]
fn transition_stamps_times() {
    let clock = FakeClock::new();
    let mut job = two_step_job(&clock);
    job.transition(JobStatus::Dispatched, 10).unwrap();
    assert_eq!(job.dispatched_at_ms, Some(10));
    job.transition(JobStatus::Running, 11).unwrap();
    job.transition(JobStatus::Completed, 12).unwrap();
    assert_eq!(job.finished_at_ms, Some(12));
}

#[test]
fn completed_job_rejects_changes() {
    let clock = FakeClock::new();
    let mut job = two_step_job(&clock);
    job.transition(JobStatus::Dispatched, 1).unwrap();
    job.transition(JobStatus::Completed, 2).unwrap();
    let err = job.transition(JobStatus::Running, 3).unwrap_err();
    assert_eq!(err, TransitionError { from: JobStatus::Completed, to: JobStatus::Running });
    assert!(!job.fail("late", None, 4));
    assert_eq!(job.status, JobStatus::Completed);
}

#[test]
fn failed_job_can_be_redispatched() {
    let clock = FakeClock::new();
    let mut job = two_step_job(&clock);
    job.transition(JobStatus::Dispatched, 1).unwrap();
    assert!(job.fail("agent lost", None, 2));
    assert_eq!(job.error.as_deref(), Some("agent lost"));
    job.transition(JobStatus::Dispatched, 3).unwrap();
    assert_eq!(job.finished_at_ms, None);
}

#[test]
fn rewind_drops_current_attempt_output() {
    let clock = FakeClock::new();
    let mut job = two_step_job(&clock);
    job.append_output("first\n");
    job.begin_attempt();
    job.append_output("partial");
    job.rewind_attempt();
    assert_eq!(job.output, "first\n");
}

#[test]
fn output_is_capped() {
    let clock = FakeClock::new();
    let mut job = two_step_job(&clock);
    job.append_output(&"x".repeat(MAX_OUTPUT_BYTES - 1));
    job.append_output("yz");
    assert_eq!(job.output.len(), MAX_OUTPUT_BYTES);
    job.append_output("more");
    assert_eq!(job.output.len(), MAX_OUTPUT_BYTES);
}

#[yare::parameterized(
    queued     = { JobStatus::Queued,     false },
    dispatched = { JobStatus::Dispatched, false },
    running    = { JobStatus::Running,    false },
    cancelling = { JobStatus::Cancelling, false },
    completed  = { JobStatus::Completed,  true },
    failed     = { JobStatus::Failed,     true },
    cancelled  = { JobStatus::Cancelled,  true },
)]
fn terminal_statuses(status: JobStatus, expected: bool) {
    assert_eq!(status.is_terminal(), expected);
}

#[yare::parameterized(
    dispatch        = { JobStatus::Queued,     JobStatus::Dispatched, true },
    start           = { JobStatus::Dispatched, JobStatus::Running,    true },
    next_command    = { JobStatus::Running,    JobStatus::Dispatched, true },
    cancel_failed   = { JobStatus::Cancelling, JobStatus::Running,    true },
    reconnect_retry = { JobStatus::Failed,     JobStatus::Dispatched, true },
    failed_running  = { JobStatus::Failed,     JobStatus::Running,    false },
    done_again      = { JobStatus::Completed,  JobStatus::Completed,  false },
    cancelled_retry = { JobStatus::Cancelled,  JobStatus::Dispatched, false },
)]
fn transitions(from: JobStatus, to: JobStatus, expected: bool) {
    assert_eq!(from.can_transition_to(to), expected);
}

proptest! {
    #[test]
    fn terminal_statuses_only_leave_via_retry(from in arb_job_status(), to in arb_job_status()) {
        if from.is_terminal() && from.can_transition_to(to) {
            prop_assert_eq!(from, JobStatus::Failed);
            prop_assert_eq!(to, JobStatus::Dispatched);
        }
    }

    #[test]
    fn job_status_serde_roundtrip(status in arb_job_status()) {
        let json = serde_json::to_string(&status).unwrap();
        let parsed: JobStatus = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(status, parsed);
    }
}
