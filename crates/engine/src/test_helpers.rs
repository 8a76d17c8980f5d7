// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use crate::agents::{AgentSession, KnownAgent};
use crate::hooks::fake::{FinishedBuild, Recorder};
use crate::runtime::{Runtime, RuntimeConfig, RuntimeDeps};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use weft_core::{AgentId, FakeClock, Job, JobId};
use weft_storage::MemoryStore;
use weft_wire::{AgentMessage, ExecuteJob, Registration, ServerMessage};

const WAIT: Duration = Duration::from_secs(5);

pub(crate) type TestRuntime = Runtime<FakeClock>;

pub(crate) struct TestContext {
    pub runtime: Arc<TestRuntime>,
    pub clock: FakeClock,
    pub store: Arc<MemoryStore>,
    pub recorder: Arc<Recorder>,
}

/// One connected agent whose outbound queue the test reads
pub(crate) struct StubAgent {
    pub session: AgentSession,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

pub(crate) fn known_agent(id: &str, name: &str) -> KnownAgent {
    KnownAgent {
        id: AgentId::new(id),
        name: name.to_string(),
        token: format!("tok-{id}"),
        capabilities: vec![],
        max_concurrent_jobs: 4,
    }
}

/// Runtime over a memory store with the given `(id, name)` agents configured.
pub(crate) fn setup_with(agents: &[(&str, &str)]) -> TestContext {
    setup_with_store(agents, Arc::new(MemoryStore::new()))
}

pub(crate) fn setup_with_store(agents: &[(&str, &str)], store: Arc<MemoryStore>) -> TestContext {
    let clock = FakeClock::new();
    let recorder = Arc::new(Recorder::default());
    let runtime = Runtime::new(
        RuntimeDeps {
            store: Arc::clone(&store) as Arc<dyn weft_storage::Store>,
            hooks: recorder.hooks(),
            agents: agents.iter().map(|(id, name)| known_agent(id, name)).collect(),
        },
        RuntimeConfig::default()
            .completion_timeout(WAIT)
            .poll_interval(Duration::from_millis(10))
            .poll_attempts(3),
        clock.clone(),
    );
    TestContext { runtime, clock, store, recorder }
}

/// Runtime with agents named after their ids.
pub(crate) fn setup(agent_ids: &[&str]) -> TestContext {
    let agents: Vec<(&str, &str)> = agent_ids.iter().map(|id| (*id, *id)).collect();
    setup_with(&agents)
}

impl TestContext {
    /// Authenticate and register an agent, consuming the handshake replies.
    pub async fn connect(&self, id: &str) -> StubAgent {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = self.runtime.connect_agent(&format!("tok-{id}"), tx).unwrap();
        let mut agent = StubAgent { session, rx };
        assert!(matches!(agent.next().await, ServerMessage::Authenticated { .. }));
        self.runtime
            .on_agent_message(&agent.session, AgentMessage::Register(Registration::default()))
            .await;
        assert!(matches!(agent.next().await, ServerMessage::Registered { .. }));
        agent
    }

    pub async fn send(&self, agent: &StubAgent, msg: AgentMessage) {
        self.runtime.on_agent_message(&agent.session, msg).await;
    }

    pub async fn complete(&self, agent: &StubAgent, job_id: &JobId) {
        self.send(agent, AgentMessage::JobComplete { job_id: job_id.clone(), exit_code: 0, output: None })
            .await;
    }

    pub async fn complete_with(&self, agent: &StubAgent, job_id: &JobId, exit_code: i32, output: &str) {
        let msg = AgentMessage::JobComplete {
            job_id: job_id.clone(),
            exit_code,
            output: Some(output.to_string()),
        };
        self.send(agent, msg).await;
    }

    pub async fn disconnect(&self, agent: &StubAgent) {
        self.runtime.agent_disconnected(&agent.session).await;
    }

    pub fn job(&self, id: &JobId) -> Job {
        self.runtime.jobs().get(id).unwrap()
    }

    /// Wait until `n` builds have been reported finished.
    pub async fn wait_for_builds(&self, n: usize) -> Vec<FinishedBuild> {
        tokio::time::timeout(WAIT, async {
            loop {
                let finished = self.recorder.finished();
                if finished.len() >= n {
                    return finished;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("builds did not finish")
    }

    /// Answer every `execute_job` on this agent after a short delay. The
    /// predicate picks which ones fail.
    pub fn auto_respond(
        &self,
        agent: StubAgent,
        fails: impl Fn(&ExecuteJob) -> bool + Send + Sync + 'static,
    ) -> Arc<Responder> {
        let responder = Arc::new(Responder::default());
        let runtime = Arc::clone(&self.runtime);
        let stats = Arc::clone(&responder);
        let fails = Arc::new(fails);
        let StubAgent { session, mut rx } = agent;
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let ServerMessage::ExecuteJob(exec) = msg else { continue };
                let runtime = Arc::clone(&runtime);
                let stats = Arc::clone(&stats);
                let session = session.clone();
                let failed = fails(&exec);
                stats.started(&exec);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    stats.finished();
                    let exit_code = if failed { 1 } else { 0 };
                    let msg = AgentMessage::JobComplete { job_id: exec.job_id, exit_code, output: None };
                    runtime.on_agent_message(&session, msg).await;
                });
            }
        });
        responder
    }
}

impl StubAgent {
    pub async fn next(&mut self) -> ServerMessage {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for server message")
            .expect("connection closed")
    }

    /// Next `execute_job`, skipping anything else.
    pub async fn next_execute(&mut self) -> ExecuteJob {
        loop {
            if let ServerMessage::ExecuteJob(exec) = self.next().await {
                return exec;
            }
        }
    }

    pub fn try_next(&mut self) -> Option<ServerMessage> {
        self.rx.try_recv().ok()
    }
}

/// Counters kept by [`TestContext::auto_respond`]
#[derive(Default)]
pub(crate) struct Responder {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pub executed: Mutex<Vec<ExecuteJob>>,
}

impl Responder {
    fn started(&self, exec: &ExecuteJob) {
        self.executed.lock().push(exec.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Node ids of every dispatched command, in dispatch order
    pub fn nodes(&self) -> Vec<String> {
        self.executed.lock().iter().map(|e| e.sequence.node_id.clone()).collect()
    }
}
