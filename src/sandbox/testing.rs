//! A scripted in-memory sandbox runtime, used by the test suites to
//! exercise the pipeline, scheduler, and HTTP layer without a Docker
//! daemon. Containers are handed out in creation order from a fixed
//! plan, and every lifecycle call is recorded for auditing teardown.

use std::collections::{HashMap, VecDeque};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use parking_lot::Mutex;

use super::{ContainerRuntime, ContainerState, ContainerStatus, SandboxSpec};

/// The scripted behavior of one planned container.
#[derive(Clone, Debug, Default)]
pub struct FakeContainer {
    pub lines: Vec<String>,
    /// Raw chunk emitted after the lines, with no trailing newline.
    pub trailing: Option<String>,
    pub exit_code: i64,
    pub oom_killed: bool,
    /// The output stream never closes; the phase blocks forever.
    pub stall: bool,
    /// Inspect still reports the container running after stream close.
    pub still_running: bool,
    pub fail_start: bool,
}

impl FakeContainer {
    pub fn exits(exit_code: i64, lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            exit_code,
            ..Default::default()
        }
    }

    pub fn success(lines: &[&str]) -> Self {
        Self::exits(0, lines)
    }

    pub fn stalled() -> Self {
        Self {
            stall: true,
            ..Default::default()
        }
    }
}

struct Entry {
    plan: FakeContainer,
    started: bool,
}

#[derive(Default)]
pub struct FakeRuntime {
    plan: Mutex<VecDeque<FakeContainer>>,
    active: Mutex<HashMap<String, Entry>>,
    specs: Mutex<Vec<SandboxSpec>>,
    events: Mutex<Vec<String>>,
    counter: Mutex<u32>,
}

impl FakeRuntime {
    pub fn new(plan: Vec<FakeContainer>) -> Self {
        Self {
            plan: Mutex::new(plan.into()),
            ..Default::default()
        }
    }

    pub fn push(&self, container: FakeContainer) {
        self.plan.lock().push_back(container);
    }

    /// Lifecycle audit trail, e.g. `["create box-1", "start box-1", ...]`.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Specs of every sandbox created so far, in creation order.
    pub fn specs(&self) -> Vec<SandboxSpec> {
        self.specs.lock().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().push(event);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create(&self, spec: &SandboxSpec) -> Result<String> {
        let plan = self
            .plan
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow!("no sandbox scripted for this phase"))?;
        let id = {
            let mut counter = self.counter.lock();
            *counter += 1;
            format!("box-{counter}")
        };
        self.specs.lock().push(spec.clone());
        self.active.lock().insert(
            id.clone(),
            Entry {
                plan,
                started: false,
            },
        );
        self.record(format!("create {id}"));
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        let mut active = self.active.lock();
        let entry = active
            .get_mut(id)
            .ok_or_else(|| anyhow!("unknown sandbox {id}"))?;
        if entry.plan.fail_start {
            return Err(anyhow!("scripted start failure for {id}"));
        }
        entry.started = true;
        drop(active);
        self.record(format!("start {id}"));
        Ok(())
    }

    fn output(&self, id: &str) -> BoxStream<'static, Result<String>> {
        let active = self.active.lock();
        let Some(entry) = active.get(id) else {
            return stream::iter(vec![Err(anyhow!("unknown sandbox {id}"))]).boxed();
        };
        if entry.plan.stall {
            return stream::pending().boxed();
        }
        let mut chunks: Vec<Result<String>> = entry
            .plan
            .lines
            .iter()
            .map(|line| Ok(format!("{line}\n")))
            .collect();
        if let Some(trailing) = &entry.plan.trailing {
            chunks.push(Ok(trailing.clone()));
        }
        stream::iter(chunks).boxed()
    }

    async fn inspect(&self, id: &str) -> Result<ContainerState> {
        let active = self.active.lock();
        let entry = active
            .get(id)
            .ok_or_else(|| anyhow!("unknown sandbox {id}"))?;
        let status = if !entry.started {
            ContainerStatus::Created
        } else if entry.plan.still_running {
            ContainerStatus::Running
        } else {
            ContainerStatus::Exited
        };
        Ok(ContainerState {
            status,
            exit_code: entry.plan.exit_code,
            oom_killed: entry.plan.oom_killed,
        })
    }

    async fn kill(&self, id: &str) -> Result<()> {
        if let Some(entry) = self.active.lock().get_mut(id) {
            entry.plan.still_running = false;
        }
        self.record(format!("kill {id}"));
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.record(format!("stop {id}"));
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.active.lock().remove(id);
        self.record(format!("remove {id}"));
        Ok(())
    }
}
