mod docker;
pub mod testing;

pub use docker::DockerRuntime;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use crate::job::{Job, JobStatus};
use crate::parser::{self, Classification, ParseMode};

/// A host-path-to-sandbox-path file exposure, used instead of copying
/// staged files into the sandbox image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountBinding {
    /// Path as resolved by the sandbox runtime.
    pub source: String,
    /// Path inside the sandbox.
    pub target: String,
    pub read_only: bool,
}

/// Everything needed to execute one prepared phase.
#[derive(Clone, Debug)]
pub struct SandboxSpec {
    pub image: String,
    /// Entrypoint script filename, resolved against the working dir.
    pub command: String,
    pub mounts: Vec<MountBinding>,
    /// Memory limit in bytes; unlimited when absent (build phases).
    pub memory_limit: Option<u64>,
    pub memswap_limit: Option<i64>,
    /// Read-only root filesystem; writes only land in the mounts.
    pub read_only: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Exited,
    Other,
}

/// Terminal state reported by the sandbox runtime.
#[derive(Clone, Copy, Debug)]
pub struct ContainerState {
    pub status: ContainerStatus,
    pub exit_code: i64,
    pub oom_killed: bool,
}

/// The one native dependency of the engine: a container runtime that
/// can create a configured sandbox, start it, stream its combined
/// output until close, report its terminal state, and tear it down.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn create(&self, spec: &SandboxSpec) -> Result<String>;
    async fn start(&self, id: &str) -> Result<()>;
    /// Combined stdout/stderr as raw chunks; closes when the sandbox
    /// process exits.
    fn output(&self, id: &str) -> BoxStream<'static, Result<String>>;
    async fn inspect(&self, id: &str) -> Result<ContainerState>;
    async fn kill(&self, id: &str) -> Result<()>;
    async fn stop(&self, id: &str) -> Result<()>;
    async fn remove(&self, id: &str) -> Result<()>;
}

/// Executes exactly one prepared phase to completion and classifies the
/// result, publishing partial statistics into the job after every
/// output line. Teardown is unconditional: whatever happened in
/// between, the sandbox is killed/stopped as needed and always removed
/// before this returns.
pub async fn run_phase(
    runtime: &dyn ContainerRuntime,
    spec: &SandboxSpec,
    job: &Job,
    mode: ParseMode,
) -> Result<Classification> {
    let id = runtime.create(spec).await?;
    log::info!("image: {}, sandbox: {id}", spec.image);

    let outcome = stream_and_classify(runtime, &id, job, mode).await;
    teardown(runtime, &id).await;
    outcome
}

async fn stream_and_classify(
    runtime: &dyn ContainerRuntime,
    id: &str,
    job: &Job,
    mode: ParseMode,
) -> Result<Classification> {
    runtime.start(id).await?;

    // This read is the worker's only suspension point. There is no
    // line-level timeout: wall-clock bounding lives inside the
    // generated script, and a sandbox that hangs without output holds
    // the worker until the script's own timeout fires.
    let mut stream = runtime.output(id);
    let mut lines: Vec<String> = Vec::new();
    let mut pending = String::new();
    while let Some(chunk) = stream.next().await {
        pending.push_str(&chunk?);
        while let Some(pos) = pending.find('\n') {
            let line = pending[..pos].trim_end_matches('\r').to_string();
            pending.drain(..=pos);
            log::debug!("{}", line.replace("debug: ", ""));
            lines.push(line);
            job.apply_output(mode, &lines, None);
        }
    }
    if !pending.is_empty() {
        lines.push(pending.trim_end_matches('\r').to_string());
        job.apply_output(mode, &lines, None);
    }

    let state = runtime.inspect(id).await?;
    let classification = parser::classify(state.oom_killed, state.exit_code);
    job.apply_output(mode, &lines, Some(JobStatus::Finished(classification)));
    Ok(classification)
}

// Best effort, order-sensitive: kill if still running, stop if it never
// started, always remove. Teardown errors are logged, never surfaced.
async fn teardown(runtime: &dyn ContainerRuntime, id: &str) {
    match runtime.inspect(id).await {
        Ok(state) => match state.status {
            ContainerStatus::Running => {
                if let Err(e) = runtime.kill(id).await {
                    log::warn!("failed to kill sandbox {id}: {e:#}");
                }
            }
            ContainerStatus::Created => {
                if let Err(e) = runtime.stop(id).await {
                    log::warn!("failed to stop sandbox {id}: {e:#}");
                }
            }
            _ => {}
        },
        Err(e) => log::warn!("failed to inspect sandbox {id} during teardown: {e:#}"),
    }
    if let Err(e) = runtime.remove(id).await {
        log::warn!("failed to remove sandbox {id}: {e:#}");
    }
}
