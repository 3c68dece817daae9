#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use judged::job::{JobConfig, JobSnapshot};
use judged::pipeline::JudgeContext;
use judged::sandbox::testing::FakeRuntime;
use judged::scheduler::Scheduler;
use uuid::Uuid;

/// Wires a judge context around a scripted runtime, staging under the
/// system temp directory.
pub fn context(runtime: Arc<FakeRuntime>) -> Arc<JudgeContext> {
    let tmp = std::env::temp_dir();
    Arc::new(JudgeContext {
        runtime,
        host_tmp: tmp.clone(),
        runtime_tmp: tmp,
    })
}

pub fn python_job() -> JobConfig {
    serde_json::from_value(serde_json::json!({
        "testee": { "language": "py", "source": "print(int(input()) * 2)" },
        "checker": { "language": "py", "source": "import sys; sys.exit(0)" },
        "samples": ["21"],
    }))
    .unwrap()
}

pub fn c_job() -> JobConfig {
    serde_json::from_value(serde_json::json!({
        "testee": { "language": "c", "source": "int main() { return 0; }" },
        "checker": { "language": "py", "source": "import sys; sys.exit(0)" },
        "samples": ["1", "2"],
    }))
    .unwrap()
}

/// Polls until the job reaches the wanted status. Workers are
/// fire-and-forget tasks and queued jobs wait on the 1-second scheduler
/// cadence, so the deadline is generous.
pub async fn wait_for_status(scheduler: &Scheduler, id: Uuid, want: &str) -> JobSnapshot {
    for _ in 0..500 {
        if let Some(snapshot) = scheduler.status(id)
            && snapshot.status == want
        {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached status {want:?}");
}
