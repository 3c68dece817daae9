use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::job::{Job, JobConfig};
use crate::lang::{Language, Role};
use crate::parser::ParseMode;
use crate::sandbox::{self, ContainerRuntime, SandboxSpec};
use crate::script;
use crate::stage::Staging;

/// Shared wiring handed to every worker: the sandbox runtime plus the
/// two views of the staging root (as written by this process, and as
/// resolved by the runtime for bind-mount sources).
pub struct JudgeContext {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub host_tmp: PathBuf,
    pub runtime_tmp: PathBuf,
}

/// Runs the four phases of one job in order, short-circuiting on the
/// first non-success classification:
///
/// ```text
/// BUILD_TESTEE -> RUN_TESTEE -> BUILD_CHECKER -> RUN_CHECKER
/// ```
///
/// Build phases are skipped for interpreted languages. A phase failure
/// leaves the job's terminal status under the failing phase's prefix;
/// an `Err` here means infrastructure trouble and is turned into an
/// `exception` status by the caller. The staging directory is freed on
/// every exit path when `stage` drops.
pub async fn execute(ctx: &JudgeContext, job: &Job) -> Result<()> {
    let stage = Staging::create(&ctx.host_tmp, &ctx.runtime_tmp)?;

    // Testee: build, then run over the samples.
    let language = Language::from_tag(&job.config.testee.language)?;
    job.enter_phase("testee_build_");
    let prep = language.prepare_build(&job.config.testee, Role::Testee, &stage)?;
    if let Some(build) = &prep.build {
        let class = sandbox::run_phase(ctx.runtime.as_ref(), build, job, ParseMode::Build).await?;
        if !class.is_success() {
            return Ok(());
        }
    }

    job.enter_phase("testee_");
    let mut run = language.prepare_run(&prep.layout, job.config.memory_limit, &stage);
    stage_testee_run(&mut run, &stage, &job.config, &prep.layout.run_cmd)?;
    let class = sandbox::run_phase(ctx.runtime.as_ref(), &run, job, ParseMode::Run).await?;
    if !class.is_success() {
        return Ok(());
    }

    // Checker: build, then run against the recorded outputs.
    let language = Language::from_tag(&job.config.checker.language)?;
    job.enter_phase("checker_build_");
    let prep = language.prepare_build(&job.config.checker, Role::Checker, &stage)?;
    if let Some(build) = &prep.build {
        let class = sandbox::run_phase(ctx.runtime.as_ref(), build, job, ParseMode::Build).await?;
        if !class.is_success() {
            return Ok(());
        }
    }

    job.enter_phase("checker_");
    let mut run = language.prepare_run(&prep.layout, job.config.memory_limit, &stage);
    stage_checker_run(&mut run, &stage, &job.config, &prep.layout.run_cmd)?;
    let class = sandbox::run_phase(ctx.runtime.as_ref(), &run, job, ParseMode::Check).await?;
    if class.is_success() {
        job.clear_phase();
    }
    Ok(())
}

/// Materializes the testee run phase: a read-write `wrk` work mount at
/// `/usr/src`, one staged input file per sample bound read-only over
/// it, and the generated run script.
fn stage_testee_run(
    spec: &mut SandboxSpec,
    stage: &Staging,
    config: &JobConfig,
    run_cmd: &str,
) -> Result<()> {
    stage.make_dir("wrk")?;
    spec.mounts.push(stage.mount("wrk", "/usr/src", false));

    for (idx, sample) in config.samples.iter().enumerate() {
        let name = script::input_file(idx + 1);
        stage.write_file(&format!("wrk/{name}"), sample)?;
        spec.mounts
            .push(stage.mount(&format!("wrk/{name}"), &format!("/usr/src/{name}"), true));
    }

    stage.write_file(
        "run_testee.sh",
        &script::testee_script(run_cmd, config.timeout, config.samples.len()),
    )?;
    spec.mounts
        .push(stage.mount("run_testee.sh", "/usr/src/run_testee.sh", true));
    spec.command = "run_testee.sh".to_string();
    spec.read_only = true;
    Ok(())
}

/// Materializes the checker run phase: the same `wrk` mount, plus the
/// inputs and the testee's recorded outputs bound read-only.
fn stage_checker_run(
    spec: &mut SandboxSpec,
    stage: &Staging,
    config: &JobConfig,
    run_cmd: &str,
) -> Result<()> {
    spec.mounts.push(stage.mount("wrk", "/usr/src", false));

    for idx in 1..=config.samples.len() {
        let input = script::input_file(idx);
        let output = script::output_file(idx);
        spec.mounts
            .push(stage.mount(&format!("wrk/{input}"), &format!("/usr/src/{input}"), true));
        spec.mounts
            .push(stage.mount(&format!("wrk/{output}"), &format!("/usr/src/{output}"), true));
    }

    stage.write_file(
        "run_checker.sh",
        &script::checker_script(run_cmd, config.checker_timeout(), config.samples.len()),
    )?;
    spec.mounts
        .push(stage.mount("run_checker.sh", "/usr/src/run_checker.sh", true));
    spec.command = "run_checker.sh".to_string();
    spec.read_only = true;
    Ok(())
}
