use anyhow::Result;

use super::{BuildPrep, ProgramLayout, Role};
use crate::job::ProgramSpec;
use crate::sandbox::SandboxSpec;
use crate::script;
use crate::stage::Staging;

pub(super) const IMAGE: &str = "freepascal:checker";

pub(super) fn prepare_build(spec: &ProgramSpec, role: Role, stage: &Staging) -> Result<BuildPrep> {
    let name = role.name();
    stage.write_file(&format!("{name}/main.pas"), &spec.source)?;

    let compile = format!("fpc -o{name}/{name} {name}/main.pas");
    let script_name = format!("build_{name}.sh");
    stage.write_file(
        &script_name,
        &script::build_script(&[compile], role.build_failure_exit()),
    )?;

    Ok(BuildPrep {
        layout: ProgramLayout {
            bin_path: name.to_string(),
            run_cmd: format!("./bin/{name}"),
        },
        build: Some(SandboxSpec {
            image: IMAGE.to_string(),
            command: script_name,
            mounts: vec![stage.mount_root("/usr/src", false)],
            memory_limit: None,
            memswap_limit: None,
            read_only: false,
        }),
    })
}
