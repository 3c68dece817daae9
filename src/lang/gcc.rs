use anyhow::Result;

use super::{BuildPrep, Language, ProgramLayout, Role};
use crate::job::ProgramSpec;
use crate::sandbox::SandboxSpec;
use crate::script;
use crate::stage::Staging;

const BUILD_IMAGE: &str = "gcc:builder";

pub(super) fn prepare_build(
    language: Language,
    spec: &ProgramSpec,
    role: Role,
    stage: &Staging,
) -> Result<BuildPrep> {
    let (ext, compiler) = match language {
        Language::C => ("c", "gcc"),
        Language::Cpp => ("cpp", "g++"),
        _ => unreachable!("gcc adapter only handles C and C++"),
    };

    let name = role.name();
    stage.write_file(&format!("{name}/main.{ext}"), &spec.source)?;

    let compile = format!("{compiler} -o {name}/{name} {name}/main.{ext}");
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
            image: BUILD_IMAGE.to_string(),
            command: script_name,
            mounts: vec![stage.mount_root("/usr/src", false)],
            memory_limit: None,
            memswap_limit: None,
            read_only: false,
        }),
    })
}
