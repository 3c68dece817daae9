use anyhow::Result;

use super::{BuildPrep, Language, ProgramLayout, Role};
use crate::job::ProgramSpec;
use crate::sandbox::SandboxSpec;
use crate::script;
use crate::stage::Staging;

const BUILD_IMAGE: &str = "dotnet:builder";
pub(super) const RUN_IMAGE: &str = "dotnet:runtime";

/// Managed runtime: building means scaffolding a console project around
/// the submitted source and compiling it in Release configuration.
pub(super) fn prepare_build(
    language: Language,
    spec: &ProgramSpec,
    role: Role,
    stage: &Staging,
) -> Result<BuildPrep> {
    let ext = match language {
        Language::CSharp => "cs",
        Language::FSharp => "fs",
        Language::VisualBasic => "vb",
        _ => unreachable!("dotnet adapter only handles C#, F#, and VB"),
    };

    let name = role.name();
    stage.write_file(&format!("{name}.{ext}"), &spec.source)?;

    let commands = vec![
        format!("dotnet new console -o {name}"),
        format!("cp {name}.{ext} {name}/Program.{ext}"),
        format!("dotnet build --configuration Release --no-restore -v q {name}"),
    ];
    let script_name = format!("build_{name}.sh");
    stage.write_file(
        &script_name,
        &script::build_script(&commands, role.build_failure_exit()),
    )?;

    Ok(BuildPrep {
        layout: ProgramLayout {
            bin_path: format!("{name}/bin/Release/net6.0"),
            run_cmd: format!("dotnet bin/{name}.dll"),
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
