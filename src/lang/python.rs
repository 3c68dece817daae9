use anyhow::Result;

use super::{BuildPrep, ProgramLayout, Role};
use crate::job::ProgramSpec;
use crate::stage::Staging;

pub(super) const IMAGE: &str = "python:checker";

/// Interpreted: the raw source is the artifact, no build sandbox runs.
pub(super) fn prepare_build(spec: &ProgramSpec, role: Role, stage: &Staging) -> Result<BuildPrep> {
    let name = role.name();
    stage.write_file(&format!("{name}/main.py"), &spec.source)?;
    Ok(BuildPrep {
        layout: ProgramLayout {
            bin_path: name.to_string(),
            run_cmd: "python bin/main.py".to_string(),
        },
        build: None,
    })
}
