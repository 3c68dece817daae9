mod dotnet;
mod freepascal;
mod gcc;
mod python;

use anyhow::Result;
use thiserror::Error;

use crate::job::ProgramSpec;
use crate::sandbox::SandboxSpec;
use crate::stage::Staging;

#[derive(Debug, Error)]
#[error("unknown language \"{0}\"")]
pub struct UnsupportedLanguage(pub String);

/// The closed set of supported languages. Dispatch happens here and
/// only here; every other component works with the enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    Python,
    C,
    Cpp,
    CSharp,
    FSharp,
    VisualBasic,
    Pascal,
}

/// Which program of the job a phase belongs to. Determines staging
/// directory names, script names, and the reserved build-failure code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Testee,
    Checker,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Self::Testee => "testee",
            Self::Checker => "checker",
        }
    }

    pub fn build_failure_exit(self) -> i64 {
        match self {
            Self::Testee => 300,
            Self::Checker => 301,
        }
    }
}

/// Where a prepared program lives in the staging directory and how the
/// run script invokes it. `bin_path` is staging-relative and gets bound
/// read-only at `/usr/src/bin` for the run phase.
#[derive(Clone, Debug)]
pub struct ProgramLayout {
    pub bin_path: String,
    pub run_cmd: String,
}

/// Result of build preparation: the program layout, plus the build
/// sandbox when the language needs a build phase at all.
pub struct BuildPrep {
    pub layout: ProgramLayout,
    pub build: Option<SandboxSpec>,
}

impl Language {
    pub fn from_tag(tag: &str) -> Result<Self, UnsupportedLanguage> {
        match tag {
            "py" | "python" => Ok(Self::Python),
            "c" => Ok(Self::C),
            "cpp" | "c++" => Ok(Self::Cpp),
            "C#" => Ok(Self::CSharp),
            "F#" => Ok(Self::FSharp),
            "VB" => Ok(Self::VisualBasic),
            "pas" => Ok(Self::Pascal),
            _ => Err(UnsupportedLanguage(tag.to_string())),
        }
    }

    /// Stages the source into the working directory, emits the build
    /// script where the language needs one, and reports the program
    /// layout the run phase will use. Interpreted languages skip the
    /// build sandbox entirely.
    pub fn prepare_build(self, spec: &ProgramSpec, role: Role, stage: &Staging) -> Result<BuildPrep> {
        match self {
            Self::Python => python::prepare_build(spec, role, stage),
            Self::C | Self::Cpp => gcc::prepare_build(self, spec, role, stage),
            Self::CSharp | Self::FSharp | Self::VisualBasic => {
                dotnet::prepare_build(self, spec, role, stage)
            }
            Self::Pascal => freepascal::prepare_build(spec, role, stage),
        }
    }

    /// Selects the run image and binds the built artifact (or the raw
    /// source, for interpreted languages) read-only into the sandbox.
    /// The entrypoint command and work mounts are added afterwards by
    /// the run-phase staging.
    pub fn prepare_run(self, layout: &ProgramLayout, memory_limit: u64, stage: &Staging) -> SandboxSpec {
        let image = match self {
            Self::CSharp | Self::FSharp | Self::VisualBasic => dotnet::RUN_IMAGE,
            Self::Pascal => freepascal::IMAGE,
            _ => python::IMAGE,
        };
        SandboxSpec {
            image: image.to_string(),
            command: String::new(),
            mounts: vec![stage.mount(&layout.bin_path, "/usr/src/bin", true)],
            memory_limit: Some(memory_limit),
            memswap_limit: Some(0),
            read_only: false,
        }
    }
}
