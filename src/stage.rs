use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::sandbox::MountBinding;

/// A per-job staging directory with two views of the same files: the
/// path this process writes through, and the path the sandbox runtime
/// resolves bind-mount sources against. The two differ when the judge
/// itself runs inside a container and hands host paths to the daemon.
///
/// The directory is unique per job invocation and is removed as a unit
/// when the staging value is dropped, on every exit path.
pub struct Staging {
    dir: TempDir,
    runtime_root: String,
}

impl Staging {
    pub fn create(host_tmp: &Path, runtime_tmp: &Path) -> Result<Self> {
        fs::create_dir_all(host_tmp)
            .with_context(|| format!("failed to create staging root {}", host_tmp.display()))?;
        let dir = TempDir::with_prefix_in("judge-", host_tmp)
            .context("failed to create staging directory")?;
        let name = dir
            .path()
            .file_name()
            .expect("temp dir has a name")
            .to_string_lossy()
            .into_owned();
        let runtime_root = join(&runtime_tmp.to_string_lossy(), &name);
        Ok(Self { dir, runtime_root })
    }

    pub fn host_path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// The same file as the sandbox runtime sees it, for mount sources.
    pub fn runtime_path(&self, rel: &str) -> String {
        join(&self.runtime_root, rel)
    }

    pub fn make_dir(&self, rel: &str) -> Result<()> {
        let path = self.host_path(rel);
        fs::create_dir_all(&path)
            .with_context(|| format!("failed to create staging dir {}", path.display()))
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.host_path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("failed to stage file {}", path.display()))
    }

    /// Binds a staged file or directory into the sandbox.
    pub fn mount(&self, rel: &str, target: &str, read_only: bool) -> MountBinding {
        MountBinding {
            source: self.runtime_path(rel),
            target: target.to_string(),
            read_only,
        }
    }

    /// Binds the whole staging directory.
    pub fn mount_root(&self, target: &str, read_only: bool) -> MountBinding {
        MountBinding {
            source: self.runtime_root.clone(),
            target: target.to_string(),
            read_only,
        }
    }
}

// Sandbox-side paths are always slash-separated, whatever the host is.
fn join(base: &str, rel: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rel).replace('\\', "/")
}
