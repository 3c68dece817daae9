use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "judged", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<String>,
}

impl CliArgs {
    /// Load the configuration from the specified file, falling back to
    /// defaults when no file is given
    pub fn to_config(&self) -> std::io::Result<Config> {
        let Some(path) = &self.config_path else {
            return Ok(Config::default());
        };
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| e.into())
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub judge: JudgeConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct JudgeConfig {
    /// Cap on concurrently running jobs.
    pub max_running_jobs: usize,
    /// Jobs are evicted this long after their last status change.
    pub job_ttl_seconds: u64,
    /// Staging root as seen by this process.
    pub host_tmp: PathBuf,
    /// The same staging root as resolved by the sandbox runtime, when
    /// the judge itself runs containerized; defaults to `host_tmp`.
    pub sandbox_tmp: Option<PathBuf>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            max_running_jobs: 4,
            job_ttl_seconds: 24 * 60 * 60,
            host_tmp: std::env::temp_dir(),
            sandbox_tmp: None,
        }
    }
}

impl JudgeConfig {
    pub fn sandbox_tmp(&self) -> PathBuf {
        self.sandbox_tmp.clone().unwrap_or_else(|| self.host_tmp.clone())
    }
}
