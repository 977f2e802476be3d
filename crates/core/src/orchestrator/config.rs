//! Configuration for report runs.

use std::path::PathBuf;

use crate::config::Config;
use crate::pipeline::DEFAULT_MAX_CONCURRENT;

/// Settings for a single report run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory the report file is written to.
    pub output_dir: PathBuf,
    /// Maximum applications fetched at the same time.
    pub max_concurrent: usize,
    /// Directory for temp files; `None` stages next to the report.
    pub staging_dir: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            output_dir: crate::config::default_output_dir(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            staging_dir: None,
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            output_dir: config.output.dir.clone(),
            max_concurrent: config.fetch.max_concurrent,
            staging_dir: None,
        }
    }
}

impl OrchestratorConfig {
    /// Sets the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the concurrency ceiling.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the staging directory for temp files.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }
}
