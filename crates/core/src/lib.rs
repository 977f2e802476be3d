pub mod client;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod testing;

pub use client::{IqServerApi, IqServerClient, IqServerError};
pub use config::{
    load_config, load_config_from_str, load_env_file, validate_config, Config, ConfigError,
    SanitizedConfig,
};
pub use orchestrator::{
    FetchError, OrchestratorConfig, ReportOrchestrator, RunError, RunResult, RunStatus,
};
pub use report::{DurableWriter, ViolationRow, WriteError};
