use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use iqreport_core::{
    load_config, load_env_file, metrics, validate_config, Config, DurableWriter, IqServerClient,
    OrchestratorConfig, ReportOrchestrator, RunStatus, SanitizedConfig,
};

/// Dotenv file loaded before configuration, if present.
const ENV_FILE: &str = "config/.env";

/// Exit code for a report written with some applications missing.
const EXIT_PARTIAL: u8 = 2;

/// IQ Server policy violation report generator
#[derive(Parser, Debug)]
#[command(name = "iqreport")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    IQ_SERVER_URL, IQ_USERNAME, IQ_PASSWORD, REPORT_OUTPUT_DIR\n    IQREPORT_<SECTION>__<KEY>    e.g. IQREPORT_FETCH__MAX_CONCURRENT=5\n    RUST_LOG                     Log filter (default: info)"
)]
struct Cli {
    /// Configuration file (skipped if missing)
    #[arg(short, long, env = "IQREPORT_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Directory the report is written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Report file name (default: policy_violations_<timestamp>.csv)
    #[arg(short, long)]
    filename: Option<String>,

    /// Maximum applications fetched at the same time
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Write Prometheus metrics to this file when the run ends
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(max) = self.max_concurrent {
            config.fetch.max_concurrent = max;
        }
        if let Some(secs) = self.timeout_secs {
            config.iq_server.timeout_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match run(&cli).await {
        Ok(RunStatus::Complete) => ExitCode::SUCCESS,
        Ok(RunStatus::Partial) => ExitCode::from(EXIT_PARTIAL),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    // stdout is reserved for the report path.
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: &Cli) -> Result<RunStatus> {
    if load_env_file(Path::new(ENV_FILE)) {
        info!("Loaded environment from {}", ENV_FILE);
    }

    info!("Loading configuration from {:?}", cli.config);
    let mut config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    cli.apply_overrides(&mut config);
    validate_config(&config).context("Configuration validation failed")?;
    info!(config = ?SanitizedConfig::from(&config), "Configuration loaded successfully");

    let client =
        IqServerClient::new(&config.iq_server).context("Failed to create IQ Server client")?;
    let orchestrator =
        ReportOrchestrator::new(Arc::new(client), OrchestratorConfig::from(&config));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown signal received, cancelling run");
        trigger.cancel();
    });

    let filename = cli
        .filename
        .clone()
        .unwrap_or_else(|| default_filename(Utc::now()));

    let outcome = orchestrator.run(&filename, cancel).await;

    if let Some(path) = &cli.metrics_file {
        if let Err(e) = write_metrics(path) {
            warn!("Failed to write metrics to {:?}: {:#}", path, e);
        }
    }

    let result = outcome.context("Report run failed")?;

    println!("{}", result.path.display());
    if let Some(errors) = result.item_errors() {
        eprintln!("{}", errors);
    }
    if !result.skipped.is_empty() {
        eprintln!(
            "run cancelled: {} applications skipped: {}",
            result.skipped.len(),
            result.skipped.join(", ")
        );
    }

    Ok(result.status())
}

fn default_filename(now: DateTime<Utc>) -> String {
    format!("policy_violations_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

fn write_metrics(path: &Path) -> Result<()> {
    let text = metrics::encode_metrics().context("Failed to encode metrics")?;
    DurableWriter::new()
        .persist(path, text.as_bytes())
        .context("Failed to persist metrics")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_filename_uses_utc_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(default_filename(now), "policy_violations_20260307_090501.csv");
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let cli = Cli::parse_from([
            "iqreport",
            "--output-dir",
            "/tmp/out",
            "--max-concurrent",
            "4",
            "--timeout-secs",
            "9",
        ]);
        let mut config = iqreport_core::load_config_from_str(
            r#"
[iq_server]
url = "http://localhost:8070/api/v2"
username = "admin"
password = "admin123"
"#,
        )
        .unwrap();

        cli.apply_overrides(&mut config);

        assert_eq!(config.output.dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.fetch.max_concurrent, 4);
        assert_eq!(config.iq_server.timeout_secs, 9);
    }

    #[test]
    fn test_metrics_file_is_written() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metrics.prom");
        metrics::RUNS_TOTAL.with_label_values(&["complete"]).inc();

        write_metrics(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("runs_total"));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
