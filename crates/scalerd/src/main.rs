//! scalerd — the dbscale scaler daemon.
//!
//! Assembles the decision engine around the local state store:
//! - State store (redb, one database per storage project)
//! - Scaling counters (optionally rendered to a file on every flush)
//! - Downstream events (logged, optionally appended to a JSON-lines file)
//! - Dry-run scale executor and operation status provider
//!
//! # Usage
//!
//! ```text
//! scalerd process --request request.json --data-dir /var/lib/dbscale
//! scalerd state --project my-project --instance my-db
//! scalerd counters
//! ```

mod dry_run;
mod events;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dbscale_autoscale::{ScalingOrchestrator, ScalingOutcome};
use dbscale_core::{InstanceConfig, ScalerdConfig};
use dbscale_metrics::{CounterRegistry, ScalingCounters};
use dbscale_state::{DatabasePool, RedbStateStore, StateKey, StateStore};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::dry_run::{DryRunExecutor, DryRunStatusProvider};
use crate::events::FileEventPublisher;

#[derive(Parser)]
#[command(name = "scalerd", about = "dbscale scaler daemon", version)]
struct Cli {
    /// Path to scalerd.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one scaling request.
    Process {
        /// JSON request file, or `-` for stdin.
        #[arg(long)]
        request: String,

        /// Data directory for persistent state.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Force dry-run collaborators.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the stored scaling state of an instance as JSON.
    State {
        #[arg(long)]
        project: String,

        #[arg(long)]
        instance: String,

        /// Project holding the state, when different from --project.
        #[arg(long)]
        state_project: Option<String>,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Print the counters written by the last flush.
    Counters,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ScalerdConfig::load(cli.config.as_deref())?;
    init_tracing(config.log_filter(), cli.log_json);

    match cli.command {
        Command::Process {
            request,
            data_dir,
            dry_run,
        } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            config.dry_run |= dry_run;
            let payload = read_request(&request)?;
            let outcome = run_process(&config, &payload).await?;
            println!("{}", outcome_json(&outcome));
            Ok(())
        }
        Command::State {
            project,
            instance,
            state_project,
            data_dir,
        } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            let key = StateKey::new(
                state_project.as_deref().unwrap_or(&project),
                &project,
                &instance,
            );
            println!("{}", show_state(&config, &key)?);
            Ok(())
        }
        Command::Counters => {
            println!("{}", show_counters(&config)?);
            Ok(())
        }
    }
}

fn init_tracing(default_filter: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_request(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut payload = String::new();
        std::io::stdin().read_to_string(&mut payload)?;
        Ok(payload)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}

/// Run one request through the engine with the configured collaborators.
async fn run_process(config: &ScalerdConfig, payload: &str) -> anyhow::Result<ScalingOutcome> {
    if !config.dry_run {
        anyhow::bail!("no cloud scaling backend is available; enable dry_run or pass --dry-run");
    }

    let mut counters = CounterRegistry::new();
    if let Some(path) = &config.counters_path {
        counters = counters.with_sink(path);
    }

    let request = match InstanceConfig::from_json(payload) {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "failed to parse scaling request");
            counters.inc_requests_failed();
            if let Err(e) = counters.flush().await {
                warn!(error = %e, "failed to flush counters");
            }
            return Err(e);
        }
    };

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(RedbStateStore::new(DatabasePool::on_disk(&config.data_dir)));
    info!(path = ?config.data_dir, "state store opened");

    let orchestrator = ScalingOrchestrator::new(
        store.clone(),
        Arc::new(DryRunStatusProvider),
        Arc::new(DryRunExecutor),
        Arc::new(FileEventPublisher::new(config.events_path.clone())),
        Arc::new(counters),
    );

    let outcome = orchestrator.handle_request(request).await?;
    store.close()?;
    info!(?outcome, "scaling request processed");
    Ok(outcome)
}

fn outcome_json(outcome: &ScalingOutcome) -> serde_json::Value {
    match outcome {
        ScalingOutcome::Denied(reason) => serde_json::json!({
            "outcome": "DENIED",
            "reason": reason.as_str(),
        }),
        ScalingOutcome::Scaled {
            suggested_size,
            operation_id,
        } => serde_json::json!({
            "outcome": "SCALED",
            "suggestedSize": suggested_size,
            "operationId": operation_id,
        }),
        ScalingOutcome::Failed { suggested_size } => serde_json::json!({
            "outcome": "FAILED",
            "suggestedSize": suggested_size,
        }),
    }
}

fn show_state(config: &ScalerdConfig, key: &StateKey) -> anyhow::Result<String> {
    let store = RedbStateStore::new(DatabasePool::on_disk(&config.data_dir));
    let state = store.get(key)?;
    store.close()?;
    Ok(serde_json::to_string_pretty(&state)?)
}

fn show_counters(config: &ScalerdConfig) -> anyhow::Result<String> {
    let Some(path) = &config.counters_path else {
        anyhow::bail!("counters_path is not set in the configuration");
    };
    read_counters(path)
}

fn read_counters(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read counters from {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &str = r#"{
        "projectId": "proj",
        "instanceId": "db-1",
        "currentSize": 4,
        "maxSize": 16,
        "metrics": [{ "name": "cpu", "threshold": 70, "value": 85 }]
    }"#;

    fn test_config(dir: &Path) -> ScalerdConfig {
        ScalerdConfig {
            data_dir: dir.join("state"),
            counters_path: Some(dir.join("counters.prom")),
            events_path: Some(dir.join("events.jsonl")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn process_scales_and_records_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let outcome = run_process(&config, REQUEST).await.unwrap();
        assert!(matches!(outcome, ScalingOutcome::Scaled { suggested_size: 8, .. }));

        let state: serde_json::Value = serde_json::from_str(
            &show_state(&config, &StateKey::new("proj", "proj", "db-1")).unwrap(),
        )
        .unwrap();
        assert_eq!(state["scalingRequestedSize"], 8);
        assert!(state["scalingOperationId"].as_str().unwrap().starts_with("dry-run-"));

        let counters = show_counters(&config).unwrap();
        assert!(counters.contains("dbscale_scaler_requests_success_total 1"));

        let events = std::fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
        assert_eq!(events.lines().count(), 1);
    }

    #[tokio::test]
    async fn second_request_sees_completed_operation_and_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        run_process(&config, REQUEST).await.unwrap();
        let outcome = run_process(&config, REQUEST).await.unwrap();
        assert_eq!(
            outcome,
            ScalingOutcome::Denied(dbscale_metrics::DenialReason::WithinCooldown)
        );

        let counters = show_counters(&config).unwrap();
        assert!(counters.contains("dbscale_scaler_scaling_success_total{"));
    }

    #[tokio::test]
    async fn non_dry_run_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScalerdConfig {
            dry_run: false,
            ..test_config(dir.path())
        };
        assert!(run_process(&config, REQUEST).await.is_err());
    }

    #[tokio::test]
    async fn malformed_request_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        assert!(run_process(&config, "{\"projectId\": 1}").await.is_err());
    }

    #[tokio::test]
    async fn malformed_request_is_counted_and_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        assert!(run_process(&config, "{\"projectId\": 1}").await.is_err());

        let counters = show_counters(&config).unwrap();
        assert!(counters.contains("dbscale_scaler_requests_failed_total 1"));
        assert!(!counters.contains("dbscale_scaler_requests_success_total 1"));
    }

    #[test]
    fn outcome_rendering() {
        let denied = outcome_json(&ScalingOutcome::Denied(dbscale_metrics::DenialReason::InProgress));
        assert_eq!(denied["reason"], "IN_PROGRESS");

        let scaled = outcome_json(&ScalingOutcome::Scaled {
            suggested_size: 8,
            operation_id: None,
        });
        assert_eq!(scaled["outcome"], "SCALED");
        assert!(scaled["operationId"].is_null());
    }

    #[test]
    fn counters_require_a_path() {
        assert!(show_counters(&ScalerdConfig::default()).is_err());
    }

    #[test]
    fn request_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(&path, REQUEST).unwrap();
        let payload = read_request(path.to_str().unwrap()).unwrap();
        assert_eq!(InstanceConfig::from_json(&payload).unwrap().current_size, 4);
    }
}
