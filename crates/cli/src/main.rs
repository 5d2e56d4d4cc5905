mod config_commands;
mod logs_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::bail,
    clap::{Parser, Subcommand},
    revwatch_config::{LogStrategy, RevwatchConfig, Severity, validate::semantic_checks},
    revwatch_watcher::{
        LifecycleController, ShutdownHandle, ShutdownReason, install_panic_hook,
        spawn_signal_listener,
    },
    revwatch_whatsapp::WhatsAppClient,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "revwatch",
    version,
    about = "Keeps a record of chat messages deleted for everyone"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Directory searched first for revwatch.{toml,yaml,yml,json}.
    #[arg(long, global = true, env = "REVWATCH_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Journal directory (overrides config value).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Journal strategy: all or deleted_only (overrides config value).
    #[arg(long, global = true)]
    strategy: Option<LogStrategy>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch for deleted messages (default when no subcommand is provided).
    Run,
    /// Configuration inspection and validation.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Read the journal streams.
    Logs {
        #[command(subcommand)]
        action: logs_commands::LogsAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Discovered config with `REVWATCH_*` env and command-line overrides applied.
fn effective_config(cli: &Cli) -> RevwatchConfig {
    let mut config = revwatch_config::discover_and_load(cli.config_dir.as_deref());
    if let Some(dir) = &cli.log_dir {
        config.logging.dir = dir.clone();
    }
    if let Some(strategy) = cli.strategy {
        config.logging.strategy = strategy;
    }
    config
}

/// Prometheus text written next to the journal when the watcher stops.
#[cfg(feature = "metrics")]
const METRICS_SNAPSHOT_FILE: &str = "metrics.prom";

#[cfg(feature = "metrics")]
fn write_metrics_snapshot(handle: &revwatch_metrics::MetricsHandle, path: &std::path::Path) {
    if !handle.is_enabled() {
        return;
    }
    match std::fs::write(path, handle.render()) {
        Ok(()) => info!(path = %path.display(), "metrics snapshot written"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to write metrics snapshot"),
    }
}

async fn run(config: RevwatchConfig) -> anyhow::Result<()> {
    let diagnostics = semantic_checks(&config);
    for d in &diagnostics {
        match d.severity {
            Severity::Error => tracing::error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => {},
        }
    }
    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        bail!("invalid configuration, see `revwatch config check`");
    }

    info!(
        strategy = %config.logging.strategy,
        log_dir = %config.logging.dir.display(),
        alerts = config.alert.enabled,
        "revwatch starting"
    );

    #[cfg(feature = "metrics")]
    let metrics = revwatch_metrics::init_metrics(revwatch_metrics::MetricsRecorderConfig {
        enabled: true,
        global_labels: vec![("client".into(), "whatsapp-web".into())],
    })?;
    #[cfg(feature = "metrics")]
    let metrics_path = config.logging.dir.join(METRICS_SNAPSHOT_FILE);

    let shutdown = ShutdownHandle::new();
    install_panic_hook(shutdown.clone());
    let signals = spawn_signal_listener(shutdown.clone());

    let client = Arc::new(WhatsAppClient::new(config.whatsapp.clone()));
    let controller = LifecycleController::new(config, client).with_shutdown_handle(shutdown);

    let result = controller.run().await;
    signals.abort();

    #[cfg(feature = "metrics")]
    write_metrics_snapshot(&metrics, &metrics_path);

    match result? {
        ShutdownReason::Fault(message) => bail!("stopped after uncaught fault: {message}"),
        reason => {
            info!(%reason, "revwatch stopped");
            Ok(())
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    match &cli.command {
        None | Some(Commands::Run) => run(effective_config(&cli)).await,
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, cli.config_dir.as_deref(), &effective_config(&cli))
        },
        Some(Commands::Logs { action }) => {
            logs_commands::handle_logs(action, &effective_config(&cli)).await
        },
    }
}

#[cfg(all(test, feature = "metrics"))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        revwatch_metrics::{MetricsHandle, MetricsRecorderConfig, counter, events, init_metrics},
    };

    #[test]
    fn metrics_snapshot_holds_recorded_counters() {
        let handle = init_metrics(MetricsRecorderConfig {
            enabled: true,
            global_labels: vec![],
        })
        .unwrap();
        counter!(events::REVOCATIONS_UNRESOLVED_TOTAL).increment(2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METRICS_SNAPSHOT_FILE);
        write_metrics_snapshot(&handle, &path);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(events::REVOCATIONS_UNRESOLVED_TOTAL));

        let skipped = dir.path().join("disabled.prom");
        write_metrics_snapshot(&MetricsHandle::default(), &skipped);
        assert!(!skipped.exists());
    }
}
