//! vigil: service entry point.
//!
//! Loads configuration, initializes tracing, installs signal handlers, then
//! hands control to the lifecycle coordinator: connect dependencies, bind,
//! serve until SIGINT/SIGTERM, drain and release.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil::config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use vigil::http::shutdown;
use vigil::lifecycle::{DrainOutcome, LifecycleCoordinator, StartupOutcome};
use vigil::memory::CountingAllocator;
use vigil::routes::create_router;

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

/// vigil: a service scaffold with dependency health checks
#[derive(Parser, Debug)]
#[command(name = "vigil", version, about)]
struct Args {
    /// Path to configuration file (defaults to config/default.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level filter (e.g., "vigil=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

fn init_tracing(log_level: Option<String>, logging: &LoggingConfig) {
    // Priority: CLI > env > default
    let log_filter = log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    let filter = tracing_subscriber::EnvFilter::new(&log_filter);

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match args.config.as_deref() {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(DEFAULT_CONFIG_PATH)?,
    };

    init_tracing(args.log_level, &config.logging);
    tracing::info!(
        service = %config.service.name,
        environment = %config.service.environment,
        database = config.database.enabled,
        redis = config.redis.enabled,
        "Loaded configuration"
    );

    let (trigger, signal) = shutdown::channel();
    shutdown::listen_for_signals(trigger);

    let coordinator = LifecycleCoordinator::new(config.shutdown.drain_timeout());
    let started = coordinator.start(config).await?;

    if let StartupOutcome::PartiallyDegraded(warnings) = &started.outcome {
        tracing::warn!(
            count = warnings.len(),
            "Starting partially degraded; affected dependencies report unhealthy"
        );
    }

    let addr = started.local_addr()?;
    let service = started.state.config.service.clone();
    tracing::info!(service = %service.name, %addr, "Listening");
    tracing::info!(environment = %service.environment, "Environment");
    tracing::info!("Health check: http://localhost:{}/health", addr.port());

    let app = create_router(started.state.clone());
    let report = coordinator.run(started, app, signal).await;

    tracing::info!(
        reason = ?report.reason,
        drain = ?report.drain,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Shutdown complete"
    );

    // A server that died on its own is a failure even though shutdown completed
    if let (None, DrainOutcome::ServerFailed(message)) = (report.reason, report.drain) {
        return Err(message.into());
    }
    Ok(())
}
