use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use cadence_core::FunnelKind;
use cadence_email::EmailProvider;
use cadence_engine::{
    EngineConfig, EngineMetrics, EngineRunner, FunnelOrchestrator, MemoryScheduler,
    MessageDispatcher, RetryStrategy, Scheduler, StepTable, WebhookReconciler,
};
use cadence_provider::{DynProvider, ProviderRegistry};
use cadence_server::api::{self, AppState};
use cadence_server::config::CadenceConfig;
use cadence_server::error::ServerError;
use cadence_sms::SmsProvider;
use cadence_state::CampaignStore;
use cadence_state_memory::MemoryCampaignStore;

/// Cadence campaign engine HTTP server.
#[derive(Parser, Debug)]
#[command(name = "cadence-server", about = "Standalone HTTP server for Cadence")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "cadence.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber from RUST_LOG or default to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration from TOML file, or use defaults if the file does
    // not exist.
    let config: CadenceConfig = if Path::new(&cli.config).exists() {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)?
    } else {
        info!(path = %cli.config, "config file not found, using defaults");
        CadenceConfig::default()
    };

    let engine_config = build_engine_config(&config);

    // Register the configured channel providers.
    let mut registry = ProviderRegistry::new();
    if let Some(email_config) = config.email.clone() {
        let provider = EmailProvider::new(email_config)
            .map_err(|e| ServerError::Config(format!("email provider: {e}")))?;
        registry.register(Arc::new(provider) as Arc<dyn DynProvider>);
        info!("email provider registered");
    }
    if let Some(sms_config) = config.sms.clone() {
        let provider = SmsProvider::new(sms_config)
            .map_err(|e| ServerError::Config(format!("sms provider: {e}")))?;
        registry.register(Arc::new(provider) as Arc<dyn DynProvider>);
        info!("sms provider registered");
    }
    if registry.is_empty() {
        warn!("no providers configured; every dispatch will fail");
    }
    let registry = Arc::new(registry);

    let steps = StepTable::new()
        .with_funnel(FunnelKind::PreEvent, config.funnels.pre_event.clone())
        .with_funnel(FunnelKind::PostEvent, config.funnels.post_event.clone());
    info!(
        pre_event_steps = config.funnels.pre_event.len(),
        post_event_steps = config.funnels.post_event.len(),
        "funnel definitions loaded"
    );

    let store: Arc<dyn CampaignStore> = Arc::new(MemoryCampaignStore::new());
    let scheduler: Arc<dyn Scheduler> = Arc::new(MemoryScheduler::new());
    let metrics = Arc::new(EngineMetrics::new());

    let dispatcher = Arc::new(MessageDispatcher::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        engine_config.clone(),
        Arc::clone(&metrics),
    ));
    let orchestrator = Arc::new(FunnelOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&dispatcher),
        Arc::clone(&scheduler),
        steps,
        engine_config.clone(),
    ));
    let reconciler = Arc::new(WebhookReconciler::new(
        Arc::clone(&store),
        registry,
        engine_config.clone(),
        Arc::clone(&metrics),
    ));

    // Run the step executor in the background.
    let (mut runner, shutdown_tx) = EngineRunner::new(Arc::clone(&orchestrator), engine_config);
    let runner_handle = tokio::spawn(async move { runner.run().await });

    let state = AppState {
        store,
        orchestrator,
        dispatcher,
        reconciler,
        metrics,
    };
    let app = api::router(state);

    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "cadence server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the background runner and wait for it to drain.
    let _ = shutdown_tx.send(()).await;
    match tokio::time::timeout(Duration::from_secs(10), runner_handle).await {
        Ok(Ok(Ok(()))) => info!("engine runner drained"),
        Ok(Ok(Err(e))) => warn!(error = %e, "engine runner exited with error"),
        Ok(Err(e)) => warn!(error = %e, "engine runner task panicked"),
        Err(_) => warn!("engine runner did not stop within timeout"),
    }

    info!("shutdown complete");
    Ok(())
}

fn build_engine_config(config: &CadenceConfig) -> EngineConfig {
    let mut engine_config = EngineConfig::default();
    if let Some(max_attempts) = config.engine.max_attempts {
        engine_config.max_attempts = max_attempts;
    }
    if config.engine.retry_base_seconds.is_some() || config.engine.retry_max_seconds.is_some() {
        engine_config.retry_strategy = RetryStrategy::Exponential {
            base: Duration::from_secs(config.engine.retry_base_seconds.unwrap_or(60)),
            max: Duration::from_secs(config.engine.retry_max_seconds.unwrap_or(3600)),
            multiplier: 2.0,
        };
    }
    if let Some(seconds) = config.engine.poll_interval_seconds {
        engine_config.poll_interval = Duration::from_secs(seconds);
    }
    if let Some(policy) = config.engine.signature_policy {
        engine_config.signature_policy = policy;
    }
    engine_config
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
