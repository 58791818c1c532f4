use clap::Parser;
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Session proxy and availability aggregator for the upstream
/// hut-reservation service.
#[derive(Parser)]
#[command(name = "refuge")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, short)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = gateway::Config::from_file(&cli.config)?;

    if let Some(statsd) = &config.statsd {
        let recorder = StatsdBuilder::from(statsd.host.as_str(), statsd.port)
            .build(Some(statsd.prefix.as_str()))?;
        metrics::set_global_recorder(recorder)
            .map_err(|e| format!("failed to install statsd recorder: {e}"))?;
        tracing::info!(host = %statsd.host, port = statsd.port, "statsd metrics enabled");
    }
    aggregator::metrics_defs::describe(aggregator::metrics_defs::ALL_METRICS);
    gateway::metrics_defs::describe(gateway::metrics_defs::ALL_METRICS);

    tracing::info!("refuge starting");
    gateway::run(config).await?;
    Ok(())
}
