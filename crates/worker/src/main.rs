use anyhow::Context;

use scrub_worker::{WorkerConfig, build_poller};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env().context("invalid worker configuration")?;
    scrub_observability::init(config.log_format);

    let poller = build_poller(&config).await?;
    tracing::info!(
        batch_size = config.poller.runner.batch_size,
        model = %config.analysis.generation.model,
        "worker ready"
    );

    tokio::select! {
        _ = poller.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            tracing::info!("shutdown signal received; stopping worker");
        }
    }

    Ok(())
}
