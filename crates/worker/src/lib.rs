//! `scrub-worker`: wires concrete adapters into a [`JobPoller`].

pub mod config;

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use scrub_infra::{
    ChatCompletionsClient, HttpObjectStore, JobPoller, LogNotifier, Notifier, PostgresJobStore,
    SmtpNotifier, TokioSleeper, WorkerDeps,
};

pub use config::{ConfigError, WorkerConfig};

/// Connect every external collaborator described by `config`.
pub async fn build_poller(config: &WorkerConfig) -> anyhow::Result<JobPoller> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("failed to connect to the job database")?;
    let store = Arc::new(PostgresJobStore::new(pool));

    let http = reqwest::Client::new();
    let inputs = Arc::new(HttpObjectStore::new(
        http.clone(),
        &config.storage.url,
        &config.storage.input_bucket,
        &config.storage.key,
    ));
    let outputs = Arc::new(HttpObjectStore::new(
        http,
        &config.storage.url,
        &config.storage.output_bucket,
        &config.storage.key,
    ));

    let analysis = Arc::new(
        ChatCompletionsClient::new(
            &config.analysis.url,
            &config.analysis.api_key,
            config.analysis.timeout,
        )
        .context("failed to build analysis client")?,
    );

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(
            SmtpNotifier::new(smtp.clone()).context("failed to configure SMTP notifier")?,
        ),
        None => {
            info!("SMTP_USERNAME not set; completion notices will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let deps = WorkerDeps {
        store,
        inputs,
        outputs,
        analysis,
        notifier,
        sleeper: Arc::new(TokioSleeper),
    };

    Ok(JobPoller::new(deps, config.poller.clone()))
}
