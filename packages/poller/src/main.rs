// Entry point for the Mastodon ingestion poller

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use mastodon_client::MastodonClient;
use observatory_poller::{
    AuthServiceProvider, Config, CredentialProvider, Poller, PollerSettings, PostgresStatusStore,
    RunOutcome, StaticTokenProvider, TerminationCause,
};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,observatory_poller=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(RunOutcome::Drained) => {
            tracing::info!("Run drained, exiting");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Terminated(TerminationCause::Shutdown)) => {
            tracing::info!("Run stopped by shutdown signal");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Terminated(TerminationCause::AuthFailed)) => {
            tracing::error!("Run terminated: authentication failure");
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!(error = ?err, "Poller failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<RunOutcome> {
    tracing::info!("Starting Social Media Observatory poller");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        origin = %config.api_base_url,
        run_id = %config.run_id,
        table = %config.status_table,
        page_size = config.page_size,
        "Configuration loaded"
    );

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let store = PostgresStatusStore::new(pool, config.status_table.clone());
    store
        .ensure_schema()
        .await
        .context("Failed to ensure storage schema")?;
    tracing::info!("Storage ready");

    let credentials = credential_provider(&config)?;
    let credential = credentials
        .credential(&config.api_base_url)
        .await
        .context("Failed to obtain initial credential")?;
    let client = MastodonClient::new(config.api_base_url.clone(), credential.token);

    let shutdown = shutdown_signal();
    let poller = Poller::new(
        client,
        store,
        credentials,
        PollerSettings::from_config(&config),
        shutdown,
    );
    poller.run().await
}

fn credential_provider(config: &Config) -> Result<Arc<dyn CredentialProvider>> {
    if let Some(token) = &config.access_token {
        return Ok(Arc::new(StaticTokenProvider::new(token.clone())));
    }
    match (
        &config.auth_service_url,
        &config.user_email,
        &config.user_pass,
    ) {
        (Some(url), Some(email), Some(pass)) => Ok(Arc::new(AuthServiceProvider::new(
            url.clone(),
            email.clone(),
            pass.clone(),
        ))),
        // Config::from_env already rejects this; kept for direct callers.
        _ => bail!("no credential source configured"),
    }
}

/// Flip a watch channel to true on Ctrl-C so the run loop can unwind
/// between cycles.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = tx.send(true);
        }
    });
    rx
}
