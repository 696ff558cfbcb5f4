use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cardissue_events::TracingPublisher;
use cardissue_infra::AppConfig;
use cardissue_worker::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    cardissue_observability::init();

    let config = AppConfig::from_env()?;
    info!(
        poll_interval_ms = config.dispatcher.poll_interval.as_millis() as u64,
        batch_size = config.dispatcher.batch_size,
        max_attempts = config.dispatcher.retry.max_attempts,
        retention_days = config.dispatcher.retention_days,
        "starting card issuance worker"
    );

    let app = App::build(config, Arc::new(TracingPublisher))?;
    let cancel = CancellationToken::new();
    let dispatcher = app.start_dispatcher(cancel.clone());

    signal::ctrl_c().await?;
    info!("shutdown requested");

    let stats = dispatcher.shutdown().await;
    info!(
        cycles = stats.cycles,
        sent = stats.entries_sent,
        failed = stats.entries_failed,
        purged = stats.entries_purged,
        "worker stopped"
    );
    Ok(())
}
