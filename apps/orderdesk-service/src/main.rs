//! # Archive Sweep
//!
//! One run of the archival sweeper against PostgreSQL. Meant to be started
//! by an external scheduler (cron, systemd timer, k8s CronJob).
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/orderdesk ARCHIVE_MIN_AGE_SECS=900 archive-sweep
//! ```

use anyhow::Context;
use chrono::Utc;
use orderdesk_db::Database;
use orderdesk_service::{ArchiveSweeper, ServiceConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orderdesk=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    let config = ServiceConfig::load().context("invalid configuration")?;
    info!(
        db_url = %config.database_url.chars().take(30).collect::<String>(),
        lock_timeout_ms = config.lock_timeout_ms,
        min_age_secs = config.archive_min_age_secs,
        "Configuration loaded"
    );

    let db = Database::new(config.db_config())
        .await
        .context("failed to connect to PostgreSQL")?;
    anyhow::ensure!(db.health_check().await, "database health check failed");

    let sweeper = ArchiveSweeper::new(db.store()).with_min_age(config.archive_min_age());
    let report = sweeper.run(Utc::now()).await.context("archive sweep failed")?;

    db.close().await;

    if report.failed > 0 {
        info!(failed = report.failed, "Some orders were left for the next run");
    }
    Ok(())
}
