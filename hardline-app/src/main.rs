//! `hardline [config.json]`
//!
//! Runs the sync core headless: drains the offline queue on the configured
//! interval and logs status changes until interrupted.

use anyhow::Result;
use hardline_app::{logging, AppConfig, AppContext};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    let app = AppContext::start(config).await?;

    let _status_log = app.sync().subscribe(|status| {
        info!(
            online = status.is_online,
            syncing = status.is_syncing,
            pending = status.pending_count,
            errors = status.error_count,
            "sync status"
        );
    });

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");

    let report = app.sync().flush().await?;
    info!(
        "final drain: {} succeeded, {} failed, {} remaining",
        report.succeeded, report.failed, report.remaining
    );
    app.shutdown().await
}
