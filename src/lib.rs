pub mod api;
pub mod config;
pub mod db;

use api::ApiService;
use config::AppConfig;
use navdash_backup::{BackupScheduler, BackupService, WebDavConnector};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `log` records from the library
/// crates are forwarded through the `tracing-log` bridge.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("logging already initialised: {e}");
    }
}

/// Wire the database, backup service and scheduler together.
pub async fn build_services(
    config: &AppConfig,
) -> Result<(Arc<BackupService>, Arc<Mutex<BackupScheduler>>), Box<dyn std::error::Error + Send + Sync>> {
    let pool = db::open_database(&config.database_path).await?;
    let connector = Arc::new(WebDavConnector::new(config.remote_timeout));
    let backup_service = Arc::new(BackupService::new(pool, connector));

    let mut scheduler = BackupScheduler::new(backup_service.clone());
    match scheduler.reload().await {
        Ok(state) => info!("backup scheduler at startup: {:?}", state),
        Err(e) => warn!("could not arm backup scheduler: {}", e),
    }

    Ok((backup_service, Arc::new(Mutex::new(scheduler))))
}

pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env();
    init_logging(config.log_json);
    info!("starting nav-dashboard {}", env!("CARGO_PKG_VERSION"));

    let (backup_service, scheduler) = build_services(&config).await?;
    let api = Arc::new(ApiService::new(backup_service, scheduler));
    api.start_server(config.bind, config.port).await
}
