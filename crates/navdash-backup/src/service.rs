// ──────────────────────────────────────────────────────────────────────────────
// navdash-backup · service
// ──────────────────────────────────────────────────────────────────────────────
// Orchestrates backup, listing, restore and connection probing:
//  • reads credentials from the config store for every operation
//  • opens a fresh remote store through the connector
//  • at most one backup or restore runs at a time
// ──────────────────────────────────────────────────────────────────────────────

use crate::config_store::ConfigStore;
use crate::error::BackupError;
use crate::export::export_snapshot;
use crate::import::{import_snapshot, parse_snapshot};
use crate::remote::{RemoteConnector, RemoteStore};
use crate::types::{BackupListing, BackupOutcome, RestoreSummary};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use navdash_webdav::{ConnectionTest, WebDavCredentials};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;

const BACKUP_PREFIX: &str = "nav-dashboard-backup-";

fn backup_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^nav-dashboard-backup-\d{8}\.json$").expect("backup filename pattern is a valid regex")
    })
}

/// `true` for names produced by [`backup_filename`].
pub fn is_backup_filename(name: &str) -> bool {
    backup_name_pattern().is_match(name)
}

/// `nav-dashboard-backup-YYYYMMDD.json` for the UTC date of `at`.
pub fn backup_filename(at: DateTime<Utc>) -> String {
    format!("{}{}.json", BACKUP_PREFIX, at.format("%Y%m%d"))
}

pub struct BackupService {
    store: ConfigStore,
    pool: SqlitePool,
    connector: Arc<dyn RemoteConnector>,
    op_lock: Mutex<()>,
}

impl BackupService {
    pub fn new(pool: SqlitePool, connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            store: ConfigStore::new(pool.clone()),
            pool,
            connector,
            op_lock: Mutex::new(()),
        }
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.store
    }

    /// Export the current state and upload it under today's filename.
    pub async fn backup_now(&self) -> Result<BackupOutcome, BackupError> {
        let _guard = self.op_lock.try_lock().map_err(|_| BackupError::Busy)?;
        let (remote, secret) = self.open_remote().await?;

        let result = async {
            let doc = export_snapshot(&self.pool).await?;
            let body = serde_json::to_vec_pretty(&doc)?;

            let now = Utc::now();
            let filename = backup_filename(now);
            remote.upload(&format!("/{filename}"), body).await?;

            let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
            self.store.record_outcome("success", Some(&timestamp)).await?;
            info!("backup written to {}", filename);
            Ok::<_, BackupError>(BackupOutcome { filename, timestamp })
        }
        .await;

        result.map_err(|e| e.scrub(secret.expose_secret()))
    }

    /// Backups present on the remote, most recent first.
    pub async fn list_backups(&self) -> Result<Vec<BackupListing>, BackupError> {
        let (remote, secret) = self.open_remote().await?;
        let entries = remote
            .list("/")
            .await
            .map_err(|e| BackupError::from(e).scrub(secret.expose_secret()))?;

        let mut listings: Vec<BackupListing> = entries
            .into_iter()
            .filter(|e| !e.is_dir && is_backup_filename(&e.name))
            .map(|e| BackupListing {
                filename: e.name,
                size: e.size,
                last_modified: e.last_modified,
            })
            .collect();
        listings.sort_by(|a, b| b.filename.cmp(&a.filename));
        debug!("found {} backups on remote", listings.len());
        Ok(listings)
    }

    /// Download `filename` and replace local state with its contents.
    pub async fn restore(&self, filename: &str) -> Result<RestoreSummary, BackupError> {
        if !is_backup_filename(filename) {
            return Err(BackupError::Validation(format!("not a backup file: {filename}")));
        }
        let _guard = self.op_lock.try_lock().map_err(|_| BackupError::Busy)?;
        let (remote, secret) = self.open_remote().await?;

        let result = async {
            let data = remote.download(&format!("/{filename}")).await?;
            let doc = parse_snapshot(&data)?;
            let summary = import_snapshot(&self.pool, &doc).await?;
            info!("restored from {}", filename);
            Ok::<_, BackupError>(summary)
        }
        .await;

        result.map_err(|e| e.scrub(secret.expose_secret()))
    }

    /// Probe arbitrary credentials; the stored configuration is not used.
    pub async fn test_connection(&self, url: &str, username: &str, password: &str) -> ConnectionTest {
        let credentials = WebDavCredentials::new(url, username, password);
        let result = match self.connector.connect(&credentials) {
            Ok(remote) => remote.test_connection().await,
            Err(e) => ConnectionTest::failure(e.message),
        };
        if password.is_empty() {
            return result;
        }
        ConnectionTest {
            reason: result.reason.map(|r| r.replace(password, "****")),
            ..result
        }
    }

    async fn open_remote(&self) -> Result<(Box<dyn RemoteStore>, SecretString), BackupError> {
        let config = self.store.get().await?;
        let credentials = config.credentials().ok_or(BackupError::ConfigIncomplete)?;
        let secret = SecretString::new(credentials.password.expose_secret().clone());
        let remote = self
            .connector
            .connect(&credentials)
            .map_err(|e| BackupError::from(e).scrub(secret.expose_secret()))?;
        Ok((remote, secret))
    }
}
