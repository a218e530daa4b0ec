// ──────────────────────────────────────────────────────────────────────────────
// navdash-backup · config_store
// ──────────────────────────────────────────────────────────────────────────────
// Backup configuration persisted as rows of the shared `settings` table.
// ──────────────────────────────────────────────────────────────────────────────

use crate::error::BackupError;
use crate::types::{BackupConfig, BackupConfigUpdate, BackupFrequency, FieldUpdate};
use log::warn;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

pub const KEY_WEBDAV_URL: &str = "webdav_url";
pub const KEY_WEBDAV_USERNAME: &str = "webdav_username";
pub const KEY_WEBDAV_PASSWORD: &str = "webdav_password";
pub const KEY_BACKUP_FREQUENCY: &str = "backup_frequency";
pub const KEY_LAST_BACKUP_TIME: &str = "last_backup_time";
pub const KEY_LAST_BACKUP_STATUS: &str = "last_backup_status";

/// Setting keys that never leave the machine and are never restored.
pub const SECRET_KEYS: [&str; 2] = ["admin_password", KEY_WEBDAV_PASSWORD];

pub fn is_secret_key(key: &str) -> bool {
    SECRET_KEYS.contains(&key)
}

const CONFIG_KEYS: [&str; 6] = [
    KEY_WEBDAV_URL,
    KEY_WEBDAV_USERNAME,
    KEY_WEBDAV_PASSWORD,
    KEY_BACKUP_FREQUENCY,
    KEY_LAST_BACKUP_TIME,
    KEY_LAST_BACKUP_STATUS,
];

#[derive(Debug, Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
}

impl ConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read the configuration. Missing keys are absent values.
    pub async fn get(&self) -> Result<BackupConfig, BackupError> {
        let placeholders = vec!["?"; CONFIG_KEYS.len()].join(", ");
        let sql = format!("SELECT key, value FROM settings WHERE key IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for key in CONFIG_KEYS {
            query = query.bind(key);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut config = BackupConfig::default();
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            match key.as_str() {
                KEY_WEBDAV_URL => config.webdav_url = Some(value),
                KEY_WEBDAV_USERNAME => config.webdav_username = Some(value),
                KEY_WEBDAV_PASSWORD => config.webdav_password = Some(SecretString::new(value)),
                KEY_BACKUP_FREQUENCY => {
                    config.backup_frequency = BackupFrequency::parse(&value);
                    if config.backup_frequency.is_none() {
                        warn!("ignoring unknown stored backup_frequency '{}'", value);
                    }
                }
                KEY_LAST_BACKUP_TIME => config.last_backup_time = Some(value),
                KEY_LAST_BACKUP_STATUS => config.last_backup_status = Some(value),
                _ => {}
            }
        }
        Ok(config)
    }

    /// Apply a partial update. `Keep` fields are not touched at all.
    pub async fn set(&self, update: BackupConfigUpdate) -> Result<(), BackupError> {
        let mut tx = self.pool.begin().await?;
        apply(&mut tx, KEY_WEBDAV_URL, update.webdav_url).await?;
        apply(&mut tx, KEY_WEBDAV_USERNAME, update.webdav_username).await?;
        apply(
            &mut tx,
            KEY_WEBDAV_PASSWORD,
            update.webdav_password.map(|p| p.expose_secret().clone()),
        )
        .await?;
        apply(
            &mut tx,
            KEY_BACKUP_FREQUENCY,
            update.backup_frequency.map(|f| f.as_str().to_string()),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Record the outcome of a backup run. The timestamp is only written
    /// when given.
    pub async fn record_outcome(&self, status: &str, timestamp: Option<&str>) -> Result<(), BackupError> {
        put_setting(&self.pool, KEY_LAST_BACKUP_STATUS, status).await?;
        if let Some(ts) = timestamp {
            put_setting(&self.pool, KEY_LAST_BACKUP_TIME, ts).await?;
        }
        Ok(())
    }
}

async fn apply(
    tx: &mut Transaction<'_, Sqlite>,
    key: &str,
    update: FieldUpdate<String>,
) -> Result<(), sqlx::Error> {
    match update {
        FieldUpdate::Keep => Ok(()),
        FieldUpdate::Clear => {
            sqlx::query("DELETE FROM settings WHERE key = ?")
                .bind(key)
                .execute(&mut **tx)
                .await?;
            Ok(())
        }
        FieldUpdate::Set(value) => {
            sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut **tx)
                .await?;
            Ok(())
        }
    }
}

/// Upsert a single setting.
pub(crate) async fn put_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}
