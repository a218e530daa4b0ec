// ──────────────────────────────────────────────────────────────────────────────
// navdash-backup · types
// ──────────────────────────────────────────────────────────────────────────────
// Backup configuration, the portable snapshot document and the small result
// records returned by the service.
// ──────────────────────────────────────────────────────────────────────────────

use navdash_webdav::WebDavCredentials;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Snapshot format version written by this crate.
pub const SNAPSHOT_VERSION: &str = "1.0";

// ── Frequency ────────────────────────────────────────────────────────────────

/// How often the scheduler takes a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupFrequency {
    Off,
    Daily,
    Weekly,
}

impl BackupFrequency {
    /// Parse a stored or submitted value. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "off" => Some(Self::Off),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

impl fmt::Display for BackupFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Configuration ────────────────────────────────────────────────────────────

/// Backup configuration as persisted in the `settings` table.
///
/// The password is write-only: it is kept as a [`SecretString`] and skipped
/// on serialisation, so it can never be echoed back to a caller.
#[derive(Debug, Default, Serialize)]
pub struct BackupConfig {
    pub webdav_url: Option<String>,
    pub webdav_username: Option<String>,
    #[serde(skip)]
    pub webdav_password: Option<SecretString>,
    pub backup_frequency: Option<BackupFrequency>,
    pub last_backup_time: Option<String>,
    pub last_backup_status: Option<String>,
}

impl BackupConfig {
    /// Credentials for the remote, or `None` when any of URL, username or
    /// password is missing or empty.
    pub fn credentials(&self) -> Option<WebDavCredentials> {
        let url = self.webdav_url.as_deref().filter(|s| !s.trim().is_empty())?;
        let username = self.webdav_username.as_deref().filter(|s| !s.is_empty())?;
        let password = self
            .webdav_password
            .as_ref()
            .map(|p| p.expose_secret().as_str())
            .filter(|s| !s.is_empty())?;
        Some(WebDavCredentials::new(url, username, password))
    }

    /// Frequency the scheduler should run at; absent means off.
    pub fn effective_frequency(&self) -> BackupFrequency {
        self.backup_frequency.unwrap_or(BackupFrequency::Off)
    }
}

/// One field of a partial configuration update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Leave the stored value untouched.
    Keep,
    /// Remove the stored value.
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T> FieldUpdate<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FieldUpdate<U> {
        match self {
            Self::Keep => FieldUpdate::Keep,
            Self::Clear => FieldUpdate::Clear,
            Self::Set(v) => FieldUpdate::Set(f(v)),
        }
    }
}

/// Missing → `Keep`, `null` → `Clear`, value → `Set`.
impl<T> From<Option<Option<T>>> for FieldUpdate<T> {
    fn from(value: Option<Option<T>>) -> Self {
        match value {
            None => Self::Keep,
            Some(None) => Self::Clear,
            Some(Some(v)) => Self::Set(v),
        }
    }
}

/// Partial update of the backup configuration.
#[derive(Debug, Default)]
pub struct BackupConfigUpdate {
    pub webdav_url: FieldUpdate<String>,
    pub webdav_username: FieldUpdate<String>,
    pub webdav_password: FieldUpdate<SecretString>,
    pub backup_frequency: FieldUpdate<BackupFrequency>,
}

// ── Snapshot records ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

/// The portable backup payload.
///
/// `categories` and `sites` are optional at the type level so that a
/// document missing either one parses and is then rejected by validation
/// with a precise message rather than a serde error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(rename = "exportTime", default)]
    pub export_time: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub categories: Option<Vec<Category>>,
    #[serde(default)]
    pub sites: Option<Vec<Site>>,
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

// ── Results ──────────────────────────────────────────────────────────────────

/// One backup object found on the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupListing {
    pub filename: String,
    pub size: u64,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<String>,
}

/// Result of a successful `backup_now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupOutcome {
    pub filename: String,
    pub timestamp: String,
}

/// Counts restored by an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub categories: usize,
    pub sites: usize,
}
