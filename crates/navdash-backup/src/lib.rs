//! # Nav Dashboard – Backup
//!
//! Backup and restore of the dashboard's categories, sites and settings to a
//! WebDAV remote.
//!
//! - **ConfigStore** — backup settings kept in the shared `settings` table
//! - **Export / Import** — versioned JSON snapshots; import replaces
//!   categories and sites in one transaction
//! - **BackupService** — backup, list, restore and connection probing,
//!   one backup or restore at a time
//! - **BackupScheduler** — daily / weekly timer at 03:00 local time

pub mod types;
pub mod error;
pub mod schema;
pub mod config_store;
pub mod remote;
pub mod export;
pub mod import;
pub mod service;
pub mod scheduler;

pub use config_store::ConfigStore;
pub use error::BackupError;
pub use remote::{RemoteConnector, RemoteStore, WebDavConnector};
pub use scheduler::{BackupScheduler, SchedulerState};
pub use service::BackupService;
pub use types::*;
