// ──────────────────────────────────────────────────────────────────────────────
// navdash-backup · import
// ──────────────────────────────────────────────────────────────────────────────
// Validation and destructive replacement of local state from a snapshot:
//  • categories and sites are replaced inside a single transaction
//  • settings are upserted one by one, best-effort, secrets skipped
// ──────────────────────────────────────────────────────────────────────────────

use crate::config_store::is_secret_key;
use crate::error::BackupError;
use crate::types::{Category, RestoreSummary, Site, SnapshotDocument};
use log::{info, warn};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashSet;

const DEFAULT_COLOR: &str = "#ff9a56";

/// Parse raw bytes downloaded from the remote.
pub fn parse_snapshot(data: &[u8]) -> Result<SnapshotDocument, BackupError> {
    serde_json::from_slice(data).map_err(|e| BackupError::Validation(format!("invalid format: {e}")))
}

/// Check structure and referential integrity without touching the database.
pub fn validate(doc: &SnapshotDocument) -> Result<(&[Category], &[Site]), BackupError> {
    let (Some(categories), Some(sites)) = (doc.categories.as_deref(), doc.sites.as_deref()) else {
        return Err(BackupError::Validation("invalid format".into()));
    };

    let ids: HashSet<i64> = categories.iter().map(|c| c.id).collect();
    for site in sites {
        if let Some(cid) = site.category_id {
            if !ids.contains(&cid) {
                return Err(BackupError::Validation(format!(
                    "site {} references unknown category {}",
                    site.id, cid
                )));
            }
        }
    }
    Ok((categories, sites))
}

/// Replace local categories, sites and settings with the snapshot contents.
pub async fn import_snapshot(pool: &SqlitePool, doc: &SnapshotDocument) -> Result<RestoreSummary, BackupError> {
    let (categories, sites) = validate(doc)?;

    replace_entities(pool, categories, sites)
        .await
        .map_err(|e| BackupError::Transaction(e.to_string()))?;

    let mut skipped = 0usize;
    for (key, value) in &doc.settings {
        if is_secret_key(key) {
            warn!("restore: not overwriting secret setting '{}'", key);
            continue;
        }
        let Some(text) = setting_text(value) else {
            warn!("restore: skipping null setting '{}'", key);
            skipped += 1;
            continue;
        };
        let res = sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(text)
            .execute(pool)
            .await;
        if let Err(e) = res {
            warn!("restore: failed to write setting '{}': {}", key, e);
            skipped += 1;
        }
    }

    info!(
        "restored {} categories, {} sites ({} settings skipped)",
        categories.len(),
        sites.len(),
        skipped
    );
    Ok(RestoreSummary {
        categories: categories.len(),
        sites: sites.len(),
    })
}

async fn replace_entities(pool: &SqlitePool, categories: &[Category], sites: &[Site]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    // Sites first: they reference categories.
    sqlx::query("DELETE FROM sites").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM categories").execute(&mut *tx).await?;

    for cat in categories {
        sqlx::query("INSERT INTO categories (id, name, icon, color, sort_order) VALUES (?, ?, ?, ?, ?)")
            .bind(cat.id)
            .bind(&cat.name)
            .bind(cat.icon.as_deref().unwrap_or(""))
            .bind(cat.color.as_deref().unwrap_or(DEFAULT_COLOR))
            .bind(cat.sort_order.unwrap_or(0))
            .execute(&mut *tx)
            .await?;
    }

    for site in sites {
        sqlx::query(
            "INSERT INTO sites (id, name, url, description, logo, category_id, sort_order) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(site.id)
        .bind(&site.name)
        .bind(&site.url)
        .bind(site.description.as_deref().unwrap_or(""))
        .bind(site.logo.as_deref().unwrap_or(""))
        .bind(site.category_id)
        .bind(site.sort_order.unwrap_or(0))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

fn setting_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::put_setting;
    use crate::export::export_snapshot;
    use crate::schema::test_pool;
    use sqlx::Row;

    fn category(id: i64, name: &str, order: i64) -> Category {
        Category {
            id,
            name: name.into(),
            icon: Some("i".into()),
            color: Some("#000".into()),
            sort_order: Some(order),
        }
    }

    fn site(id: i64, category_id: Option<i64>, order: i64) -> Site {
        Site {
            id,
            name: format!("site {id}"),
            url: format!("https://{id}.test"),
            description: None,
            logo: None,
            category_id,
            sort_order: Some(order),
        }
    }

    fn doc(categories: Vec<Category>, sites: Vec<Site>) -> SnapshotDocument {
        SnapshotDocument {
            export_time: "2024-03-01T03:00:00.000Z".into(),
            version: "1.0".into(),
            categories: Some(categories),
            sites: Some(sites),
            settings: Default::default(),
        }
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn round_trip_restores_everything() {
        let source = test_pool().await;
        let snapshot = doc(
            vec![category(1, "A", 3), category(2, "B", 1), category(3, "C", 2)],
            vec![site(10, Some(1), 2), site(11, Some(2), 1), site(12, None, 0), site(13, Some(3), 9)],
        );
        import_snapshot(&source, &snapshot).await.unwrap();

        let exported = export_snapshot(&source).await.unwrap();
        let target = test_pool().await;
        let summary = import_snapshot(&target, &exported).await.unwrap();
        assert_eq!(summary, RestoreSummary { categories: 3, sites: 4 });

        let again = export_snapshot(&target).await.unwrap();
        assert_eq!(again.categories, exported.categories);
        assert_eq!(again.sites, exported.sites);
    }

    #[tokio::test]
    async fn empty_arrays_are_valid() {
        let pool = test_pool().await;
        import_snapshot(&pool, &doc(vec![category(1, "A", 0)], vec![])).await.unwrap();
        let summary = import_snapshot(&pool, &doc(vec![], vec![])).await.unwrap();
        assert_eq!(summary, RestoreSummary { categories: 0, sites: 0 });
        assert_eq!(count(&pool, "categories").await, 0);
    }

    #[tokio::test]
    async fn missing_sites_is_invalid_format() {
        let pool = test_pool().await;
        let parsed = parse_snapshot(br#"{"categories":[]}"#).unwrap();
        let err = import_snapshot(&pool, &parsed).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid format");
    }

    #[test]
    fn garbage_bytes_are_a_validation_error() {
        assert!(matches!(parse_snapshot(b"not json"), Err(BackupError::Validation(_))));
    }

    #[tokio::test]
    async fn dangling_category_is_rejected_before_any_write() {
        let pool = test_pool().await;
        import_snapshot(&pool, &doc(vec![category(1, "A", 0)], vec![site(5, Some(1), 0)]))
            .await
            .unwrap();

        let err = import_snapshot(&pool, &doc(vec![category(2, "B", 0)], vec![site(6, Some(99), 0)]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "site 6 references unknown category 99");

        let name: String = sqlx::query_scalar("SELECT name FROM categories")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(name, "A");
        assert_eq!(count(&pool, "sites").await, 1);
    }

    #[tokio::test]
    async fn constraint_violation_rolls_back_both_tables() {
        let pool = test_pool().await;
        import_snapshot(&pool, &doc(vec![category(1, "A", 0)], vec![site(5, Some(1), 0)]))
            .await
            .unwrap();

        // Duplicate site id fails on the second insert, after categories
        // were already replaced inside the transaction.
        let bad = doc(vec![category(7, "X", 0)], vec![site(8, Some(7), 0), site(8, Some(7), 1)]);
        let err = import_snapshot(&pool, &bad).await.unwrap_err();
        assert!(matches!(err, BackupError::Transaction(_)));

        let row = sqlx::query("SELECT id, name FROM categories").fetch_one(&pool).await.unwrap();
        assert_eq!(row.get::<i64, _>("id"), 1);
        assert_eq!(count(&pool, "categories").await, 1);
        let site_id: i64 = sqlx::query_scalar("SELECT id FROM sites").fetch_one(&pool).await.unwrap();
        assert_eq!(site_id, 5);
    }

    #[tokio::test]
    async fn defaults_fill_missing_optional_fields() {
        let pool = test_pool().await;
        let parsed = parse_snapshot(
            br#"{"categories":[{"id":1,"name":"A"}],"sites":[{"id":2,"name":"S","url":"https://s.test","category_id":1}]}"#,
        )
        .unwrap();
        import_snapshot(&pool, &parsed).await.unwrap();

        let row = sqlx::query("SELECT icon, color, sort_order FROM categories")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("icon"), "");
        assert_eq!(row.get::<String, _>("color"), "#ff9a56");
        assert_eq!(row.get::<i64, _>("sort_order"), 0);

        let row = sqlx::query("SELECT description, logo FROM sites")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("description"), "");
        assert_eq!(row.get::<String, _>("logo"), "");
    }

    #[tokio::test]
    async fn restore_never_overwrites_secrets() {
        let pool = test_pool().await;
        put_setting(&pool, "admin_password", "keep-me").await.unwrap();
        put_setting(&pool, "webdav_password", "dav-pw").await.unwrap();

        let mut snapshot = doc(vec![], vec![]);
        snapshot.settings.insert("admin_password".into(), Value::from("evil"));
        snapshot.settings.insert("webdav_password".into(), Value::from("evil"));
        snapshot.settings.insert("site_title".into(), Value::from("Restored"));
        snapshot.settings.insert("page_size".into(), Value::from(20));
        import_snapshot(&pool, &snapshot).await.unwrap();

        let get = |key: &'static str| {
            let pool = pool.clone();
            async move {
                sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
                    .bind(key)
                    .fetch_one(&pool)
                    .await
                    .unwrap()
            }
        };
        assert_eq!(get("admin_password").await, "keep-me");
        assert_eq!(get("webdav_password").await, "dav-pw");
        assert_eq!(get("site_title").await, "Restored");
        assert_eq!(get("page_size").await, "20");
    }
}
