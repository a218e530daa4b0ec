use crate::config_store::is_secret_key;
use crate::error::BackupError;
use crate::types::{Category, Site, SnapshotDocument, SNAPSHOT_VERSION};
use chrono::{SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

/// Build a snapshot of the current categories, sites and non-secret settings.
pub async fn export_snapshot(pool: &SqlitePool) -> Result<SnapshotDocument, BackupError> {
    let categories = sqlx::query(
        "SELECT id, name, icon, color, sort_order FROM categories ORDER BY sort_order ASC, id ASC",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| -> Result<Category, sqlx::Error> {
        Ok(Category {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            icon: row.try_get("icon")?,
            color: row.try_get("color")?,
            sort_order: row.try_get("sort_order")?,
        })
    })
    .collect::<Result<Vec<_>, _>>()?;

    let sites = sqlx::query(
        "SELECT id, name, url, description, logo, category_id, sort_order FROM sites \
         ORDER BY sort_order ASC, id ASC",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| -> Result<Site, sqlx::Error> {
        Ok(Site {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            description: row.try_get("description")?,
            logo: row.try_get("logo")?,
            category_id: row.try_get("category_id")?,
            sort_order: row.try_get("sort_order")?,
        })
    })
    .collect::<Result<Vec<_>, _>>()?;

    let mut settings = BTreeMap::new();
    for row in sqlx::query("SELECT key, value FROM settings").fetch_all(pool).await? {
        let key: String = row.try_get("key")?;
        if is_secret_key(&key) {
            continue;
        }
        let value: String = row.try_get("value")?;
        settings.insert(key, serde_json::Value::String(value));
    }

    Ok(SnapshotDocument {
        export_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: SNAPSHOT_VERSION.to_string(),
        categories: Some(categories),
        sites: Some(sites),
        settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::put_setting;
    use crate::schema::test_pool;

    async fn seed(pool: &SqlitePool) {
        for (id, name, order) in [(1, "Work", 2), (2, "Media", 1)] {
            sqlx::query("INSERT INTO categories (id, name, sort_order) VALUES (?, ?, ?)")
                .bind(id)
                .bind(name)
                .bind(order)
                .execute(pool)
                .await
                .unwrap();
        }
        sqlx::query("INSERT INTO sites (id, name, url, category_id, sort_order) VALUES (10, 'Mail', 'https://mail.test', 1, 5)")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO sites (id, name, url, category_id, sort_order) VALUES (11, 'Loose', 'https://loose.test', NULL, 0)")
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn export_orders_by_sort_order() {
        let pool = test_pool().await;
        seed(&pool).await;

        let doc = export_snapshot(&pool).await.unwrap();
        let cats = doc.categories.unwrap();
        assert_eq!(cats.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), ["Media", "Work"]);
        assert_eq!(cats[0].color.as_deref(), Some("#ff9a56"));

        let sites = doc.sites.unwrap();
        assert_eq!(sites[0].name, "Loose");
        assert_eq!(sites[0].category_id, None);
        assert_eq!(sites[1].category_id, Some(1));
        assert_eq!(doc.version, "1.0");
    }

    #[tokio::test]
    async fn export_excludes_secret_settings() {
        let pool = test_pool().await;
        put_setting(&pool, "admin_password", "root").await.unwrap();
        put_setting(&pool, "webdav_password", "dav").await.unwrap();
        put_setting(&pool, "site_title", "Home").await.unwrap();

        let doc = export_snapshot(&pool).await.unwrap();
        assert!(!doc.settings.contains_key("admin_password"));
        assert!(!doc.settings.contains_key("webdav_password"));
        assert_eq!(doc.settings.get("site_title"), Some(&serde_json::json!("Home")));
    }

    #[tokio::test]
    async fn export_time_is_millisecond_utc() {
        let pool = test_pool().await;
        let doc = export_snapshot(&pool).await.unwrap();
        // e.g. 2024-03-01T03:00:00.123Z
        assert_eq!(doc.export_time.len(), 24);
        assert!(doc.export_time.ends_with('Z'));
        assert_eq!(doc.categories, Some(vec![]));
    }
}
