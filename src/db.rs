//! Postgres persistence for the key-value collections.
//!
//! The table is read into a [`MemoryStore`] snapshot before any command runs
//! and written back in one transaction afterwards, so a reset either clears
//! every key or none.

use std::collections::BTreeMap;

use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::Result;
use crate::store::MemoryStore;

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn load_snapshot(pool: &PgPool) -> Result<MemoryStore> {
    let rows = sqlx::query("SELECT key, value FROM wellbeing_analytics.kv_store")
        .fetch_all(pool)
        .await?;

    let mut entries = BTreeMap::new();
    for row in rows {
        entries.insert(row.get::<String, _>("key"), row.get::<String, _>("value"));
    }
    debug!(keys = entries.len(), "loaded key-value snapshot");
    Ok(MemoryStore::from_entries(entries))
}

/// Makes the table match `snapshot` exactly.
pub async fn save_snapshot(pool: &PgPool, snapshot: &MemoryStore) -> Result<()> {
    let mut tx = pool.begin().await?;

    let keys: Vec<String> = snapshot.entries().keys().cloned().collect();
    sqlx::query("DELETE FROM wellbeing_analytics.kv_store WHERE NOT (key = ANY($1))")
        .bind(&keys)
        .execute(&mut *tx)
        .await?;

    for (key, value) in snapshot.entries() {
        sqlx::query(
            r#"
            INSERT INTO wellbeing_analytics.kv_store (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!(keys = keys.len(), "saved key-value snapshot");
    Ok(())
}
