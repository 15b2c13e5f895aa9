//! # Item Repository
//!
//! Batched writes for bill items.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use rabbit_core::{Item, ItemPatch};

/// Repository for item database operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Items of a tab in insertion order.
    pub async fn list_for_tab(&self, tab_id: &str) -> DbResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, tab_id, description, price_cents
            FROM items
            WHERE tab_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(tab_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Inserts items in one transaction. An existing id is overwritten.
    pub async fn insert_many(&self, items: &[Item]) -> DbResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        debug!(count = items.len(), "Inserting items");

        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO items (id, tab_id, description, price_cents)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    description = excluded.description,
                    price_cents = excluded.price_cents
                "#,
            )
            .bind(&item.id)
            .bind(&item.tab_id)
            .bind(&item.description)
            .bind(item.price_cents)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Applies a patch. Returns `false` if the item is not stored.
    pub async fn update(&self, id: &str, patch: &ItemPatch) -> DbResult<bool> {
        debug!(id = %id, "Updating item");

        let result = sqlx::query(
            r#"
            UPDATE items SET
                description = COALESCE(?1, description),
                price_cents = COALESCE(?2, price_cents)
            WHERE id = ?3
            "#,
        )
        .bind(patch.description.as_deref())
        .bind(patch.price_cents)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes items by id in one transaction. Missing ids are skipped.
    pub async fn delete_many(&self, ids: &[String]) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        debug!(count = ids.len(), "Deleting items");

        let mut deleted = 0;
        let mut tx = self.pool.begin().await?;
        for id in ids {
            deleted += sqlx::query("DELETE FROM items WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        Ok(deleted)
    }
}
