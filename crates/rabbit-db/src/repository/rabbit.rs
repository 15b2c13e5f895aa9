//! # Rabbit Repository
//!
//! Batched writes for the people sharing a tab.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use rabbit_core::{Rabbit, RabbitPatch};

/// Repository for rabbit database operations.
#[derive(Debug, Clone)]
pub struct RabbitRepository {
    pool: SqlitePool,
}

impl RabbitRepository {
    /// Creates a new RabbitRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RabbitRepository { pool }
    }

    /// Rabbits of a tab in insertion order.
    pub async fn list_for_tab(&self, tab_id: &str) -> DbResult<Vec<Rabbit>> {
        let rabbits = sqlx::query_as::<_, Rabbit>(
            r#"
            SELECT id, tab_id, name, color, profile_id
            FROM rabbits
            WHERE tab_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(tab_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rabbits)
    }

    /// Inserts rabbits in one transaction. An existing id is overwritten.
    pub async fn insert_many(&self, rabbits: &[Rabbit]) -> DbResult<()> {
        if rabbits.is_empty() {
            return Ok(());
        }
        debug!(count = rabbits.len(), "Inserting rabbits");

        let mut tx = self.pool.begin().await?;
        for rabbit in rabbits {
            sqlx::query(
                r#"
                INSERT INTO rabbits (id, tab_id, name, color, profile_id)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    name       = excluded.name,
                    color      = excluded.color,
                    profile_id = excluded.profile_id
                "#,
            )
            .bind(&rabbit.id)
            .bind(&rabbit.tab_id)
            .bind(&rabbit.name)
            .bind(rabbit.color)
            .bind(rabbit.profile_id.as_deref())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Applies a patch. Returns `false` if the rabbit is not stored.
    pub async fn update(&self, id: &str, patch: &RabbitPatch) -> DbResult<bool> {
        debug!(id = %id, "Updating rabbit");

        let result = sqlx::query(
            r#"
            UPDATE rabbits SET
                name  = COALESCE(?1, name),
                color = COALESCE(?2, color)
            WHERE id = ?3
            "#,
        )
        .bind(patch.name.as_deref())
        .bind(patch.color)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes rabbits by id; their assignments cascade.
    pub async fn delete_many(&self, ids: &[String]) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        debug!(count = ids.len(), "Deleting rabbits");

        let mut deleted = 0;
        let mut tx = self.pool.begin().await?;
        for id in ids {
            deleted += sqlx::query("DELETE FROM rabbits WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db_with_tab, item, rabbit};
    use rabbit_core::{Assignment, RabbitColor};

    #[tokio::test]
    async fn test_color_round_trip_and_patch() {
        let (db, tab) = db_with_tab().await;
        let bun = rabbit(&tab, "Bun", RabbitColor::Purple);
        db.rabbits().insert_many(&[bun.clone()]).await.unwrap();

        let patch = RabbitPatch {
            name: None,
            color: Some(RabbitColor::Blue),
        };
        assert!(db.rabbits().update(&bun.id, &patch).await.unwrap());

        let stored = db.rabbits().list_for_tab(&tab.id).await.unwrap();
        assert_eq!(stored[0].name, "Bun");
        assert_eq!(stored[0].color, RabbitColor::Blue);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_assignments() {
        let (db, tab) = db_with_tab().await;
        let fries = item(&tab, "Fries", 400);
        let bun = rabbit(&tab, "Bun", RabbitColor::Red);
        db.items().insert_many(&[fries.clone()]).await.unwrap();
        db.rabbits().insert_many(&[bun.clone()]).await.unwrap();
        db.assignments()
            .insert_many(&[Assignment::new(&fries.id, &bun.id)])
            .await
            .unwrap();

        assert_eq!(db.rabbits().delete_many(&[bun.id.clone()]).await.unwrap(), 1);
        assert!(db.assignments().list_for_tab(&tab.id).await.unwrap().is_empty());
    }
}
