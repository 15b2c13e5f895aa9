//! # Assignment Repository
//!
//! Item ↔ rabbit edges, keyed by the `(item_id, rabbit_id)` pair.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use rabbit_core::Assignment;

/// Repository for assignment database operations.
#[derive(Debug, Clone)]
pub struct AssignmentRepository {
    pool: SqlitePool,
}

impl AssignmentRepository {
    /// Creates a new AssignmentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AssignmentRepository { pool }
    }

    /// Every edge whose item belongs to the tab.
    pub async fn list_for_tab(&self, tab_id: &str) -> DbResult<Vec<Assignment>> {
        let edges = sqlx::query_as::<_, Assignment>(
            r#"
            SELECT a.item_id, a.rabbit_id
            FROM assignments a
            INNER JOIN items i ON i.id = a.item_id
            WHERE i.tab_id = ?1
            ORDER BY a.rowid
            "#,
        )
        .bind(tab_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(edges)
    }

    /// Inserts edges; an edge that already exists is left alone.
    pub async fn insert_many(&self, edges: &[Assignment]) -> DbResult<()> {
        if edges.is_empty() {
            return Ok(());
        }
        debug!(count = edges.len(), "Inserting assignments");

        let mut tx = self.pool.begin().await?;
        for edge in edges {
            sqlx::query(
                r#"
                INSERT INTO assignments (item_id, rabbit_id)
                VALUES (?1, ?2)
                ON CONFLICT(item_id, rabbit_id) DO NOTHING
                "#,
            )
            .bind(&edge.item_id)
            .bind(&edge.rabbit_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    pub async fn delete_many(&self, edges: &[Assignment]) -> DbResult<u64> {
        if edges.is_empty() {
            return Ok(0);
        }
        debug!(count = edges.len(), "Deleting assignments");

        let mut deleted = 0;
        let mut tx = self.pool.begin().await?;
        for edge in edges {
            deleted += sqlx::query("DELETE FROM assignments WHERE item_id = ?1 AND rabbit_id = ?2")
                .bind(&edge.item_id)
                .bind(&edge.rabbit_id)
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
    use crate::error::DbError;
    use crate::repository::test_support::{db_with_tab, item, rabbit};
    use rabbit_core::RabbitColor;

    #[tokio::test]
    async fn test_duplicate_edge_is_ignored() {
        let (db, tab) = db_with_tab().await;
        let fries = item(&tab, "Fries", 400);
        let bun = rabbit(&tab, "Bun", RabbitColor::Red);
        db.items().insert_many(&[fries.clone()]).await.unwrap();
        db.rabbits().insert_many(&[bun.clone()]).await.unwrap();

        let edge = Assignment::new(&fries.id, &bun.id);
        db.assignments().insert_many(&[edge.clone(), edge.clone()]).await.unwrap();
        assert_eq!(db.assignments().list_for_tab(&tab.id).await.unwrap(), vec![edge.clone()]);

        assert_eq!(db.assignments().delete_many(&[edge.clone()]).await.unwrap(), 1);
        assert_eq!(db.assignments().delete_many(&[edge]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dangling_edge_rejected() {
        let (db, tab) = db_with_tab().await;
        let bun = rabbit(&tab, "Bun", RabbitColor::Red);
        db.rabbits().insert_many(&[bun.clone()]).await.unwrap();

        let result = db
            .assignments()
            .insert_many(&[Assignment::new("ghost", &bun.id)])
            .await;
        assert!(matches!(result, Err(DbError::ForeignKeyViolation { .. })));
    }
}
