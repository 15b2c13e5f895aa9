//! # Tab Repository
//!
//! Tabs and the full-snapshot load an edit session starts from.
//!
//! ```text
//! load_snapshot(tab_id)
//!   ├── SELECT tabs        WHERE id = ?
//!   ├── SELECT items       WHERE tab_id = ?   (insertion order)
//!   ├── SELECT rabbits     WHERE tab_id = ?   (insertion order)
//!   └── SELECT assignments JOIN items ON tab_id = ?
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::assignment::AssignmentRepository;
use crate::repository::item::ItemRepository;
use crate::repository::rabbit::RabbitRepository;
use rabbit_core::{Profile, Tab, TabPatch, TabSnapshot};

/// Repository for tab database operations.
#[derive(Debug, Clone)]
pub struct TabRepository {
    pool: SqlitePool,
}

impl TabRepository {
    /// Creates a new TabRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TabRepository { pool }
    }

    /// Inserts a tab, optionally owned by a stored profile.
    pub async fn create(&self, tab: &Tab, owner_profile_id: Option<&str>) -> DbResult<()> {
        debug!(id = %tab.id, name = %tab.name, "Creating tab");

        sqlx::query(
            r#"
            INSERT INTO tabs (
                id, owner_profile_id, name, tax_percent, tip_percent,
                currency_code, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&tab.id)
        .bind(owner_profile_id)
        .bind(&tab.name)
        .bind(tab.tax_percent)
        .bind(tab.tip_percent)
        .bind(&tab.currency_code)
        .bind(tab.created_at)
        .bind(tab.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a tab by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Tab>> {
        let tab = sqlx::query_as::<_, Tab>(
            r#"
            SELECT id, name, tax_percent, tip_percent, currency_code, created_at, updated_at
            FROM tabs
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tab)
    }

    /// Lists tabs, most recently edited first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Tab>> {
        let tabs = sqlx::query_as::<_, Tab>(
            r#"
            SELECT id, name, tax_percent, tip_percent, currency_code, created_at, updated_at
            FROM tabs
            ORDER BY updated_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(tabs)
    }

    /// Applies the fields set in `patch`; unset fields keep their value.
    pub async fn apply_patch(&self, id: &str, patch: &TabPatch) -> DbResult<()> {
        debug!(id = %id, fields = patch.field_count(), "Updating tab");

        let result = sqlx::query(
            r#"
            UPDATE tabs SET
                name          = COALESCE(?1, name),
                tax_percent   = COALESCE(?2, tax_percent),
                tip_percent   = COALESCE(?3, tip_percent),
                currency_code = COALESCE(?4, currency_code),
                updated_at    = ?5
            WHERE id = ?6
            "#,
        )
        .bind(patch.name.as_deref())
        .bind(patch.tax_percent)
        .bind(patch.tip_percent)
        .bind(patch.currency_code.as_deref())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tab", id));
        }
        Ok(())
    }

    /// Loads the tab with all its items, rabbits and assignments.
    pub async fn load_snapshot(&self, id: &str) -> DbResult<Option<TabSnapshot>> {
        let Some(tab) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let items = ItemRepository::new(self.pool.clone())
            .list_for_tab(id)
            .await?;
        let rabbits = RabbitRepository::new(self.pool.clone())
            .list_for_tab(id)
            .await?;
        let assignments = AssignmentRepository::new(self.pool.clone())
            .list_for_tab(id)
            .await?;

        debug!(
            id = %id,
            items = items.len(),
            rabbits = rabbits.len(),
            assignments = assignments.len(),
            "Loaded tab snapshot"
        );

        Ok(Some(TabSnapshot {
            tab,
            items,
            rabbits,
            assignments,
        }))
    }

    /// Payment profile of the tab's owner, if one is linked.
    pub async fn owner_profile(&self, tab_id: &str) -> DbResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT p.display_name, p.venmo_username, p.cashapp_cashtag,
                   p.paypal_username, p.currency_code
            FROM profiles p
            INNER JOIN tabs t ON t.owner_profile_id = p.id
            WHERE t.id = ?1
            "#,
        )
        .bind(tab_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    /// Deletes a tab; items, rabbits and assignments go with it.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM tabs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
