//! # Profile Repository
//!
//! Payment handles of tab owners.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use rabbit_core::Profile;

#[derive(Debug, Clone)]
pub struct ProfileRepository {
    pool: SqlitePool,
}

impl ProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProfileRepository { pool }
    }

    /// Inserts or replaces the profile stored under `id`.
    pub async fn upsert(&self, id: &str, profile: &Profile) -> DbResult<()> {
        debug!(id = %id, "Saving profile");

        sqlx::query(
            r#"
            INSERT INTO profiles (
                id, display_name, venmo_username, cashapp_cashtag,
                paypal_username, currency_code
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                display_name    = excluded.display_name,
                venmo_username  = excluded.venmo_username,
                cashapp_cashtag = excluded.cashapp_cashtag,
                paypal_username = excluded.paypal_username,
                currency_code   = excluded.currency_code
            "#,
        )
        .bind(id)
        .bind(profile.display_name.as_deref())
        .bind(profile.venmo_username.as_deref())
        .bind(profile.cashapp_cashtag.as_deref())
        .bind(profile.paypal_username.as_deref())
        .bind(&profile.currency_code)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT display_name, venmo_username, cashapp_cashtag, paypal_username, currency_code
            FROM profiles
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }
}
