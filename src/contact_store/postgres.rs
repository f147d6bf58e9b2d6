use async_trait::async_trait;

use super::{ContactRecord, ContactStore, Result};
use crate::database::DbManager;

#[derive(Debug, Clone)]
pub struct PgContactStore {
    database_mgr: DbManager,
}

impl PgContactStore {
    pub fn new(database_mgr: DbManager) -> Self {
        Self { database_mgr }
    }
}

#[async_trait]
impl ContactStore for PgContactStore {
    #[tracing::instrument(name = "Upserting contact into postgres", skip_all)]
    async fn upsert(&self, record: &ContactRecord) -> Result<()> {
        sqlx::query(
            r#"
        INSERT INTO subscribers (email, subscribed_at)
        VALUES ($1, $2)
        ON CONFLICT (email) DO UPDATE SET subscribed_at = EXCLUDED.subscribed_at
    "#,
        )
        .bind(&record.email)
        .bind(record.subscribed_at)
        .execute(self.database_mgr.db())
        .await?;

        Ok(())
    }
}
