use sqlx::SqlitePool;
use tracing::info;

use crate::db::StoreError;
use crate::models::PriceEntry;

#[derive(Clone)]
pub struct PriceList {
    pool: SqlitePool,
}

impl PriceList {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<PriceEntry>, StoreError> {
        let entries: Vec<PriceEntry> =
            sqlx::query_as("SELECT id, membership_type, price FROM price_list ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(entries)
    }

    pub async fn membership_types(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT membership_type FROM price_list ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    pub async fn add(&self, membership_type: &str, price: i64) -> Result<PriceEntry, StoreError> {
        let entry: PriceEntry = sqlx::query_as(
            "INSERT INTO price_list (membership_type, price) VALUES (?, ?)
             RETURNING id, membership_type, price",
        )
        .bind(membership_type)
        .bind(price)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match StoreError::from(err) {
            StoreError::Conflict(_) => {
                StoreError::Conflict(format!("membership type {membership_type} already exists"))
            }
            other => other,
        })?;
        info!(membership_type, price, "membership added");
        Ok(entry)
    }

    pub async fn update_price(
        &self,
        membership_type: &str,
        price: i64,
    ) -> Result<PriceEntry, StoreError> {
        let entry: Option<PriceEntry> = sqlx::query_as(
            "UPDATE price_list SET price = ? WHERE membership_type = ?
             RETURNING id, membership_type, price",
        )
        .bind(price)
        .bind(membership_type)
        .fetch_optional(&self.pool)
        .await?;
        let entry =
            entry.ok_or_else(|| StoreError::NotFound(format!("membership type {membership_type}")))?;
        info!(membership_type, price, "price updated");
        Ok(entry)
    }
}
