use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::auth::{hash_password, verify_password};
use crate::db::StoreError;
use crate::models::{Attendance, AttendanceRow, Client, ClientId};

#[derive(Clone)]
pub struct ClientRegistry {
    pool: SqlitePool,
}

impl ClientRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Self-service sign-up. The phone number doubles as the login.
    pub async fn register(
        &self,
        full_name: &str,
        phone: &str,
        password: &str,
    ) -> Result<Client, StoreError> {
        let hash = hash_password(password)?;
        let client: Client = sqlx::query_as(
            "INSERT INTO clients (full_name, phone, password_hash) VALUES (?, ?, ?)
             RETURNING id, full_name, phone",
        )
        .bind(full_name)
        .bind(phone)
        .bind(hash)
        .fetch_one(&self.pool)
        .await
        .map_err(duplicate_phone)?;
        info!(client_id = client.id, "client registered");
        Ok(client)
    }

    pub async fn authenticate(&self, phone: &str, password: &str) -> Result<Client, StoreError> {
        let row: Option<(i64, String, String, Option<String>)> =
            sqlx::query_as("SELECT id, full_name, phone, password_hash FROM clients WHERE phone = ?")
                .bind(phone)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((id, full_name, phone, Some(hash))) if verify_password(password, &hash) => {
                Ok(Client {
                    id,
                    full_name,
                    phone,
                })
            }
            _ => {
                debug!("client login rejected");
                Err(StoreError::Unauthorized)
            }
        }
    }

    pub async fn change_password(
        &self,
        client_id: ClientId,
        new_password: &str,
    ) -> Result<(), StoreError> {
        let hash = hash_password(new_password)?;
        let updated = sqlx::query("UPDATE clients SET password_hash = ? WHERE id = ?")
            .bind(hash)
            .bind(client_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(StoreError::NotFound(format!("client {client_id}")));
        }
        info!(client_id, "password changed");
        Ok(())
    }

    /// Front-desk entry of a client who has no online account.
    pub async fn add(&self, full_name: &str, phone: &str) -> Result<Client, StoreError> {
        let client: Client = sqlx::query_as(
            "INSERT INTO clients (full_name, phone) VALUES (?, ?) RETURNING id, full_name, phone",
        )
        .bind(full_name)
        .bind(phone)
        .fetch_one(&self.pool)
        .await
        .map_err(duplicate_phone)?;
        info!(client_id = client.id, "client added");
        Ok(client)
    }

    pub async fn update(
        &self,
        client_id: ClientId,
        full_name: &str,
        phone: &str,
    ) -> Result<Client, StoreError> {
        let client: Option<Client> = sqlx::query_as(
            "UPDATE clients SET full_name = ?, phone = ? WHERE id = ? RETURNING id, full_name, phone",
        )
        .bind(full_name)
        .bind(phone)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(duplicate_phone)?;
        client.ok_or_else(|| StoreError::NotFound(format!("client {client_id}")))
    }

    /// Removes the client together with their registrations.
    pub async fn delete(&self, client_id: ClientId) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(client_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("client {client_id}")));
        }
        info!(client_id, "client deleted");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Client>, StoreError> {
        let clients: Vec<Client> =
            sqlx::query_as("SELECT id, full_name, phone FROM clients ORDER BY full_name, id")
                .fetch_all(&self.pool)
                .await?;
        Ok(clients)
    }

    /// Case-insensitive substring match on the name. SQLite's `lower()` only
    /// folds ASCII, so the match runs here rather than in SQL.
    pub async fn search(&self, query: &str) -> Result<Vec<Client>, StoreError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let clients = self.list().await?;
        Ok(clients
            .into_iter()
            .filter(|c| c.full_name.to_lowercase().contains(&needle))
            .collect())
    }

    /// Bookings of a client, most recent first.
    pub async fn attendance(&self, client_id: ClientId) -> Result<Vec<Attendance>, StoreError> {
        let rows: Vec<AttendanceRow> = sqlx::query_as(
            "SELECT r.id AS registration_id, r.schedule_id, r.booked_at, s.day_of_week,
                    s.start_time, s.specialization, s.instructor_name, r.attended
             FROM registrations r
             JOIN schedule s ON r.schedule_id = s.id
             WHERE r.client_id = ?
             ORDER BY r.booked_at DESC, r.id DESC",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Attendance::try_from(row).map_err(StoreError::CorruptRow))
            .collect()
    }
}

fn duplicate_phone(err: sqlx::Error) -> StoreError {
    match StoreError::from(err) {
        StoreError::Conflict(_) => StoreError::Conflict("phone number is already registered".into()),
        other => other,
    }
}
