//! Free-spot accounting for class sessions.
//!
//! Every mutation of `free_spots` is a single conditional `UPDATE`, so SQLite
//! serialises the check and the decrement together and two clients can never
//! both take the last spot.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::db::StoreError;
use crate::models::{ClassSession, ClientId, DayOfWeek, NewSession, SessionId, SessionRow};

const SESSION_COLUMNS: &str = "id, day_of_week, start_time, duration, specialization, instructor_name, total_capacity, free_spots";

#[derive(Clone)]
pub struct BookingLedger {
    pool: SqlitePool,
}

impl BookingLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Takes one spot in `session_id` if any is left.
    ///
    /// Returns `Ok(false)` without touching the count when the session is full.
    pub async fn attempt_booking(&self, session_id: SessionId) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let booked = take_spot(&mut *conn, session_id).await?;
        debug!(session_id, booked, "booking attempt");
        Ok(booked)
    }

    /// Same as [`attempt_booking`](Self::attempt_booking), and records the
    /// registration for `client_id` in the same transaction.
    pub async fn book_for_client(
        &self,
        session_id: SessionId,
        client_id: ClientId,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        // the write must come first: a read before it would pin a WAL
        // snapshot that a concurrent booker can invalidate
        if !take_spot(&mut *tx, session_id).await? {
            tx.rollback().await?;
            debug!(session_id, client_id, "session full");
            return Ok(false);
        }

        sqlx::query("INSERT INTO registrations (client_id, schedule_id, booked_at) VALUES (?, ?, ?)")
            .bind(client_id)
            .bind(session_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(session_id, client_id, "spot booked");
        Ok(true)
    }

    /// Administrative override of the remaining count.
    pub async fn set_capacity(
        &self,
        session_id: SessionId,
        free_spots: u32,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            "UPDATE schedule SET free_spots = ? WHERE id = ? AND ? <= total_capacity",
        )
        .bind(i64::from(free_spots))
        .bind(session_id)
        .bind(i64::from(free_spots))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 1 {
            info!(session_id, free_spots, "free spots updated");
            return Ok(());
        }

        let session = self.get_session(session_id).await?;
        Err(StoreError::Invalid(format!(
            "free spots {free_spots} exceed total capacity {} of session {session_id}",
            session.total_capacity
        )))
    }

    /// Sessions ordered Monday first, then by start time.
    pub async fn list_sessions(
        &self,
        day: Option<DayOfWeek>,
    ) -> Result<Vec<ClassSession>, StoreError> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM schedule
             WHERE ?1 IS NULL OR day_of_week = ?1
             ORDER BY day_of_week, start_time, id"
        ))
        .bind(day.map(DayOfWeek::number))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| ClassSession::try_from(row).map_err(StoreError::CorruptRow))
            .collect()
    }

    pub async fn get_session(&self, session_id: SessionId) -> Result<ClassSession, StoreError> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("SELECT {SESSION_COLUMNS} FROM schedule WHERE id = ?"))
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        let row = row.ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
        ClassSession::try_from(row).map_err(StoreError::CorruptRow)
    }

    /// Adds a session with every spot free. The instructor must be on staff.
    pub async fn create_session(&self, new: &NewSession) -> Result<ClassSession, StoreError> {
        let instructor_name = new.instructor_name.trim();
        let instructor: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM employees WHERE full_name = ? LIMIT 1")
                .bind(instructor_name)
                .fetch_optional(&self.pool)
                .await?;
        if instructor.is_none() {
            return Err(StoreError::NotFound(format!("instructor {instructor_name}")));
        }

        let row: SessionRow = sqlx::query_as(&format!(
            "INSERT INTO schedule (day_of_week, start_time, duration, specialization, instructor_name, total_capacity, free_spots)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(new.day_of_week.number())
        .bind(new.start_time)
        .bind(i64::from(new.duration.minutes()))
        .bind(new.specialization.label())
        .bind(instructor_name)
        .bind(i64::from(new.capacity))
        .bind(i64::from(new.capacity))
        .fetch_one(&self.pool)
        .await?;

        let session = ClassSession::try_from(row).map_err(StoreError::CorruptRow)?;
        info!(
            session_id = session.id,
            day = %session.day_of_week,
            start = %session.start_time,
            "session created"
        );
        Ok(session)
    }
}

/// Conditional decrement; tells a full session apart from a missing one only
/// after the update matched nothing.
async fn take_spot(conn: &mut SqliteConnection, session_id: SessionId) -> Result<bool, StoreError> {
    let taken = sqlx::query(
        "UPDATE schedule SET free_spots = free_spots - 1 WHERE id = ? AND free_spots > 0",
    )
    .bind(session_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if taken == 1 {
        return Ok(true);
    }

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM schedule WHERE id = ?")
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?;
    match exists {
        Some(_) => Ok(false),
        None => Err(StoreError::NotFound(format!("session {session_id}"))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::db::memory_pool;
    use crate::models::{ClassDuration, Specialization};

    pub(crate) async fn add_instructor(pool: &SqlitePool, name: &str) {
        sqlx::query(
            "INSERT INTO employees (full_name, phone, specialization, passport, birthday)
             VALUES (?, ?, 'Хатха-йога', '4510123456', '1990-01-01')",
        )
        .bind(name)
        .bind(format!("+7900{:07}", name.len()))
        .execute(pool)
        .await
        .unwrap();
    }

    pub(crate) fn new_session(day: DayOfWeek, hour: u32, capacity: u32) -> NewSession {
        NewSession {
            day_of_week: day,
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            duration: ClassDuration::Hour,
            specialization: Specialization::Hatha,
            instructor_name: "Анна Смирнова".into(),
            capacity,
        }
    }

    async fn ledger() -> BookingLedger {
        let pool = memory_pool().await;
        add_instructor(&pool, "Анна Смирнова").await;
        BookingLedger::new(pool)
    }

    #[tokio::test]
    async fn test_booking_decrements_by_one() {
        let ledger = ledger().await;
        let session = ledger
            .create_session(&new_session(DayOfWeek::Monday, 9, 15))
            .await
            .unwrap();
        assert_eq!(session.free_spots, 15);

        assert!(ledger.attempt_booking(session.id).await.unwrap());
        let after = ledger.get_session(session.id).await.unwrap();
        assert_eq!(after.free_spots, 14);
        assert_eq!(after.total_capacity, 15);
    }

    #[tokio::test]
    async fn test_full_session_is_not_mutated() {
        let ledger = ledger().await;
        let session = ledger
            .create_session(&new_session(DayOfWeek::Monday, 9, 10))
            .await
            .unwrap();
        ledger.set_capacity(session.id, 0).await.unwrap();

        assert!(!ledger.attempt_booking(session.id).await.unwrap());
        assert!(!ledger.attempt_booking(session.id).await.unwrap());
        assert_eq!(ledger.get_session(session.id).await.unwrap().free_spots, 0);
    }

    #[tokio::test]
    async fn test_last_spot_goes_once() {
        let ledger = ledger().await;
        let session = ledger
            .create_session(&new_session(DayOfWeek::Friday, 18, 15))
            .await
            .unwrap();
        ledger.set_capacity(session.id, 1).await.unwrap();

        assert!(ledger.attempt_booking(session.id).await.unwrap());
        assert!(!ledger.attempt_booking(session.id).await.unwrap());
        assert_eq!(ledger.get_session(session.id).await.unwrap().free_spots, 0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let ledger = ledger().await;
        let err = ledger.attempt_booking(4242).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let err = ledger.set_capacity(4242, 3).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_set_capacity_is_bounded_by_total() {
        let ledger = ledger().await;
        let session = ledger
            .create_session(&new_session(DayOfWeek::Tuesday, 10, 10))
            .await
            .unwrap();

        let err = ledger.set_capacity(session.id, 11).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(ledger.get_session(session.id).await.unwrap().free_spots, 10);

        ledger.set_capacity(session.id, 4).await.unwrap();
        assert_eq!(ledger.get_session(session.id).await.unwrap().free_spots, 4);
    }

    #[tokio::test]
    async fn test_create_session_requires_known_instructor() {
        let ledger = ledger().await;
        let mut new = new_session(DayOfWeek::Monday, 9, 10);
        new.instructor_name = "Никто".into();
        let err = ledger.create_session(&new).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_session_trims_instructor_name() {
        let ledger = ledger().await;
        let mut new = new_session(DayOfWeek::Monday, 9, 10);
        new.instructor_name = "  Анна Смирнова ".into();
        let session = ledger.create_session(&new).await.unwrap();
        assert_eq!(session.instructor_name, "Анна Смирнова");
    }

    #[tokio::test]
    async fn test_list_sessions_weekly_order() {
        let ledger = ledger().await;
        for (day, hour) in [
            (DayOfWeek::Sunday, 9),
            (DayOfWeek::Monday, 19),
            (DayOfWeek::Wednesday, 8),
            (DayOfWeek::Monday, 7),
            (DayOfWeek::Monday, 12),
        ] {
            ledger.create_session(&new_session(day, hour, 10)).await.unwrap();
        }

        let all = ledger.list_sessions(None).await.unwrap();
        let order: Vec<(DayOfWeek, u32)> = all
            .iter()
            .map(|s| (s.day_of_week, chrono::Timelike::hour(&s.start_time)))
            .collect();
        assert_eq!(
            order,
            [
                (DayOfWeek::Monday, 7),
                (DayOfWeek::Monday, 12),
                (DayOfWeek::Monday, 19),
                (DayOfWeek::Wednesday, 8),
                (DayOfWeek::Sunday, 9),
            ]
        );

        let monday = ledger.list_sessions(Some(DayOfWeek::Monday)).await.unwrap();
        assert_eq!(monday.len(), 3);
        assert!(monday.iter().all(|s| s.day_of_week == DayOfWeek::Monday));
        assert!(monday.windows(2).all(|w| w[0].start_time <= w[1].start_time));

        let thursday = ledger.list_sessions(Some(DayOfWeek::Thursday)).await.unwrap();
        assert!(thursday.is_empty());
    }

    #[tokio::test]
    async fn test_book_for_client_records_registration() {
        let ledger = ledger().await;
        let session = ledger
            .create_session(&new_session(DayOfWeek::Monday, 9, 10))
            .await
            .unwrap();
        ledger.set_capacity(session.id, 1).await.unwrap();
        let (client_id,): (i64,) = sqlx::query_as(
            "INSERT INTO clients (full_name, phone) VALUES ('Ольга', '+79001112233') RETURNING id",
        )
        .fetch_one(&ledger.pool)
        .await
        .unwrap();

        assert!(ledger.book_for_client(session.id, client_id).await.unwrap());
        assert!(!ledger.book_for_client(session.id, client_id).await.unwrap());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM registrations WHERE client_id = ?")
            .bind(client_id)
            .fetch_one(&ledger.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_failed_registration_rolls_back_decrement() {
        let ledger = ledger().await;
        let session = ledger
            .create_session(&new_session(DayOfWeek::Monday, 9, 10))
            .await
            .unwrap();

        // no such client: the foreign key rejects the insert
        assert!(ledger.book_for_client(session.id, 999).await.is_err());
        assert_eq!(ledger.get_session(session.id).await.unwrap().free_spots, 10);
    }
}
