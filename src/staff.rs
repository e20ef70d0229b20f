use sqlx::SqlitePool;
use tracing::info;

use crate::db::StoreError;
use crate::models::{Employee, EmployeeId, NewEmployee, Trainer};

const EMPLOYEE_COLUMNS: &str = "id, full_name, phone, specialization, passport, birthday";

/// Trainers employed by the studio.
#[derive(Clone)]
pub struct StaffRoster {
    pool: SqlitePool,
}

impl StaffRoster {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, new: &NewEmployee) -> Result<Employee, StoreError> {
        let employee: Employee = sqlx::query_as(&format!(
            "INSERT INTO employees (full_name, phone, specialization, passport, birthday)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {EMPLOYEE_COLUMNS}"
        ))
        .bind(new.full_name.trim())
        .bind(&new.phone)
        .bind(new.specialization.trim())
        .bind(new.passport.trim())
        .bind(new.birthday)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match StoreError::from(err) {
            StoreError::Conflict(_) => StoreError::Conflict("trainer is already on staff".into()),
            other => other,
        })?;
        info!(employee_id = employee.id, "employee added");
        Ok(employee)
    }

    pub async fn delete(&self, employee_id: EmployeeId) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(employee_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("employee {employee_id}")));
        }
        info!(employee_id, "employee deleted");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Employee>, StoreError> {
        let employees: Vec<Employee> = sqlx::query_as(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY full_name, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(employees)
    }

    pub async fn trainers(&self) -> Result<Vec<Trainer>, StoreError> {
        let trainers: Vec<Trainer> = sqlx::query_as(
            "SELECT full_name, specialization FROM employees ORDER BY full_name, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(trainers)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Employee>, StoreError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let employees = self.list().await?;
        Ok(employees
            .into_iter()
            .filter(|e| e.full_name.to_lowercase().contains(&needle))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::db::memory_pool;

    fn trainer(name: &str, phone: &str) -> NewEmployee {
        NewEmployee {
            full_name: name.into(),
            phone: phone.into(),
            specialization: "Кундалини йога".into(),
            passport: "4510 123456".into(),
            birthday: NaiveDate::from_ymd_opt(1988, 3, 14).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_add_list_delete() {
        let roster = StaffRoster::new(memory_pool().await);
        let b = roster.add(&trainer("Борис Орлов", "+79005550001")).await.unwrap();
        roster.add(&trainer("Анна Смирнова", "+79005550002")).await.unwrap();

        let names: Vec<String> = roster
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.full_name)
            .collect();
        assert_eq!(names, ["Анна Смирнова", "Борис Орлов"]);
        assert_eq!(roster.list().await.unwrap()[1].birthday, b.birthday);

        roster.delete(b.id).await.unwrap();
        assert_eq!(roster.list().await.unwrap().len(), 1);
        assert!(matches!(roster.delete(b.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_phone_is_conflict() {
        let roster = StaffRoster::new(memory_pool().await);
        roster.add(&trainer("Борис Орлов", "+79005550001")).await.unwrap();
        let err = roster
            .add(&trainer("Борис Орлов-младший", "+79005550001"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_add_trims_name_so_sessions_match() {
        let pool = memory_pool().await;
        let roster = StaffRoster::new(pool.clone());
        let added = roster.add(&trainer(" Анна Смирнова ", "+79005550002")).await.unwrap();
        assert_eq!(added.full_name, "Анна Смирнова");

        let ledger = crate::ledger::BookingLedger::new(pool);
        let session = ledger
            .create_session(&crate::ledger::tests::new_session(
                crate::models::DayOfWeek::Monday,
                9,
                10,
            ))
            .await
            .unwrap();
        assert_eq!(session.instructor_name, "Анна Смирнова");
    }

    #[tokio::test]
    async fn test_trainers_hide_personal_data() {
        let roster = StaffRoster::new(memory_pool().await);
        roster.add(&trainer("Борис Орлов", "+79005550001")).await.unwrap();
        let trainers = roster.trainers().await.unwrap();
        assert_eq!(
            trainers,
            [Trainer {
                full_name: "Борис Орлов".into(),
                specialization: "Кундалини йога".into(),
            }]
        );
        let json = serde_json::to_string(&trainers).unwrap();
        assert!(!json.contains("passport"));
    }

    #[tokio::test]
    async fn test_search() {
        let roster = StaffRoster::new(memory_pool().await);
        roster.add(&trainer("Борис Орлов", "+79005550001")).await.unwrap();
        roster.add(&trainer("Анна Смирнова", "+79005550002")).await.unwrap();
        let found = roster.search("ОРЛ").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].phone, "+79005550001");
        assert!(roster.search("").await.unwrap().is_empty());
    }
}
