use super::super::models::Student;
use crate::core::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

/// Persistence for students
///
/// `insert` must surface a duplicate email as `AppError::Conflict`; the
/// unique index on `students.email` is what arbitrates concurrent creates.
#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Student>>;

    /// Find by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<Student>>;

    async fn insert(&self, student: &Student) -> Result<Student>;

    /// Attach a billing customer reference unless one is already present
    ///
    /// Returns true when the reference was written.
    async fn attach_billing_customer(&self, id: &str, customer_ref: &str) -> Result<bool>;

    /// Fill in the display name if it is still empty
    async fn fill_name(&self, id: &str, name: &str) -> Result<()>;
}

/// MySQL-backed student repository
pub struct MySqlStudentRepository {
    pool: MySqlPool,
}

impl MySqlStudentRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

const STUDENT_COLUMNS: &str =
    "id, email, name, billing_customer_ref, created_at, updated_at";

#[async_trait]
impl StudentRepository for MySqlStudentRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(&format!(
            "SELECT {} FROM students WHERE id = ?",
            STUDENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(&format!(
            "SELECT {} FROM students WHERE email = ?",
            STUDENT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

    async fn insert(&self, student: &Student) -> Result<Student> {
        sqlx::query(
            r#"
            INSERT INTO students (id, email, name, billing_customer_ref, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&student.id)
        .bind(&student.email)
        .bind(&student.name)
        .bind(&student.billing_customer_ref)
        .bind(student.created_at)
        .bind(student.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, &format!("Student '{}'", student.email)))?;

        Ok(student.clone())
    }

    async fn attach_billing_customer(&self, id: &str, customer_ref: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE students
            SET billing_customer_ref = ?, updated_at = NOW()
            WHERE id = ? AND billing_customer_ref IS NULL
            "#,
        )
        .bind(customer_ref)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fill_name(&self, id: &str, name: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE students
            SET name = ?, updated_at = NOW()
            WHERE id = ? AND (name IS NULL OR name = '')
            "#,
        )
        .bind(name)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
