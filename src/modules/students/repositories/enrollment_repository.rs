use super::super::models::Enrollment;
use crate::core::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

/// Persistence for enrollments, unique per (student, class)
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Enrollment>>;

    async fn find_by_student_and_class(
        &self,
        student_id: &str,
        class_id: &str,
    ) -> Result<Option<Enrollment>>;

    /// Insert a new enrollment; a duplicate (student, class) pair is `AppError::Conflict`
    async fn insert(&self, enrollment: &Enrollment) -> Result<Enrollment>;
}

/// MySQL-backed enrollment repository
pub struct MySqlEnrollmentRepository {
    pool: MySqlPool,
}

impl MySqlEnrollmentRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrollmentRepository for MySqlEnrollmentRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Enrollment>> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT id, student_id, class_id, status, created_at
            FROM enrollments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(enrollment)
    }

    async fn find_by_student_and_class(
        &self,
        student_id: &str,
        class_id: &str,
    ) -> Result<Option<Enrollment>> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT id, student_id, class_id, status, created_at
            FROM enrollments
            WHERE student_id = ? AND class_id = ?
            "#,
        )
        .bind(student_id)
        .bind(class_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(enrollment)
    }

    async fn insert(&self, enrollment: &Enrollment) -> Result<Enrollment> {
        sqlx::query(
            r#"
            INSERT INTO enrollments (id, student_id, class_id, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&enrollment.id)
        .bind(&enrollment.student_id)
        .bind(&enrollment.class_id)
        .bind(enrollment.status.to_string())
        .bind(enrollment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_insert(
                e,
                &format!(
                    "Enrollment for student '{}' in class '{}'",
                    enrollment.student_id, enrollment.class_id
                ),
            )
        })?;

        Ok(enrollment.clone())
    }
}
