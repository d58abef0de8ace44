use super::super::models::ClassOffering;
use crate::core::Result;
use async_trait::async_trait;
use sqlx::MySqlPool;

/// Read access to the class catalog
#[async_trait]
pub trait ClassRepository: Send + Sync {
    async fn find_by_id(&self, class_id: &str) -> Result<Option<ClassOffering>>;
}

/// MySQL-backed catalog reader
pub struct MySqlClassRepository {
    pool: MySqlPool,
}

impl MySqlClassRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClassRepository for MySqlClassRepository {
    async fn find_by_id(&self, class_id: &str) -> Result<Option<ClassOffering>> {
        let class = sqlx::query_as::<_, ClassOffering>(
            r#"
            SELECT id, name, product_type, registration_fee, price, start_date
            FROM classes
            WHERE id = ?
            "#,
        )
        .bind(class_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(class)
    }
}
