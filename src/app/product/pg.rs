//! PostgreSQL 产品仓储

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tracing::info;

use super::model::Product;
use super::repository::{ProductRepository, RepositoryError};
use crate::config::DatabaseConfig;
use crate::infrastructure::database::DatabaseManager;

/// 基于 sqlx 连接池的产品仓储
#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 建立连接池并确保表存在
    pub async fn connect(
        database_url: &str,
        config: &DatabaseConfig,
    ) -> Result<Self, RepositoryError> {
        let manager = DatabaseManager::new(database_url, config).await?;
        let repository = Self::new(manager.into_pool());
        repository.create_tables().await?;
        Ok(repository)
    }

    /// 创建数据库表（在实际部署中应该使用迁移）
    pub async fn create_tables(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                price DOUBLE PRECISION NOT NULL CHECK (price >= 0),
                description TEXT,
                image VARCHAR(255),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database tables ready");
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn find_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn find(&self, id: i64) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn insert(&self, product: Product) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (name, price, description, image) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.image)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    async fn update(&self, product: &Product) -> Result<Product, RepositoryError> {
        let id = product.id.ok_or(RepositoryError::MissingId)?;
        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = $1, price = $2, description = $3, image = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.image)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound(id))
    }

    async fn remove(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
