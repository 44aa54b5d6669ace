//! 产品持久化
//!
//! [`ProductRepository`] 抽象了产品记录的增删改查，内存实现用于开发和测试，
//! PostgreSQL 实现见 `pg` 模块。

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::model::Product;

/// 持久化错误
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("product has not been persisted yet")]
    MissingId,
    #[error("product {0} not found")]
    NotFound(i64),
}

/// 产品仓储
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// 按 id 升序返回全部产品
    async fn find_all(&self) -> Result<Vec<Product>, RepositoryError>;

    async fn find(&self, id: i64) -> Result<Option<Product>, RepositoryError>;

    /// 插入新记录，返回分配了 id 和时间戳的产品
    async fn insert(&self, product: Product) -> Result<Product, RepositoryError>;

    async fn update(&self, product: &Product) -> Result<Product, RepositoryError>;

    /// 删除记录，返回是否存在
    async fn remove(&self, id: i64) -> Result<bool, RepositoryError>;
}

#[derive(Default)]
struct Table {
    rows: BTreeMap<i64, Product>,
    last_id: i64,
}

/// 内存仓储，id 从 1 开始单调递增
#[derive(Default)]
pub struct InMemoryProductRepository {
    table: RwLock<Table>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_all(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn find(&self, id: i64) -> Result<Option<Product>, RepositoryError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn insert(&self, mut product: Product) -> Result<Product, RepositoryError> {
        let mut table = self.table.write().await;
        table.last_id += 1;
        let id = table.last_id;
        let now = Utc::now();
        product.id = Some(id);
        product.created_at = Some(now);
        product.updated_at = Some(now);
        table.rows.insert(id, product.clone());
        Ok(product)
    }

    async fn update(&self, product: &Product) -> Result<Product, RepositoryError> {
        let id = product.id.ok_or(RepositoryError::MissingId)?;
        let mut table = self.table.write().await;
        let row = table.rows.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;

        let created_at = row.created_at;
        *row = Product {
            created_at,
            updated_at: Some(Utc::now()),
            ..product.clone()
        };
        Ok(row.clone())
    }

    async fn remove(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}
