//! 商品数据访问层

use async_trait::async_trait;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;
use sqlx::{postgres::PgPool, query, query_as, query_scalar};

use super::model::{Product, ProductInput};

const CREATE_PRODUCT_SQL: &str = include_str!("sql/create_product.sql");
const GET_PRODUCT_BY_ID_SQL: &str = include_str!("sql/get_product_by_id.sql");
const GET_PRODUCT_BY_SKU_SQL: &str = include_str!("sql/get_product_by_sku.sql");
const UPDATE_PRODUCT_SQL: &str = include_str!("sql/update_product.sql");
const DELETE_PRODUCT_SQL: &str = include_str!("sql/delete_product.sql");
const LIST_PRODUCTS_SQL: &str = include_str!("sql/list_products.sql");
const COUNT_PRODUCTS_SQL: &str = include_str!("sql/count_products.sql");

/// 数据访问层错误
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// 没有匹配或受影响的行
    #[error("product not found")]
    NotFound,
    /// 违反 SKU 唯一约束
    #[error("product with sku {sku:?} already exists")]
    Conflict { sku: String },
    #[error("failed to {operation}: {source}")]
    Internal {
        operation: &'static str,
        source: sqlx::Error,
    },
}

impl RepositoryError {
    fn internal(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Internal { operation, source }
    }

    /// 插入时的错误映射：唯一约束冲突视为 `Conflict`
    fn from_insert(operation: &'static str, sku: &str, source: sqlx::Error) -> Self {
        match &source {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict {
                sku: sku.to_string(),
            },
            _ => Self::Internal { operation, source },
        }
    }
}

/// 商品存储接口
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// 插入新商品，返回带有 id 和时间戳的完整记录
    async fn create(&self, input: ProductInput) -> Result<Product, RepositoryError>;

    async fn get_by_id(&self, id: i32) -> Result<Product, RepositoryError>;

    async fn get_by_sku(&self, sku: &str) -> Result<Product, RepositoryError>;

    /// 整体覆盖可变字段并刷新 `updated_at`，违反唯一约束时返回 `Internal`
    async fn update(&self, id: i32, input: ProductInput) -> Result<Product, RepositoryError>;

    async fn delete(&self, id: i32) -> Result<(), RepositoryError>;

    /// 按创建时间倒序分页，窗口超出范围时返回空列表
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Product>, RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}

/// 基于 PostgreSQL 的实现
#[derive(Debug, Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn create(&self, input: ProductInput) -> Result<Product, RepositoryError> {
        query_as::<_, Product>(CREATE_PRODUCT_SQL)
            .bind(&input.sku)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.quantity)
            .bind(input.unit_price)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_insert("create product", &input.sku, e))
    }

    async fn get_by_id(&self, id: i32) -> Result<Product, RepositoryError> {
        query_as::<_, Product>(GET_PRODUCT_BY_ID_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::internal("get product"))?
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_by_sku(&self, sku: &str) -> Result<Product, RepositoryError> {
        query_as::<_, Product>(GET_PRODUCT_BY_SKU_SQL)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::internal("get product by sku"))?
            .ok_or(RepositoryError::NotFound)
    }

    async fn update(&self, id: i32, input: ProductInput) -> Result<Product, RepositoryError> {
        query_as::<_, Product>(UPDATE_PRODUCT_SQL)
            .bind(id)
            .bind(&input.sku)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.quantity)
            .bind(input.unit_price)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::internal("update product"))?
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: i32) -> Result<(), RepositoryError> {
        let result = query(DELETE_PRODUCT_SQL)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::internal("delete product"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Product>, RepositoryError> {
        query_as::<_, Product>(LIST_PRODUCTS_SQL)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::internal("list products"))
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        query_scalar::<_, i64>(COUNT_PRODUCTS_SQL)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::internal("count products"))
    }
}
