//! 商品处理器
//!
//! 每个处理器的流程一致：解析并校验输入 → 调用数据访问层 → 映射为状态码和统一响应。

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use super::{
    model::{Product, ProductInput},
    repository::{ProductRepository, RepositoryError},
};
use crate::core::{ApiError, ApiResponse, Pagination};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;

/// 校验失败时优先报告的字段顺序
const REQUIRED_FIELDS: [&str; 2] = ["sku", "name"];

#[derive(Clone)]
pub struct AppState {
    pub products: Arc<dyn ProductRepository>,
    /// 创建前是否按 SKU 预查重
    pub sku_precheck: bool,
}

impl AppState {
    pub fn new(products: Arc<dyn ProductRepository>, sku_precheck: bool) -> Self {
        Self {
            products,
            sku_precheck,
        }
    }
}

/// 列表查询参数，无法解析的值会回退到默认值而不是报错
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListQuery {
    /// 返回 `(limit, offset)`：limit 取值 [1, 100]，默认 50；offset 不小于 0，默认 0
    pub fn window(&self) -> (i64, i64) {
        let limit = self
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l > 0)
            .map(|l| l.min(MAX_LIMIT))
            .unwrap_or(DEFAULT_LIMIT);

        let offset = self
            .offset
            .as_deref()
            .and_then(|o| o.trim().parse::<i64>().ok())
            .filter(|o| *o >= 0)
            .unwrap_or(0);

        (limit, offset)
    }
}

fn parse_id(raw: &str) -> Result<i32, ApiError> {
    if raw.is_empty() {
        return Err(ApiError::bad_request("Product ID is required"));
    }
    raw.parse()
        .map_err(|_| ApiError::bad_request("Invalid product ID"))
}

/// 按 JSON 解析请求体，不要求 `Content-Type` 头
fn parse_body(body: &[u8]) -> Result<ProductInput, ApiError> {
    let input: ProductInput = serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "rejected request body");
        ApiError::bad_request("Invalid request body")
    })?;

    input.validate().map_err(validation_error)?;
    Ok(input)
}

fn validation_error(errors: ValidationErrors) -> ApiError {
    let message = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| (field.to_string(), errs))
        .min_by_key(|(field, _)| {
            REQUIRED_FIELDS
                .iter()
                .position(|f| *f == field.as_str())
                .unwrap_or(usize::MAX)
        })
        .and_then(|(_, errs)| errs.first().and_then(|e| e.message.as_ref()))
        .map(|m| m.to_string())
        .unwrap_or_else(|| "Invalid request body".to_string());

    ApiError::BadRequest(message)
}

fn product_not_found() -> ApiError {
    ApiError::NotFound("Product not found".to_string())
}

fn sku_conflict() -> ApiError {
    ApiError::Conflict("Product with this SKU already exists".to_string())
}

/// 健康检查返回的服务信息
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub service: String,
    pub version: String,
}

/// GET /api/v1/products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "products",
    params(
        ("limit" = Option<i64>, Query, description = "Number of items to return (max 100)"),
        ("offset" = Option<i64>, Query, description = "Number of items to skip"),
    ),
    responses(
        (status = 200, description = "List of products with pagination metadata", body = ApiResponse<Vec<Product>>),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<ApiResponse<Vec<Product>>, ApiError> {
    let (limit, offset) = query.window();

    let products = state.products.list(limit, offset).await.map_err(|e| {
        error!(error = %e, limit, offset, "failed to list products");
        ApiError::internal("Failed to retrieve products")
    })?;

    let total = state.products.count().await.map_err(|e| {
        error!(error = %e, "failed to count products");
        ApiError::internal("Failed to count products")
    })?;

    Ok(ApiResponse::paginated(
        "Products retrieved successfully",
        products,
        Pagination {
            limit,
            offset,
            total,
        },
    ))
}

/// GET /api/v1/products/:id
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    tag = "products",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product details", body = ApiResponse<Product>),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<Product>, ApiError> {
    let id = parse_id(&raw_id)?;

    match state.products.get_by_id(id).await {
        Ok(product) => Ok(ApiResponse::success(
            StatusCode::OK,
            "Product retrieved successfully",
            product,
        )),
        Err(RepositoryError::NotFound) => Err(product_not_found()),
        Err(e) => {
            error!(error = %e, product_id = id, "failed to get product");
            Err(ApiError::internal("Failed to retrieve product"))
        }
    }
}

/// POST /api/v1/products
#[utoipa::path(
    post,
    path = "/api/v1/products",
    tag = "products",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Created product", body = ApiResponse<Product>),
        (status = 400, description = "Bad request"),
        (status = 409, description = "Product with SKU already exists"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<Product>, ApiError> {
    let input = parse_body(&body)?;
    let sku = input.sku.clone();

    // 预查重只是为了尽早返回 409，唯一约束才是最终依据
    if state.sku_precheck {
        match state.products.get_by_sku(&sku).await {
            Ok(_) => return Err(sku_conflict()),
            Err(RepositoryError::NotFound) => {}
            Err(e) => warn!(error = %e, sku = %sku, "sku pre-check failed"),
        }
    }

    match state.products.create(input).await {
        Ok(product) => {
            info!(product_id = product.id, sku = %product.sku, "product created");
            Ok(ApiResponse::success(
                StatusCode::CREATED,
                "Product created successfully",
                product,
            ))
        }
        Err(RepositoryError::Conflict { .. }) => Err(sku_conflict()),
        Err(e) => {
            error!(error = %e, sku = %sku, "failed to create product");
            Err(ApiError::internal("Failed to create product"))
        }
    }
}

/// PUT /api/v1/products/:id
///
/// SKU 与其他商品冲突时由唯一约束拒绝，按内部错误处理。
#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    tag = "products",
    params(("id" = i32, Path, description = "Product ID")),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Updated product", body = ApiResponse<Product>),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<Product>, ApiError> {
    let id = parse_id(&raw_id)?;
    let input = parse_body(&body)?;
    let sku = input.sku.clone();

    match state.products.update(id, input).await {
        Ok(product) => {
            info!(product_id = id, sku = %product.sku, "product updated");
            Ok(ApiResponse::success(
                StatusCode::OK,
                "Product updated successfully",
                product,
            ))
        }
        Err(RepositoryError::NotFound) => Err(product_not_found()),
        Err(e) => {
            error!(error = %e, product_id = id, sku = %sku, "failed to update product");
            Err(ApiError::internal("Failed to update product"))
        }
    }
}

/// DELETE /api/v1/products/:id
#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    tag = "products",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted successfully"),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let id = parse_id(&raw_id)?;

    match state.products.delete(id).await {
        Ok(()) => {
            info!(product_id = id, "product deleted");
            Ok(ApiResponse::empty(
                StatusCode::NO_CONTENT,
                "Product deleted successfully",
            ))
        }
        Err(RepositoryError::NotFound) => Err(product_not_found()),
        Err(e) => {
            error!(error = %e, product_id = id, "failed to delete product");
            Err(ApiError::internal("Failed to delete product"))
        }
    }
}

/// GET /api/v1/health
///
/// 不访问数据库，始终返回健康。
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses((status = 200, description = "Service is healthy", body = ApiResponse<HealthStatus>))
)]
pub async fn health_check() -> ApiResponse<HealthStatus> {
    ApiResponse::success(
        StatusCode::OK,
        "Service is healthy",
        HealthStatus {
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    )
}
