//! 路由与中间件装配

use axum::{error_handling::HandleErrorLayer, middleware, routing::get, Router};
use std::time::Duration;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app::product::{handler, AppState, Product, ProductInput};
use crate::core::{
    middleware::{
        client_ip_middleware, handle_middleware_error, handle_panic, request_logging_middleware,
    },
    ApiError, Pagination,
};

/// Swagger UI 挂载路径
pub const SWAGGER_PATH: &str = "/swagger";
/// OpenAPI 文档地址
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(title = "Product API", description = "CRUD REST API for product inventory"),
    paths(
        handler::health_check,
        handler::list_products,
        handler::get_product,
        handler::create_product,
        handler::update_product,
        handler::delete_product,
    ),
    components(schemas(Product, ProductInput, Pagination, handler::HealthStatus)),
    tags(
        (name = "products", description = "Product management"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// 构建完整的应用路由
///
/// 中间件按顺序（由外到内）：请求 ID → 客户端 IP → panic 恢复 → 请求日志 → 超时。
pub fn build(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(SwaggerUi::new(SWAGGER_PATH).url(OPENAPI_JSON_PATH, ApiDoc::openapi()))
        .route("/api/v1/health", get(handler::health_check))
        .route(
            "/api/v1/products",
            get(handler::list_products).post(handler::create_product),
        )
        .route(
            "/api/v1/products/:id",
            get(handler::get_product)
                .put(handler::update_product)
                .delete(handler::delete_product),
        )
        .fallback(route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::from_fn(client_ip_middleware))
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
