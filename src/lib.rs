//! # product-api
//!
//! 基于 Axum + SQLx(PostgreSQL) 的商品 CRUD 服务：
//! - 商品的列表/查询/创建/更新/删除，支持分页
//! - 统一的 JSON 响应结构
//! - 请求 ID、客户端 IP、panic 恢复、请求日志与超时中间件

pub mod app;
pub mod config;
pub mod core;
pub mod infrastructure;
pub mod router;

pub use app::product::{AppState, PgProductRepository, Product, ProductInput, ProductRepository};
pub use config::AppConfig;
