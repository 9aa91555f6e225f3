//! 核心层：统一响应、错误与中间件

pub mod error;
pub mod middleware;
pub mod response;

pub use error::ApiError;
pub use response::{ApiResponse, Pagination};
