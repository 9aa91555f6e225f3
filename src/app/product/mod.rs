//! 商品资源

pub mod handler;
pub mod model;
pub mod repository;

pub use handler::AppState;
pub use model::{Product, ProductInput};
pub use repository::{PgProductRepository, ProductRepository, RepositoryError};
