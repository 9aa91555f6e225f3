use anyhow::Context;
use clap::{Parser, Subcommand};
use product_api::{
    infrastructure::{DatabaseManager, Logger},
    router, AppConfig, AppState, PgProductRepository,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "product-api", version, about = "商品 CRUD REST 服务")]
struct Cli {
    /// 配置文件路径（默认 config/product-api.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 启动 HTTP 服务（默认）
    Serve,
    /// 数据库迁移
    Migrate {
        #[command(subcommand)]
        direction: MigrateDirection,
    },
}

#[derive(Debug, Subcommand)]
enum MigrateDirection {
    /// 创建 products 表
    Up,
    /// 删除 products 表
    Down,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    Logger::init(&config.logging.level);

    let database = DatabaseManager::new(&config.database)
        .await
        .context("failed to connect to database")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, database).await,
        Command::Migrate { direction } => {
            match direction {
                MigrateDirection::Up => database.migrate_up().await?,
                MigrateDirection::Down => database.migrate_down().await?,
            }
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, database: DatabaseManager) -> anyhow::Result<()> {
    if config.database.run_migrations {
        database.migrate_up().await?;
    }

    let repository = PgProductRepository::new(database.get_pool().clone());
    let state = AppState::new(Arc::new(repository), config.api.sku_precheck);
    let app = router::build(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("🚀 product-api listening on http://{}", listener.local_addr()?);
    info!("   GET    /api/v1/health");
    info!("   GET    /api/v1/products?limit&offset");
    info!("   POST   /api/v1/products");
    info!("   GET    /api/v1/products/:id");
    info!("   PUT    /api/v1/products/:id");
    info!("   DELETE /api/v1/products/:id");
    info!(
        "   GET    {} (OpenAPI: {})",
        router::SWAGGER_PATH,
        router::OPENAPI_JSON_PATH
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    database.get_pool().close().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
