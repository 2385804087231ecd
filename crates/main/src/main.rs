//! 主应用程序入口
//!
//! 加载配置，连接 PostgreSQL 并执行迁移，启动 Axum HTTP / WebSocket 服务。

use anyhow::Context;
use config::AppConfig;
use infrastructure::{create_pg_pool, PgStorage, MIGRATOR};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(config = %config.sanitize(), "configuration loaded");

    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections)
        .await
        .context("failed to connect to database")?;
    MIGRATOR
        .run(&pg_pool)
        .await
        .context("failed to run migrations")?;

    let storage = PgStorage::new(pg_pool);
    let state = AppState::from_config(
        &config,
        storage.room_repository.clone(),
        storage.message_repository.clone(),
    );

    let app = router(state);
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!(%address, "chat server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    storage.pool.close().await;
    tracing::info!("chat server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        // 无法监听信号时保持运行
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

