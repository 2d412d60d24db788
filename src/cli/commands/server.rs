use std::net::SocketAddr;

use anyhow::Context;

use crate::app::{self, AppState};
use crate::config::{self, StoreBackend};
use crate::database::DatabaseManager;

pub async fn serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let config = config::config();
    tracing::info!("Starting Todo API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET is not set; every authenticated route will answer 401");
    }
    if crate::is_production!() && config.database.backend == StoreBackend::Memory {
        tracing::warn!("Running production with the in-memory store; data is lost on restart");
    }

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", host, port))?;

    let store = DatabaseManager::connect(&config.database)
        .await
        .context("failed to open entity store")?;

    app::serve(AppState::new(store), addr).await
}

pub async fn migrate() -> anyhow::Result<()> {
    let config = config::config();
    if config.database.backend == StoreBackend::Memory {
        println!("In-memory store selected (TODO_STORE=memory); nothing to migrate");
        return Ok(());
    }

    let pool = DatabaseManager::pool(&config.database)
        .await
        .context("failed to connect to database")?;
    DatabaseManager::migrate(&pool).await.context("migration failed")?;
    pool.close().await;

    println!("Database schema is up to date");
    Ok(())
}
