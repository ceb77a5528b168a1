use std::sync::Arc;

use engine::{Engine, MemoryStore, RetryPolicy};
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "isa={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let Some(server) = settings.server else {
        tracing::warn!("no server settings found, nothing to run");
        return Ok(());
    };

    tracing::info!("Found server settings...");
    let engine = build_engine(&server.database, settings.engine.retry_policy()).await?;

    let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    server::run_with_listener(engine, listener).await?;

    Ok(())
}

/// `memory` keeps records in process and executes transfers as a saga;
/// `sqlite` commits each transfer in one transaction.
async fn build_engine(
    config: &Database,
    retry: RetryPolicy,
) -> Result<Engine, Box<dyn std::error::Error + Send + Sync>> {
    let builder = Engine::builder().retry_policy(retry);
    let builder = match config {
        Database::Memory => builder.store(Arc::new(MemoryStore::new())),
        Database::Sqlite(path) => {
            let url = format!("sqlite:{}?mode=rwc", path);
            let database = sea_orm::Database::connect(url).await?;
            Migrator::up(&database, None).await?;
            builder.database(database)
        }
    };

    Ok(builder.build().await?)
}
