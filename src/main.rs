use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use geofeed::auth::{LocalIdentityProvider, SessionProvider};
use geofeed::backend::{DynBackend, SqliteBackend};
use geofeed::config::{Cli, Config};
use geofeed::db;
use geofeed::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    // Identity, backend and the session that ties them together
    let identity = Arc::new(LocalIdentityProvider::new(pool.clone(), &config.auth)?);
    let backend: DynBackend = Arc::new(SqliteBackend::new(pool));
    let session = Arc::new(SessionProvider::start(identity, backend.clone()));

    let state = AppState {
        backend,
        session: session.clone(),
    };
    let app = geofeed::build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    session.shutdown();
    Ok(())
}
