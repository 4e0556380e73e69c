//! Binary entrypoint: loads configuration, connects to the database, runs
//! migrations, and serves the spec §6 HTTP surface — mirroring the
//! teacher's `main.rs` (`tracing_subscriber` init, `dotenvy`, `AppState`
//! construction, `axum::serve`).

use std::net::SocketAddr;

use xlm_server::{build_router, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,xlm_server=debug".into()))
        .init();

    let config = Config::from_env();
    tracing::info!(host = %config.host, port = config.port, "starting xlm-server");

    std::fs::create_dir_all(&config.upload_dir)?;

    let pool = xlm_db::connect(&config.database_url).await?;
    let db = xlm_db::DbContext::new(pool);
    db.migrate().await?;
    tracing::info!("database migrations applied");

    let addr: SocketAddr = config.bind_addr().parse()?;
    let state = AppState::new(config, db);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
