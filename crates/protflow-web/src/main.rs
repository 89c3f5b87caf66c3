//! Protflow Web Server
//!
//! Run with: cargo run -p protflow-web

use protflow_config::Config;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("protflow=debug,info")))
        .init();

    info!("Starting Protflow Web Server...");
    let config = Config::load_or_default()?;

    for dir in [
        &config.tools.structures_dir,
        &config.tools.uploads_dir,
        &config.tools.docking_dir,
        &config.tools.databases_dir,
    ] {
        tokio::fs::create_dir_all(dir).await?;
    }

    let state = protflow_web::state::AppState::from_config(&config)?;

    // Terminal jobs are evicted once they outlive the TTL.
    let registry = state.registry.clone();
    let (ttl, every) = (config.registry.job_ttl(), config.registry.sweep_interval());
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            registry.evict_terminal_older_than(ttl).await;
        }
    });

    let app = protflow_web::router::build_router(
        state,
        Path::new(&config.server.static_dir),
        &config.tools.structures_dir,
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
