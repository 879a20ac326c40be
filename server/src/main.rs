use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use laneclash_server::battles::BattleCoordinator;
use laneclash_server::config::ServerConfig;
use laneclash_server::connections::ConnectionRegistry;
use laneclash_server::matchmaker::Matchmaker;
use laneclash_server::registry::SessionRegistry;
use laneclash_server::socket::{router, AppState};
use laneclash_server::store::MemoryStore;
use tokio::time;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let store = MemoryStore::new(config.store_seed);
    let connections = Arc::new(ConnectionRegistry::new());
    let registry = Arc::new(SessionRegistry::new());
    let coordinator = Arc::new(BattleCoordinator::new(
        registry.clone(),
        connections.clone(),
        store,
        &config,
    ));
    let matchmaker = Arc::new(Matchmaker::new(
        registry,
        connections.clone(),
        coordinator.clone(),
    ));

    // Pairing loop
    {
        let matchmaker = matchmaker.clone();
        let period = config.match_tick;
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            loop {
                interval.tick().await;
                matchmaker.tick().await;
            }
        });
    }

    // Idle session sweep
    {
        let coordinator = coordinator.clone();
        let period = config.reap_tick;
        let idle_timeout = config.idle_timeout;
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            loop {
                interval.tick().await;
                coordinator.reap_idle(idle_timeout).await;
            }
        });
    }

    let state = AppState {
        matchmaker,
        coordinator,
        connections,
    };
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen addr")?;
    info!(%addr, "laneclash server listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
