use std::sync::Arc;

use paper_exchange::api::routes::{app_router, AppState};
use paper_exchange::config::Config;
use paper_exchange::feed::PriceFeed;
use paper_exchange::ledger;
use paper_exchange::settlement;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env();

    let pool = ledger::create_pool_and_migrate(&cfg.database_url)
        .await
        .expect("database connection and migrations");
    tracing::info!("connected to Postgres");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed = Arc::new(PriceFeed::new(cfg.feed));
    Arc::clone(&feed).spawn(&shutdown_rx);
    let _worker = settlement::spawn(
        pool.clone(),
        Arc::clone(&feed),
        cfg.settlement,
        shutdown_rx.clone(),
    );

    let state = AppState {
        pool,
        feed,
        jwt_secret: cfg.jwt_secret.into_bytes(),
    };
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .expect("bind listener");
    tracing::info!(addr = %cfg.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .expect("server run");
}
