//! Rollcall server binary.

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use rollcall_backend::{
    api::{build_router, AppState},
    config::{Config, ServerArgs},
    store::{self, Database},
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let args = ServerArgs::parse();
    init_tracing();

    let config = Config::from_env();

    let db = Database::open(&args.database)?;
    db.ensure_default_admin(&config)?;
    info!("Database initialized at: {}", args.database);

    if args.seed_demo {
        store::seed_demo(&db)?;
    }

    let state = AppState::new(db, &config);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Rollcall API listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
