use anyhow::Result;
use tracing::info;

use cifix_learn::{api, config, db};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal outside local development.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cifix_learn=info".parse()?)
        )
        .init();

    info!("Starting CIFIX LEARN API v{}", env!("CARGO_PKG_VERSION"));

    let cfg = config::load()?;
    info!("Configuration loaded ({})", cfg.api.environment);

    let db_pool = db::init(&cfg).await?;
    info!("Database initialized");

    // Seed the admin account when one is configured
    db::seed_admin(&db_pool, &cfg).await?;

    api::serve(cfg, db_pool).await
}
