use anyhow::Context;
use tracing_subscriber::EnvFilter;

use zagadogs_admin::{build_app, config::Config, db, models::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections)
        .await
        .context("connecting to postgres")?;
    db::run_migrations(&pool).await.context("running migrations")?;

    tracing::info!(
        business = %cfg.reminder.business_name,
        locale = %cfg.reminder.locale,
        timezone = %cfg.reminder.timezone,
        "configuration loaded"
    );

    let app = build_app(AppState::new(pool, &cfg));

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    tracing::info!("shutting down");
}
