use std::sync::Arc;

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use protocolos_backend::{
    auth::verifier::{IdentityVerifier, JwtVerifier},
    config::AppConfig,
    db::{self, PgPool},
    routes,
    state::AppState,
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        database_url = %config.redacted_database_url(),
        host = %config.server_host,
        port = config.server_port,
        org_domain = %config.access.org_domain,
        "loaded backend configuration"
    );

    let bind_addr = (config.server_host.clone(), config.server_port);
    let pool = db::init_pool(&config.database_url, config.database_max_pool_size)?;
    run_migrations(&pool)?;

    let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::from_config(&config));
    let state = AppState::new(pool, config, verifier);
    let router = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "protocolos backend listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("received shutdown signal");
        })
        .await?;

    Ok(())
}

fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| anyhow::anyhow!("failed to run migrations: {err}"))?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
