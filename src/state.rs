use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::verifier::IdentityVerifier,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            verifier,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
