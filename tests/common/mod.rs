use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use once_cell::sync::Lazy;
use protocolos_backend::auth::verifier::{IdentityClaims, IdentityVerifier, JwtVerifier};
use protocolos_backend::config::{AccessControl, AppConfig};
use protocolos_backend::db::{self, PgPool};
use protocolos_backend::models::NewProtocolo;
use protocolos_backend::routes;
use protocolos_backend::state::AppState;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const TEST_SECRET: &str = "test-secret";
const TEST_ISSUER: &str = "test-issuer";
const TEST_AUDIENCE: &str = "test-audience";

#[allow(dead_code)]
pub const ADMIN_EMAIL: &str = "admin@org.test";
#[allow(dead_code)]
pub const COLAB_EMAIL: &str = "colab@org.test";
#[allow(dead_code)]
pub const CLIENTE_EMAIL: &str = "cliente@parceiro.test";
#[allow(dead_code)]
pub const RESTRITO_EMAIL: &str = "novato@org.test";

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: TEST_SECRET.to_string(),
            jwt_issuer: TEST_ISSUER.to_string(),
            jwt_audience: TEST_AUDIENCE.to_string(),
            cors_allowed_origin: None,
            access: AccessControl {
                admin_emails: vec![ADMIN_EMAIL.to_string()],
                colaborador_emails: vec![COLAB_EMAIL.to_string()],
                cliente_emails: vec![CLIENTE_EMAIL.to_string()],
                org_domain: "org.test".to_string(),
                protocol_prefix: "SIS".to_string(),
            },
        };

        let pool = db::init_pool(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::from_config(&config));
        let state = AppState::new(pool, config, verifier);
        let router = routes::create_router(state.clone());

        Ok(Self { state, router })
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    /// Mints an identity token the way the external login provider would.
    pub fn token_for(&self, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = IdentityClaims {
            sub: email.to_string(),
            email: email.to_string(),
            iss: TEST_ISSUER.to_string(),
            aud: TEST_AUDIENCE.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + ChronoDuration::minutes(60)).timestamp() as usize,
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )?)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    /// Seeds a protocol row directly, bypassing the lifecycle, for read-path
    /// tests that need controlled registration dates.
    #[allow(dead_code)]
    pub async fn seed_protocolo(
        &self,
        numero: &str,
        tipo: &str,
        assunto: &str,
        data_registro: NaiveDateTime,
    ) -> Result<Uuid> {
        let row = NewProtocolo {
            id: Uuid::new_v4(),
            numero_protocolo: numero.to_string(),
            tipo: tipo.to_string(),
            assunto: assunto.to_string(),
            canal: "telefone".to_string(),
            prestador: "Prestadora Modelo".to_string(),
            cnpj: None,
            demandante: None,
            observacao: None,
            email_registrante: COLAB_EMAIL.to_string(),
            email_tratativa: None,
            status: "aberto".to_string(),
            tipo_tratativa: "encaminhado".to_string(),
            secretaria_encaminhada: Some("Atendimento".to_string()),
            tratativa: None,
            data_registro,
            data_fechamento: None,
        };
        let id = row.id;
        self.with_conn(move |conn| {
            diesel::insert_into(protocolos_backend::schema::protocolos::table)
                .values(&row)
                .execute(conn)
                .context("failed to seed protocolo")?;
            Ok(())
        })
        .await?;
        Ok(id)
    }

    #[allow(dead_code)]
    pub async fn movement_count(&self, protocolo_id: Uuid) -> Result<i64> {
        self.with_conn(move |conn| {
            use protocolos_backend::schema::movimentacoes::dsl::{
                movimentacoes, protocolo_id as protocolo_col,
            };
            let count = movimentacoes
                .filter(protocolo_col.eq(protocolo_id))
                .count()
                .get_result(conn)
                .context("failed to count movimentacoes")?;
            Ok(count)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn assert_status(
    response: hyper::Response<Body>,
    expected: StatusCode,
) -> Result<Vec<u8>> {
    let status = response.status();
    let body = body_to_vec(response.into_body()).await?;
    if status != expected {
        panic!(
            "expected {expected}, got {status}: {}",
            String::from_utf8_lossy(&body)
        );
    }
    Ok(body)
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute("TRUNCATE TABLE movimentacoes, protocolos RESTART IDENTITY CASCADE;")
        .context("failed to truncate tables")?;
    Ok(())
}
