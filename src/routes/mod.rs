use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{get, patch},
    Router,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub mod dashboard;
pub mod health;
pub mod historico;
pub mod identity;
pub mod protocolos;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());

    let protocolos_routes = Router::new()
        .route(
            "/",
            get(protocolos::list_protocolos).post(protocolos::create_protocolo),
        )
        .route("/:id", patch(protocolos::update_protocolo))
        .route("/:id/movimentacoes", get(protocolos::list_movimentacoes));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/protocolos", protocolos_routes)
        .route("/api/me", get(identity::me))
        .route("/api/proximo-protocolo", get(protocolos::proximo_protocolo))
        .route("/api/historico", get(historico::list_historico))
        .route("/api/dashboard-dados", get(dashboard::dashboard_dados))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
        .allow_credentials(true);

    match allowed_origin {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|value| {
                    let trimmed = value.trim();
                    (!trimmed.is_empty())
                        .then(|| trimmed.parse().expect("invalid CORS allowed origin"))
                })
                .collect();
            base.allow_origin(AllowOrigin::list(headers))
        }
        None => base.allow_origin(AllowOrigin::mirror_request()),
    }
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

/// Display format used by the movement history (`dd/mm/yyyy hh:mm`).
pub(crate) fn format_br(dt: NaiveDateTime) -> String {
    dt.format("%d/%m/%Y %H:%M").to_string()
}

pub(crate) fn parse_day(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::bad_request("dates must use the YYYY-MM-DD format"))
}
