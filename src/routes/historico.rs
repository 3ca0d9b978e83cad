use axum::extract::{Json, Query, State};
use chrono::{NaiveDateTime, NaiveTime};
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::Protocolo;
use crate::schema::protocolos;
use crate::state::AppState;

use super::parse_day;
use super::protocolos::ProtocoloResponse;

const MAX_PAGE_SIZE: i64 = 10_000;

#[derive(Deserialize)]
pub struct HistoricoQuery {
    #[serde(rename = "dataInicio")]
    pub data_inicio: Option<String>,
    #[serde(rename = "dataFim")]
    pub data_fim: Option<String>,
    pub tipo: Option<String>,
    pub assunto: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_page() -> i64 {
    1
}

const fn default_limit() -> i64 {
    10
}

#[derive(Serialize)]
pub struct HistoricoResponse {
    pub data: Vec<ProtocoloResponse>,
    pub total: i64,
    pub page: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

struct HistoricoFilter {
    inicio: Option<NaiveDateTime>,
    fim_exclusive: Option<NaiveDateTime>,
    tipo: Option<String>,
    assunto: Option<String>,
}

impl HistoricoFilter {
    fn from_query(query: &HistoricoQuery) -> AppResult<Self> {
        let inicio = match query.data_inicio.as_deref() {
            Some(raw) => Some(parse_day(raw)?.and_time(NaiveTime::MIN)),
            None => None,
        };
        // dataFim is inclusive; filter with the start of the following day.
        let fim_exclusive = match query.data_fim.as_deref() {
            Some(raw) => {
                Some(parse_day(raw)?.and_time(NaiveTime::MIN) + chrono::Duration::days(1))
            }
            None => None,
        };
        let tipo = query
            .tipo
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let assunto = query
            .assunto
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Self {
            inicio,
            fim_exclusive,
            tipo,
            assunto,
        })
    }

    fn apply(&self) -> protocolos::BoxedQuery<'static, Pg> {
        let mut query = protocolos::table.into_boxed();
        if let Some(inicio) = self.inicio {
            query = query.filter(protocolos::data_registro.ge(inicio));
        }
        if let Some(fim) = self.fim_exclusive {
            query = query.filter(protocolos::data_registro.lt(fim));
        }
        if let Some(tipo) = &self.tipo {
            query = query.filter(protocolos::tipo.eq(tipo.clone()));
        }
        if let Some(assunto) = &self.assunto {
            query = query.filter(protocolos::assunto.ilike(format!("%{assunto}%")));
        }
        query
    }
}

pub async fn list_historico(
    State(state): State<AppState>,
    Query(query): Query<HistoricoQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<HistoricoResponse>> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);

    if !user.role.can_view_data() {
        return Ok(Json(HistoricoResponse {
            data: Vec::new(),
            total: 0,
            page,
            total_pages: 0,
        }));
    }

    let filter = HistoricoFilter::from_query(&query)?;
    let mut conn = state.db()?;

    let total: i64 = filter.apply().count().get_result(&mut conn)?;
    let registros: Vec<Protocolo> = filter
        .apply()
        .order(protocolos::data_registro.desc())
        .limit(limit)
        .offset((page - 1) * limit)
        .load(&mut conn)?;

    let total_pages = if total == 0 {
        0
    } else {
        (total + limit - 1) / limit
    };

    Ok(Json(HistoricoResponse {
        data: registros.into_iter().map(ProtocoloResponse::from).collect(),
        total,
        page,
        total_pages,
    }))
}
