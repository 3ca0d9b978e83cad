use std::collections::HashMap;

use axum::extract::{Json, State};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::Serialize;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::lifecycle::Status;
use crate::schema::protocolos;
use crate::state::AppState;

const RANKING_SIZE: usize = 5;
const SERIES_WINDOW_DAYS: i64 = 7;

#[derive(Serialize, Default)]
pub struct DashboardResponse {
    #[serde(rename = "graficoLinha")]
    pub grafico_linha: Vec<SeriePonto>,
    #[serde(rename = "rankingAbertura")]
    pub ranking_abertura: Vec<RankingEmail>,
    #[serde(rename = "rankingTratativa")]
    pub ranking_tratativa: Vec<RankingEmail>,
    #[serde(rename = "rankingAssuntos")]
    pub ranking_assuntos: Vec<RankingAssunto>,
}

#[derive(Serialize)]
pub struct SeriePonto {
    pub dia: String,
    pub tipo: String,
    pub total: i64,
}

#[derive(Serialize)]
pub struct RankingEmail {
    pub email: String,
    pub total: i64,
}

#[derive(Serialize)]
pub struct RankingAssunto {
    pub assunto: String,
    pub total: i64,
}

pub async fn dashboard_dados(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<DashboardResponse>> {
    if !user.role.can_view_data() {
        return Ok(Json(DashboardResponse::default()));
    }

    let mut conn = state.db()?;

    let window_start = (Utc::now().date_naive() - Duration::days(SERIES_WINDOW_DAYS))
        .and_time(NaiveTime::MIN);
    let recentes: Vec<(NaiveDateTime, String)> = protocolos::table
        .filter(protocolos::data_registro.ge(window_start))
        .select((protocolos::data_registro, protocolos::tipo))
        .load(&mut conn)?;

    let mut por_dia: HashMap<(NaiveDate, String), i64> = HashMap::new();
    for (registro, tipo) in recentes {
        *por_dia.entry((registro.date(), tipo)).or_insert(0) += 1;
    }
    let mut serie: Vec<((NaiveDate, String), i64)> = por_dia.into_iter().collect();
    serie.sort();
    let grafico_linha = serie
        .into_iter()
        .map(|((dia, tipo), total)| SeriePonto {
            dia: dia.format("%d/%m").to_string(),
            tipo,
            total,
        })
        .collect();

    let abertura: Vec<(String, i64)> = protocolos::table
        .group_by(protocolos::email_registrante)
        .select((protocolos::email_registrante, count_star()))
        .load(&mut conn)?;
    let ranking_abertura = top_emails(abertura);

    let resolvidos: Vec<(Option<String>, i64)> = protocolos::table
        .filter(protocolos::status.eq(Status::Resolvido.as_str()))
        .filter(protocolos::email_tratativa.is_not_null())
        .group_by(protocolos::email_tratativa)
        .select((protocolos::email_tratativa, count_star()))
        .load(&mut conn)?;
    let ranking_tratativa = top_emails(
        resolvidos
            .into_iter()
            .filter_map(|(email, total)| email.map(|email| (email, total)))
            .collect(),
    );

    let mut assuntos: Vec<(String, i64)> = protocolos::table
        .group_by(protocolos::assunto)
        .select((protocolos::assunto, count_star()))
        .load(&mut conn)?;
    assuntos.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let ranking_assuntos = assuntos
        .into_iter()
        .take(RANKING_SIZE)
        .map(|(assunto, total)| RankingAssunto { assunto, total })
        .collect();

    Ok(Json(DashboardResponse {
        grafico_linha,
        ranking_abertura,
        ranking_tratativa,
        ranking_assuntos,
    }))
}

fn top_emails(mut rows: Vec<(String, i64)>) -> Vec<RankingEmail> {
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.into_iter()
        .take(RANKING_SIZE)
        .map(|(email, total)| RankingEmail { email, total })
        .collect()
}
