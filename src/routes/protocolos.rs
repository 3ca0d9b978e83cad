use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use chrono::{NaiveTime, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::lifecycle::{
    self, Canal, CreateProtocolo, LifecycleError, Status, Tipo, TransitionRequest,
    TratativaInicial,
};
use crate::models::{Movimentacao, Protocolo};
use crate::schema::{movimentacoes, protocolos};
use crate::sequencer;
use crate::state::AppState;

use super::{format_br, parse_day, to_iso};

#[derive(Serialize)]
pub struct ProtocoloResponse {
    pub id: Uuid,
    pub numero_protocolo: String,
    pub tipo: String,
    pub assunto: String,
    pub canal: String,
    pub prestador: String,
    pub cnpj: Option<String>,
    pub demandante: Option<String>,
    pub observacao: Option<String>,
    pub email_registrante: String,
    pub email_tratativa: Option<String>,
    pub status: String,
    pub tipo_tratativa: String,
    pub secretaria_encaminhada: Option<String>,
    pub tratativa: Option<String>,
    pub data_registro: String,
    pub data_fechamento: Option<String>,
}

impl From<Protocolo> for ProtocoloResponse {
    fn from(protocolo: Protocolo) -> Self {
        Self {
            id: protocolo.id,
            numero_protocolo: protocolo.numero_protocolo,
            tipo: protocolo.tipo,
            assunto: protocolo.assunto,
            canal: protocolo.canal,
            prestador: protocolo.prestador,
            cnpj: protocolo.cnpj,
            demandante: protocolo.demandante,
            observacao: protocolo.observacao,
            email_registrante: protocolo.email_registrante,
            email_tratativa: protocolo.email_tratativa,
            status: protocolo.status,
            tipo_tratativa: protocolo.tipo_tratativa,
            secretaria_encaminhada: protocolo.secretaria_encaminhada,
            tratativa: protocolo.tratativa,
            data_registro: to_iso(protocolo.data_registro),
            data_fechamento: protocolo.data_fechamento.map(to_iso),
        }
    }
}

#[derive(Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub data: Option<String>,
}

pub async fn list_protocolos(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<ProtocoloResponse>>> {
    if !user.role.can_view_data() {
        return Ok(Json(Vec::new()));
    }

    let mut conn = state.db()?;
    let mut rows = protocolos::table.into_boxed();

    if let Some(raw) = query.data.as_deref() {
        let start = parse_day(raw)?.and_time(NaiveTime::MIN);
        let end = start + chrono::Duration::days(1);
        rows = rows
            .filter(protocolos::data_registro.ge(start))
            .filter(protocolos::data_registro.lt(end));
    }

    let registros: Vec<Protocolo> = rows
        .order(protocolos::data_registro.desc())
        .load(&mut conn)?;

    Ok(Json(
        registros.into_iter().map(ProtocoloResponse::from).collect(),
    ))
}

#[derive(Deserialize)]
pub struct CreateProtocoloRequest {
    pub numero: String,
    pub tipo: String,
    pub prestador: String,
    pub cnpj: Option<String>,
    pub assunto: String,
    pub observacao: Option<String>,
    pub canal: String,
    pub demandante: Option<String>,
    pub tipo_tratativa: String,
    pub secretaria_encaminhada: Option<String>,
    pub tratativa_imediata: Option<String>,
}

pub async fn create_protocolo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateProtocoloRequest>,
) -> AppResult<(StatusCode, Json<MutationResponse>)> {
    if !user.role.can_manage_protocols() {
        return Err(AppError::forbidden("role cannot register protocolos"));
    }

    let numero = required(&payload.numero, "numero")?;
    let prestador = required(&payload.prestador, "prestador")?;
    let assunto = required(&payload.assunto, "assunto")?;
    let tipo = Tipo::parse(&payload.tipo).ok_or_else(|| {
        AppError::bad_request("tipo must be solicitação, informação or reclamação")
    })?;
    let canal = Canal::parse(&payload.canal)
        .ok_or_else(|| AppError::bad_request("canal must be telefone or email"))?;

    let tratativa = match payload.tipo_tratativa.trim() {
        "imediato" => TratativaInicial::Imediata {
            solucao: required(
                payload.tratativa_imediata.as_deref().unwrap_or(""),
                "tratativa_imediata",
            )?,
        },
        "encaminhado" => TratativaInicial::Encaminhada {
            secretaria: required(
                payload.secretaria_encaminhada.as_deref().unwrap_or(""),
                "secretaria_encaminhada",
            )?,
        },
        _ => {
            return Err(AppError::bad_request(
                "tipo_tratativa must be imediato or encaminhado",
            ))
        }
    };

    let input = CreateProtocolo {
        numero,
        tipo,
        assunto,
        canal,
        prestador,
        cnpj: trim_opt(payload.cnpj),
        demandante: trim_opt(payload.demandante),
        observacao: trim_opt(payload.observacao),
        tratativa,
    };

    let mut conn = state.db()?;
    let protocolo = match lifecycle::create_protocol(&mut conn, input, &user.email) {
        Ok(protocolo) => protocolo,
        Err(LifecycleError::Database(diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            _,
        ))) => {
            return Err(AppError::conflict(
                "this protocolo number is already registered",
            ))
        }
        Err(err) => return Err(err.into()),
    };

    info!(
        numero = %protocolo.numero_protocolo,
        registrante = %user.email,
        "protocolo registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(MutationResponse {
            success: true,
            message: format!("Protocolo {} registrado", protocolo.numero_protocolo),
        }),
    ))
}

#[derive(Deserialize)]
pub struct UpdateProtocoloRequest {
    pub status: String,
    #[serde(default)]
    pub tratativa: String,
    pub nova_secretaria: Option<String>,
}

pub async fn update_protocolo(
    State(state): State<AppState>,
    Path(protocolo_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateProtocoloRequest>,
) -> AppResult<Json<MutationResponse>> {
    if !user.role.can_manage_protocols() {
        return Err(AppError::forbidden("role cannot update protocolos"));
    }

    let status = Status::parse(&payload.status).ok_or_else(|| {
        AppError::bad_request("status must be aberto, em andamento or resolvido")
    })?;

    let request = TransitionRequest {
        status,
        tratativa: payload.tratativa,
        nova_secretaria: trim_opt(payload.nova_secretaria),
    };

    let mut conn = state.db()?;
    let protocolo = lifecycle::apply_transition(&mut conn, protocolo_id, request, &user.email)?;

    info!(
        numero = %protocolo.numero_protocolo,
        status = %protocolo.status,
        responsavel = %user.email,
        "protocolo updated"
    );

    Ok(Json(MutationResponse {
        success: true,
        message: format!("Protocolo {} atualizado", protocolo.numero_protocolo),
    }))
}

#[derive(Serialize)]
pub struct MovimentacaoResponse {
    pub id: Uuid,
    pub secretaria_origem: String,
    pub secretaria_destino: String,
    pub usuario_responsavel: String,
    pub observacao: String,
    pub resolucao: bool,
    pub data_movimentacao: String,
}

pub async fn list_movimentacoes(
    State(state): State<AppState>,
    Path(protocolo_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<MovimentacaoResponse>>> {
    if !user.role.can_view_data() {
        return Ok(Json(Vec::new()));
    }

    let mut conn = state.db()?;

    protocolos::table
        .find(protocolo_id)
        .select(protocolos::id)
        .first::<Uuid>(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let rows: Vec<Movimentacao> = movimentacoes::table
        .filter(movimentacoes::protocolo_id.eq(protocolo_id))
        .order(movimentacoes::data_movimentacao.desc())
        .load(&mut conn)?;

    let historico = rows
        .into_iter()
        .map(|mov| MovimentacaoResponse {
            id: mov.id,
            resolucao: lifecycle::is_resolution_label(&mov.secretaria_destino),
            secretaria_origem: mov.secretaria_origem,
            secretaria_destino: mov.secretaria_destino,
            usuario_responsavel: mov.usuario_responsavel,
            observacao: mov.observacao,
            data_movimentacao: format_br(mov.data_movimentacao),
        })
        .collect();

    Ok(Json(historico))
}

#[derive(Serialize)]
pub struct ProximoProtocoloResponse {
    pub protocolo: String,
}

pub async fn proximo_protocolo(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<ProximoProtocoloResponse>> {
    let mut conn = state.db()?;
    let numero = sequencer::advisory_next_number(
        &mut conn,
        &state.config.access.protocol_prefix,
        Utc::now().naive_utc(),
    )?;
    Ok(Json(ProximoProtocoloResponse { protocolo: numero }))
}

fn required(raw: &str, field: &str) -> AppResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

fn trim_opt(raw: Option<String>) -> Option<String> {
    raw.and_then(|value| {
        let trimmed = value.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}
