use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewMovimentacao, NewProtocolo, Protocolo};
use crate::schema::{movimentacoes, protocolos};

pub const SECRETARIA_TRIAGEM: &str = "Triagem";
pub const DESTINO_FINALIZADO: &str = "Finalizado";
pub const DESTINO_RESOLVIDO_IMEDIATO: &str = "Resolvido Imediato";

pub const MARCADOR_ABERTURA: &str = "Abertura/Relato:";
pub const MARCADOR_ENCAMINHAMENTO: &str = "Encaminhamento:";
pub const MARCADOR_SOLUCAO: &str = "Solução Final:";

/// Single predicate for "this movement closed the protocol". Both resolution
/// destinations count; nothing else may string-match these literals.
pub fn is_resolution_label(destino: &str) -> bool {
    destino == DESTINO_FINALIZADO || destino == DESTINO_RESOLVIDO_IMEDIATO
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Aberto,
    EmAndamento,
    Resolvido,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Aberto => "aberto",
            Status::EmAndamento => "em andamento",
            Status::Resolvido => "resolvido",
        }
    }

    pub fn parse(raw: &str) -> Option<Status> {
        match raw.trim() {
            "aberto" => Some(Status::Aberto),
            "em andamento" => Some(Status::EmAndamento),
            "resolvido" => Some(Status::Resolvido),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tipo {
    Solicitacao,
    Informacao,
    Reclamacao,
}

impl Tipo {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tipo::Solicitacao => "solicitação",
            Tipo::Informacao => "informação",
            Tipo::Reclamacao => "reclamação",
        }
    }

    pub fn parse(raw: &str) -> Option<Tipo> {
        match raw.trim() {
            "solicitação" => Some(Tipo::Solicitacao),
            "informação" => Some(Tipo::Informacao),
            "reclamação" => Some(Tipo::Reclamacao),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Canal {
    Telefone,
    Email,
}

impl Canal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Canal::Telefone => "telefone",
            Canal::Email => "email",
        }
    }

    pub fn parse(raw: &str) -> Option<Canal> {
        match raw.trim() {
            "telefone" => Some(Canal::Telefone),
            "email" => Some(Canal::Email),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("protocolo not found")]
    NotFound,
    #[error("{0}")]
    InvalidTransition(String),
    #[error("stored status {0:?} is not a known state")]
    UnknownStatus(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Creation input, already validated by the caller. The enum keeps the two
/// creation paths from mixing their required fields.
#[derive(Debug)]
pub struct CreateProtocolo {
    pub numero: String,
    pub tipo: Tipo,
    pub assunto: String,
    pub canal: Canal,
    pub prestador: String,
    pub cnpj: Option<String>,
    pub demandante: Option<String>,
    pub observacao: Option<String>,
    pub tratativa: TratativaInicial,
}

#[derive(Debug)]
pub enum TratativaInicial {
    Imediata { solucao: String },
    Encaminhada { secretaria: String },
}

#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub status: Status,
    pub tratativa: String,
    pub nova_secretaria: Option<String>,
}

#[derive(Debug, PartialEq)]
pub struct MovementTemplate {
    pub origem: String,
    pub destino: String,
    pub observacao: String,
}

#[derive(Debug, PartialEq)]
pub struct TransitionPlan {
    pub next_status: Status,
    pub nova_secretaria: Option<String>,
    pub fechar: bool,
    pub tratativa: String,
    pub movement: MovementTemplate,
}

/// The transition table: current state and requested action map to the next
/// state, required fields and the movement template, or to a rejection.
/// `resolvido` is terminal.
pub fn plan_transition(
    atual: Status,
    secretaria_atual: Option<&str>,
    req: &TransitionRequest,
) -> LifecycleResult<TransitionPlan> {
    if atual == Status::Resolvido {
        return Err(LifecycleError::InvalidTransition(
            "protocolo already resolved".to_string(),
        ));
    }

    let origem = secretaria_atual.unwrap_or(SECRETARIA_TRIAGEM).to_string();
    let texto = req.tratativa.trim();

    match (req.status, req.nova_secretaria.as_deref()) {
        (Status::Resolvido, Some(_)) => Err(LifecycleError::InvalidTransition(
            "resolving does not accept a new department".to_string(),
        )),
        (Status::Resolvido, None) => {
            if texto.is_empty() {
                return Err(LifecycleError::InvalidTransition(
                    "a resolution text is required".to_string(),
                ));
            }
            Ok(TransitionPlan {
                next_status: Status::Resolvido,
                nova_secretaria: None,
                fechar: true,
                tratativa: texto.to_string(),
                movement: MovementTemplate {
                    origem,
                    destino: DESTINO_FINALIZADO.to_string(),
                    observacao: format!("{MARCADOR_SOLUCAO} {texto}"),
                },
            })
        }
        (Status::EmAndamento, Some(destino)) => {
            let destino = destino.trim();
            if destino.is_empty() {
                return Err(LifecycleError::InvalidTransition(
                    "a destination department is required".to_string(),
                ));
            }
            if texto.is_empty() {
                return Err(LifecycleError::InvalidTransition(
                    "a forwarding text is required".to_string(),
                ));
            }
            Ok(TransitionPlan {
                next_status: Status::EmAndamento,
                nova_secretaria: Some(destino.to_string()),
                fechar: false,
                tratativa: texto.to_string(),
                movement: MovementTemplate {
                    origem,
                    destino: destino.to_string(),
                    observacao: format!("{MARCADOR_ENCAMINHAMENTO} {texto}"),
                },
            })
        }
        (Status::Aberto, Some(_)) => Err(LifecycleError::InvalidTransition(
            "forwarding requires status em andamento".to_string(),
        )),
        (novo, None) => {
            let mut observacao =
                format!("Status alterado manualmente de {} para {}", atual.as_str(), novo.as_str());
            if !texto.is_empty() {
                observacao.push_str(". ");
                observacao.push_str(texto);
            }
            Ok(TransitionPlan {
                next_status: novo,
                nova_secretaria: None,
                fechar: false,
                tratativa: observacao.clone(),
                movement: MovementTemplate {
                    destino: origem.clone(),
                    origem,
                    observacao,
                },
            })
        }
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = protocolos)]
struct TransitionChangeset<'a> {
    status: &'a str,
    tratativa: &'a str,
    email_tratativa: &'a str,
    secretaria_encaminhada: Option<&'a str>,
    data_fechamento: Option<chrono::NaiveDateTime>,
}

/// Creates the protocol row and its opening movement in one transaction.
/// A duplicate `numero_protocolo` surfaces as a unique violation and rolls
/// everything back.
pub fn create_protocol(
    conn: &mut PgConnection,
    input: CreateProtocolo,
    registrante: &str,
) -> LifecycleResult<Protocolo> {
    let now = Utc::now().naive_utc();
    let relato = input.observacao.as_deref().unwrap_or("").trim().to_string();

    let (row, movimento) = match &input.tratativa {
        TratativaInicial::Imediata { solucao } => {
            let solucao = solucao.trim().to_string();
            let row = NewProtocolo {
                id: Uuid::new_v4(),
                numero_protocolo: input.numero.clone(),
                tipo: input.tipo.as_str().to_string(),
                assunto: input.assunto.clone(),
                canal: input.canal.as_str().to_string(),
                prestador: input.prestador.clone(),
                cnpj: input.cnpj.clone(),
                demandante: input.demandante.clone(),
                observacao: input.observacao.clone(),
                email_registrante: registrante.to_string(),
                email_tratativa: Some(registrante.to_string()),
                status: Status::Resolvido.as_str().to_string(),
                tipo_tratativa: "imediato".to_string(),
                secretaria_encaminhada: None,
                tratativa: Some(solucao.clone()),
                data_registro: now,
                data_fechamento: Some(now),
            };
            let movimento = MovementTemplate {
                origem: SECRETARIA_TRIAGEM.to_string(),
                destino: DESTINO_RESOLVIDO_IMEDIATO.to_string(),
                observacao: format!(
                    "{MARCADOR_ABERTURA} {relato}\n{MARCADOR_SOLUCAO} {solucao}"
                ),
            };
            (row, movimento)
        }
        TratativaInicial::Encaminhada { secretaria } => {
            let secretaria = secretaria.trim().to_string();
            let row = NewProtocolo {
                id: Uuid::new_v4(),
                numero_protocolo: input.numero.clone(),
                tipo: input.tipo.as_str().to_string(),
                assunto: input.assunto.clone(),
                canal: input.canal.as_str().to_string(),
                prestador: input.prestador.clone(),
                cnpj: input.cnpj.clone(),
                demandante: input.demandante.clone(),
                observacao: input.observacao.clone(),
                email_registrante: registrante.to_string(),
                email_tratativa: None,
                status: Status::Aberto.as_str().to_string(),
                tipo_tratativa: "encaminhado".to_string(),
                secretaria_encaminhada: Some(secretaria.clone()),
                tratativa: None,
                data_registro: now,
                data_fechamento: None,
            };
            let movimento = MovementTemplate {
                origem: SECRETARIA_TRIAGEM.to_string(),
                destino: secretaria,
                observacao: format!("{MARCADOR_ABERTURA} {relato}"),
            };
            (row, movimento)
        }
    };

    conn.transaction::<Protocolo, LifecycleError, _>(|conn| {
        diesel::insert_into(protocolos::table)
            .values(&row)
            .execute(conn)?;

        let abertura = NewMovimentacao {
            id: Uuid::new_v4(),
            protocolo_id: row.id,
            secretaria_origem: movimento.origem,
            secretaria_destino: movimento.destino,
            usuario_responsavel: registrante.to_string(),
            observacao: movimento.observacao,
            data_movimentacao: now,
        };
        diesel::insert_into(movimentacoes::table)
            .values(&abertura)
            .execute(conn)?;

        Ok(protocolos::table.find(row.id).first(conn)?)
    })
}

/// Applies one lifecycle transition: read the current row, plan against the
/// transition table, mutate the protocol and append the paired movement.
/// Store mutation and ledger append commit or roll back together.
pub fn apply_transition(
    conn: &mut PgConnection,
    protocolo_id: Uuid,
    req: TransitionRequest,
    responsavel: &str,
) -> LifecycleResult<Protocolo> {
    conn.transaction::<Protocolo, LifecycleError, _>(|conn| {
        let atual: Protocolo = protocolos::table
            .find(protocolo_id)
            .first(conn)
            .optional()?
            .ok_or(LifecycleError::NotFound)?;

        let status_atual = Status::parse(&atual.status)
            .ok_or_else(|| LifecycleError::UnknownStatus(atual.status.clone()))?;

        let plan = plan_transition(status_atual, atual.secretaria_encaminhada.as_deref(), &req)?;
        let now = Utc::now().naive_utc();

        let changeset = TransitionChangeset {
            status: plan.next_status.as_str(),
            tratativa: &plan.tratativa,
            email_tratativa: responsavel,
            secretaria_encaminhada: plan.nova_secretaria.as_deref(),
            data_fechamento: plan.fechar.then_some(now),
        };
        diesel::update(protocolos::table.find(protocolo_id))
            .set(&changeset)
            .execute(conn)?;

        let movimento = NewMovimentacao {
            id: Uuid::new_v4(),
            protocolo_id,
            secretaria_origem: plan.movement.origem,
            secretaria_destino: plan.movement.destino,
            usuario_responsavel: responsavel.to_string(),
            observacao: plan.movement.observacao,
            data_movimentacao: now,
        };
        diesel::insert_into(movimentacoes::table)
            .values(&movimento)
            .execute(conn)?;

        Ok(protocolos::table.find(protocolo_id).first(conn)?)
    })
}
