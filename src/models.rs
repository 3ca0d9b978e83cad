use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = protocolos)]
pub struct Protocolo {
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
    pub data_registro: NaiveDateTime,
    pub data_fechamento: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = protocolos)]
pub struct NewProtocolo {
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
    pub data_registro: NaiveDateTime,
    pub data_fechamento: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = movimentacoes)]
#[diesel(belongs_to(Protocolo, foreign_key = protocolo_id))]
pub struct Movimentacao {
    pub id: Uuid,
    pub protocolo_id: Uuid,
    pub secretaria_origem: String,
    pub secretaria_destino: String,
    pub usuario_responsavel: String,
    pub observacao: String,
    pub data_movimentacao: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = movimentacoes)]
pub struct NewMovimentacao {
    pub id: Uuid,
    pub protocolo_id: Uuid,
    pub secretaria_origem: String,
    pub secretaria_destino: String,
    pub usuario_responsavel: String,
    pub observacao: String,
    pub data_movimentacao: NaiveDateTime,
}
