use serde::{Deserialize, Serialize};

use crate::config::AccessControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Colaborador,
    Cliente,
    Restrito,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Colaborador => "colaborador",
            Role::Cliente => "cliente",
            Role::Restrito => "restrito",
        }
    }

    /// Creation and lifecycle transitions are staff-only.
    pub fn can_manage_protocols(&self) -> bool {
        matches!(self, Role::Admin | Role::Colaborador)
    }

    /// Restrito principals are authenticated but see empty result sets.
    pub fn can_view_data(&self) -> bool {
        !matches!(self, Role::Restrito)
    }
}

/// Allow-lists win over the domain rule, in priority order. Org-domain
/// emails that match no list are restrito; everything else is rejected.
pub fn resolve_role(access: &AccessControl, email: &str) -> Option<Role> {
    let email = email.trim().to_lowercase();
    if access.admin_emails.contains(&email) {
        return Some(Role::Admin);
    }
    if access.colaborador_emails.contains(&email) {
        return Some(Role::Colaborador);
    }
    if access.cliente_emails.contains(&email) {
        return Some(Role::Cliente);
    }
    let domain_suffix = format!("@{}", access.org_domain);
    if email.ends_with(&domain_suffix) {
        return Some(Role::Restrito);
    }
    None
}
