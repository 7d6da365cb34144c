//! Authenticated session and role-based module access.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

use enerdesk_config::Config;
use enerdesk_utils::error::BackendError;

/// Back-office role of the logged-in user.
///
/// Serialized with the backend's role names.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum Role {
    #[serde(rename = "admin")]
    #[strum(serialize = "admin")]
    Admin,
    /// Sales staff; the role assumed when none is known.
    #[default]
    #[serde(rename = "comercial")]
    #[strum(serialize = "comercial")]
    Sales,
    #[serde(rename = "contabilidad")]
    #[strum(serialize = "contabilidad")]
    Accounting,
    #[serde(rename = "backoffice")]
    #[strum(serialize = "backoffice")]
    BackOffice,
}

/// Dashboard areas guarded by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Module {
    Dashboard,
    /// Clients, supply points, contracts and onboarding
    #[strum(serialize = "CRM")]
    Crm,
    /// Switching requests and renewals
    Energy,
    Billing,
    Assistant,
    /// User administration
    Governance,
}

impl Role {
    /// Whether this role may use `module`.
    #[must_use]
    pub fn permits(self, module: Module) -> bool {
        use Module::*;
        match self {
            Role::Admin => true,
            Role::Sales => matches!(module, Dashboard | Crm | Energy | Assistant),
            Role::Accounting => matches!(module, Dashboard | Billing),
            Role::BackOffice => matches!(module, Dashboard | Crm | Energy | Billing | Assistant),
        }
    }
}

/// Credentials and role presented with every backend call.
///
/// Passed explicitly to whatever needs it; never read from ambient state.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    token: Option<String>,
    role: Role,
    email: Option<String>,
}

impl SessionContext {
    #[must_use]
    pub fn new(token: impl Into<String>, role: Role) -> Self {
        Self {
            token: Some(token.into()),
            role,
            email: None,
        }
    }

    /// Session without a token. Calls will be refused by a protected backend.
    #[must_use]
    pub fn anonymous(role: Role) -> Self {
        Self {
            token: None,
            role,
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Session described by the resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Misconfiguration` for an unknown role name.
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let role = match config.backend.role.as_deref() {
            Some(name) => Role::from_str(name.trim()).map_err(|_| {
                BackendError::Misconfiguration(format!(
                    "unknown role '{name}' (expected admin, comercial, contabilidad or backoffice)"
                ))
            })?,
            None => Role::default(),
        };
        Ok(Self {
            token: config.token().map(str::to_string),
            role,
            email: None,
        })
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn can_access(&self, module: Module) -> bool {
        self.role.permits(module)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("role", &self.role)
            .field("email", &self.email)
            .finish()
    }
}

/// Body of a successful `POST /login`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl LoginResponse {
    /// Unknown or missing roles fall back to the default role.
    pub(crate) fn into_session(self, email: &str) -> SessionContext {
        let role = self
            .role
            .as_deref()
            .and_then(|r| Role::from_str(r).ok())
            .unwrap_or_default();
        SessionContext::new(self.access_token, role)
            .with_email(self.email.unwrap_or_else(|| email.to_string()))
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_admin_sees_everything() {
        for module in Module::iter() {
            assert!(Role::Admin.permits(module), "admin denied {module}");
        }
    }

    #[test]
    fn test_permission_matrix() {
        assert!(Role::Sales.permits(Module::Crm));
        assert!(!Role::Sales.permits(Module::Billing));
        assert!(Role::Accounting.permits(Module::Billing));
        assert!(!Role::Accounting.permits(Module::Crm));
        assert!(Role::BackOffice.permits(Module::Crm));
        assert!(Role::BackOffice.permits(Module::Billing));
        for role in Role::iter().filter(|r| *r != Role::Admin) {
            assert!(!role.permits(Module::Governance), "{role} reached governance");
        }
    }

    #[test]
    fn test_role_names_round_trip_backend_spelling() {
        assert_eq!(Role::from_str("comercial").unwrap(), Role::Sales);
        assert_eq!(Role::BackOffice.to_string(), "backoffice");
        let json = serde_json::to_string(&Role::Accounting).unwrap();
        assert_eq!(json, r#""contabilidad""#);
    }

    #[test]
    fn test_debug_hides_token() {
        let session = SessionContext::new("very-secret-token", Role::Admin);
        let debug = format!("{session:?}");
        assert!(!debug.contains("very-secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_config_defaults_to_sales() {
        let mut config = Config::minimal_for_testing();
        config.backend.token = Some("t".to_string());
        let session = SessionContext::from_config(&config).unwrap();
        assert_eq!(session.role(), Role::Sales);
        assert_eq!(session.token(), Some("t"));
    }

    #[test]
    fn test_from_config_rejects_unknown_role() {
        let mut config = Config::minimal_for_testing();
        config.backend.role = Some("intern".to_string());
        let err = SessionContext::from_config(&config).unwrap_err();
        assert!(matches!(err, BackendError::Misconfiguration(ref m) if m.contains("intern")));
    }

    #[test]
    fn test_login_response_without_role_uses_default() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"access_token":"abc","token_type":"bearer"}"#).unwrap();
        let session = response.into_session("ana@example.com");
        assert_eq!(session.role(), Role::Sales);
        assert_eq!(session.email(), Some("ana@example.com"));
        assert_eq!(session.token(), Some("abc"));
    }
}
