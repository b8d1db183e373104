use actix_session::Session;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::user::Role;

/// The authenticated caller, resolved from the session and passed explicitly
/// into every model operation that needs to know who is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Officers and admins may create agendas and recruitment forms.
    pub fn is_officer(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Pengurus)
    }
}

pub fn get_user_id(session: &Session) -> Option<i64> {
    session.get::<i64>("user_id").unwrap_or(None)
}

pub fn get_identity(session: &Session) -> Option<Identity> {
    let user_id = get_user_id(session)?;
    let role = session
        .get::<String>("role")
        .unwrap_or(None)
        .and_then(|r| r.parse::<Role>().ok())?;
    Some(Identity { user_id, role })
}

/// Resolve the caller; 401 when the session carries no identity.
pub fn require_identity(session: &Session) -> Result<Identity, AppError> {
    get_identity(session).ok_or(AppError::Unauthenticated)
}

/// Resolve the caller and require an officer-level role.
pub fn require_officer(session: &Session) -> Result<Identity, AppError> {
    let identity = require_identity(session)?;
    if identity.is_officer() {
        Ok(identity)
    } else {
        Err(AppError::PermissionDenied("officer role required".to_string()))
    }
}

pub fn require_admin(session: &Session) -> Result<Identity, AppError> {
    let identity = require_identity(session)?;
    if identity.is_admin() {
        Ok(identity)
    } else {
        Err(AppError::PermissionDenied("admin role required".to_string()))
    }
}

pub fn sign_in(session: &Session, user_id: i64, username: &str, role: Role) -> Result<(), AppError> {
    session.renew();
    session.insert("user_id", user_id)?;
    session.insert("username", username)?;
    session.insert("role", role.as_str())?;
    Ok(())
}
