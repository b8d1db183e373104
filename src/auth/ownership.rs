use crate::auth::session::Identity;
use crate::errors::AppError;

/// Creator-only mutation: the resource's `user_id` must be the caller.
pub fn ensure_owner(owner_id: i64, identity: &Identity, resource: &str) -> Result<(), AppError> {
    if owner_id == identity.user_id {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!("only the creator may modify this {resource}")))
    }
}

/// Delegated ownership: the parent resource's creator, or any admin.
pub fn ensure_owner_or_admin(owner_id: i64, identity: &Identity, resource: &str) -> Result<(), AppError> {
    if identity.is_admin() {
        return Ok(());
    }
    ensure_owner(owner_id, identity, resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    fn who(user_id: i64, role: Role) -> Identity {
        Identity { user_id, role }
    }

    #[test]
    fn owner_passes_and_others_are_forbidden() {
        assert!(ensure_owner(7, &who(7, Role::Pengurus), "agenda").is_ok());
        let err = ensure_owner(7, &who(8, Role::Pengurus), "agenda").unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[test]
    fn admin_is_not_an_owner_for_creator_only_checks() {
        assert!(ensure_owner(7, &who(1, Role::Admin), "agenda").is_err());
        assert!(ensure_owner_or_admin(7, &who(1, Role::Admin), "form").is_ok());
        assert!(ensure_owner_or_admin(7, &who(2, Role::Anggota), "form").is_err());
    }
}
