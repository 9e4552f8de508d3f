/// Role and ownership checks
///
/// Roles are carried in the JWT, so these checks are pure functions over
/// [`AuthContext`]. Admins pass every ownership check.
///
/// # Example
///
/// ```
/// use vetconnect_shared::auth::authorization::{require_owner_or_admin, require_role};
/// use vetconnect_shared::auth::jwt::Claims;
/// use vetconnect_shared::auth::middleware::AuthContext;
/// use vetconnect_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let claims = Claims::new(Uuid::new_v4(), "owner@example.com".into(), UserRole::User);
/// let auth = AuthContext::from_claims(&claims, String::new());
///
/// assert!(require_role(&auth, UserRole::Admin).is_err());
/// assert!(require_owner_or_admin(&auth, claims.sub).is_ok());
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::UserRole;

/// Authorization errors
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Access denied. Requires {required} role.")]
    InsufficientRole { required: UserRole, actual: UserRole },

    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// Requires the caller to hold `required`
///
/// Admins satisfy any role requirement.
pub fn require_role(auth: &AuthContext, required: UserRole) -> Result<(), AuthzError> {
    if auth.role.has_permission(required) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole {
            required,
            actual: auth.role,
        })
    }
}

/// Requires the caller to own the resource or be an admin
pub fn require_owner_or_admin(auth: &AuthContext, owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id == owner_id || auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::Claims;

    fn context(role: UserRole) -> AuthContext {
        let claims = Claims::new(Uuid::new_v4(), "someone@example.com".into(), role);
        AuthContext::from_claims(&claims, "hash".into())
    }

    #[test]
    fn test_require_role() {
        let user = context(UserRole::User);
        let admin = context(UserRole::Admin);

        assert!(require_role(&user, UserRole::User).is_ok());
        assert!(require_role(&admin, UserRole::User).is_ok());
        assert!(require_role(&admin, UserRole::Admin).is_ok());

        let err = require_role(&user, UserRole::Admin).unwrap_err();
        assert_eq!(err.to_string(), "Access denied. Requires admin role.");
    }

    #[test]
    fn test_require_owner_or_admin() {
        let owner = context(UserRole::User);
        let stranger = context(UserRole::User);
        let admin = context(UserRole::Admin);

        assert!(require_owner_or_admin(&owner, owner.user_id).is_ok());
        assert!(require_owner_or_admin(&admin, owner.user_id).is_ok());
        assert!(matches!(
            require_owner_or_admin(&stranger, owner.user_id),
            Err(AuthzError::NotAuthorized)
        ));
    }
}
