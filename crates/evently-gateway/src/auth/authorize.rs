//! Role and ownership authorization.
//!
//! Role checks are strict equality against the identity's stored role. There
//! is no hierarchy: an owner does not implicitly pass an organizer check.

use evently_core::UserId;

use super::middleware::AuthContext;
use super::users::Role;
use super::AuthError;

/// What an action requires of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Caller must hold exactly this role.
    Role(Role),
    /// Caller must hold one of these roles.
    AnyOf(Vec<Role>),
    /// Caller must hold the role and be the owner of the resource.
    Owner {
        /// Required role.
        role: Role,
        /// Identity that owns the resource.
        owner_id: UserId,
    },
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Proceed.
    Permitted,
    /// Reject with 403 and this reason.
    Denied(String),
}

impl Decision {
    /// Whether the check passed.
    #[must_use]
    pub const fn is_permitted(&self) -> bool {
        matches!(self, Self::Permitted)
    }

    /// Convert to a result.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PermissionDenied` when denied.
    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Self::Permitted => Ok(()),
            Self::Denied(reason) => Err(AuthError::PermissionDenied(reason)),
        }
    }
}

/// Check that the authenticated identity holds exactly `role`.
#[must_use]
pub fn require_role(ctx: &AuthContext, role: Role) -> Decision {
    if ctx.user.role == role {
        Decision::Permitted
    } else {
        tracing::debug!(user = %ctx.user_id, have = %ctx.user.role, need = %role, "Role check failed");
        Decision::Denied(format!("requires {role} role"))
    }
}

/// Evaluate a requirement against the authenticated identity.
#[must_use]
pub fn check(ctx: &AuthContext, requirement: &Requirement) -> Decision {
    match requirement {
        Requirement::Role(role) => require_role(ctx, *role),
        Requirement::AnyOf(roles) => {
            if roles.contains(&ctx.user.role) {
                Decision::Permitted
            } else {
                Decision::Denied("insufficient role".to_string())
            }
        }
        Requirement::Owner { role, owner_id } => match require_role(ctx, *role) {
            Decision::Permitted if &ctx.user_id == owner_id => Decision::Permitted,
            Decision::Permitted => {
                tracing::debug!(user = %ctx.user_id, owner = %owner_id, "Ownership check failed");
                Decision::Denied("not the owner of this resource".to_string())
            }
            denied => denied,
        },
    }
}

/// Authorize the caller, converting a denial into a 403 error.
///
/// Takes `Option` so a handler that forgot to mount authentication fails
/// loudly with a 500 instead of silently passing.
///
/// # Errors
///
/// Returns `AuthError::MissingContext` if there is no authenticated context,
/// or `AuthError::PermissionDenied` if the requirement is not met.
pub fn authorize(ctx: Option<&AuthContext>, requirement: &Requirement) -> Result<(), AuthError> {
    let Some(ctx) = ctx else {
        tracing::error!("Authorization attempted without an authentication context");
        return Err(AuthError::MissingContext);
    };

    check(ctx, requirement).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;

    fn context(role: Role) -> AuthContext {
        let user = User::with_hash("a@b.com", "hash".to_string(), "1234567890", role);
        AuthContext::new(user.to_public())
    }

    #[test]
    fn test_role_equality() {
        let ctx = context(Role::Organizer);
        assert!(require_role(&ctx, Role::Organizer).is_permitted());
        assert!(!require_role(&ctx, Role::Standard).is_permitted());
    }

    #[test]
    fn test_no_role_hierarchy() {
        let ctx = context(Role::Owner);
        assert_eq!(
            require_role(&ctx, Role::Organizer),
            Decision::Denied("requires organizer role".to_string())
        );
    }

    #[test]
    fn test_any_of() {
        let ctx = context(Role::Standard);
        let allowed = Requirement::AnyOf(vec![Role::Owner, Role::Standard]);
        assert!(check(&ctx, &allowed).is_permitted());
        let denied = Requirement::AnyOf(vec![Role::Owner, Role::Organizer]);
        assert!(!check(&ctx, &denied).is_permitted());
    }

    #[test]
    fn test_ownership() {
        let ctx = context(Role::Organizer);
        let own = Requirement::Owner {
            role: Role::Organizer,
            owner_id: ctx.user_id.clone(),
        };
        assert!(check(&ctx, &own).is_permitted());

        let other = Requirement::Owner {
            role: Role::Organizer,
            owner_id: UserId::generate(),
        };
        assert!(matches!(
            authorize(Some(&ctx), &other),
            Err(AuthError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_ownership_still_requires_role() {
        let ctx = context(Role::Standard);
        let own = Requirement::Owner {
            role: Role::Organizer,
            owner_id: ctx.user_id.clone(),
        };
        assert!(!check(&ctx, &own).is_permitted());
    }

    #[test]
    fn test_missing_context_fails_loudly() {
        let result = authorize(None, &Requirement::Role(Role::Standard));
        assert!(matches!(result, Err(AuthError::MissingContext)));
        assert!(result.unwrap_err().is_internal());
    }
}
