//! Authorization guards
//!
//! Each guard either passes its input through or fails with
//! [`ApplicationError::Forbidden`]. Lookups happen before guards run, so a
//! resource that does not exist is reported as not found while one owned by
//! another company is always forbidden.

use super::identity::{Role, TokenPurpose};
use crate::{ApplicationError, ApplicationResult};
use tracing::warn;

/// Anything carrying role claims
pub trait RoleBearer {
    /// `None` when the principal carries no role information at all
    fn roles(&self) -> Option<Vec<Role>>;

    /// Identifier used in log lines
    fn principal(&self) -> &str;
}

/// Anything owned by, or acting on behalf of, a company
pub trait TenantScoped {
    fn tenant_id(&self) -> &str;
}

/// Pass `bearer` through if one of its roles is in `allowed`
pub fn require_role<B: RoleBearer>(bearer: B, allowed: &[Role]) -> ApplicationResult<B> {
    let Some(roles) = bearer.roles() else {
        warn!(principal = bearer.principal(), "Role check without role claims");
        return Err(ApplicationError::forbidden(
            "Invalid or missing 'roles' in token",
        ));
    };

    if roles.iter().any(|role| allowed.contains(role)) {
        Ok(bearer)
    } else {
        warn!(
            principal = bearer.principal(),
            ?roles,
            ?allowed,
            "Insufficient role"
        );
        Err(ApplicationError::forbidden("Insufficient permissions"))
    }
}

/// Fail unless `caller` and `resource` belong to the same company
pub fn require_same_tenant<C, R>(caller: &C, resource: &R) -> ApplicationResult<()>
where
    C: TenantScoped + ?Sized,
    R: TenantScoped + ?Sized,
{
    if caller.tenant_id() == resource.tenant_id() {
        Ok(())
    } else {
        warn!(
            caller_tenant = caller.tenant_id(),
            resource_tenant = resource.tenant_id(),
            "Cross-tenant access denied"
        );
        Err(ApplicationError::forbidden(
            "Unauthorized access to company data",
        ))
    }
}

/// Fail unless a token was issued for the operation consuming it
pub fn require_purpose(actual: TokenPurpose, expected: TokenPurpose) -> ApplicationResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(ApplicationError::forbidden(format!(
            "Token purpose '{}' cannot be used here; expected '{}'",
            actual, expected
        )))
    }
}

impl TenantScoped for str {
    fn tenant_id(&self) -> &str {
        self
    }
}

impl TenantScoped for String {
    fn tenant_id(&self) -> &str {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TokenRoles(Option<Vec<&'static str>>);

    impl RoleBearer for TokenRoles {
        fn roles(&self) -> Option<Vec<Role>> {
            self.0
                .as_ref()
                .map(|roles| roles.iter().filter_map(|r| r.parse().ok()).collect())
        }

        fn principal(&self) -> &str {
            "auth0|test"
        }
    }

    struct Job {
        company: &'static str,
    }

    impl TenantScoped for Job {
        fn tenant_id(&self) -> &str {
            self.company
        }
    }

    #[test]
    fn test_require_role_intersection() {
        let claims = TokenRoles(Some(vec!["interviewer", "recruiter"]));
        assert!(require_role(claims, &[Role::Recruiter, Role::Admin]).is_ok());

        let claims = TokenRoles(Some(vec!["interviewer"]));
        let err = require_role(claims, &[Role::Admin]).unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden { ref message } if message == "Insufficient permissions"));
    }

    #[test]
    fn test_require_role_missing_claims() {
        let err = require_role(TokenRoles(None), &[Role::Admin]).unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden { ref message } if message.contains("'roles'")));

        // unknown role names never match
        let err = require_role(TokenRoles(Some(vec!["owner"])), &[Role::Admin]).unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden { .. }));
    }

    #[test]
    fn test_require_same_tenant() {
        let job = Job { company: "company-a" };
        assert!(require_same_tenant("company-a", &job).is_ok());

        let err = require_same_tenant("company-b", &job).unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden { .. }));
    }

    #[test]
    fn test_require_purpose() {
        assert!(require_purpose(TokenPurpose::Access, TokenPurpose::Access).is_ok());

        let err = require_purpose(TokenPurpose::Refresh, TokenPurpose::Access).unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden { ref message } if message.contains("refresh")));

        assert!(require_purpose(TokenPurpose::Onboarding, TokenPurpose::Refresh).is_err());
    }
}
