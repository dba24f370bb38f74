//! Role checks for issue and analytics operations

use crate::error::{ApiError, ApiResult};
use civic_common::{Caller, Role};

/// Why a caller was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    Forbidden,
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert a denial into the matching API error
    pub fn into_result(self, operation: &str) -> ApiResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(DenyReason::Unauthenticated) => Err(ApiError::Unauthenticated(
                format!("{} requires a bearer token", operation),
            )),
            Decision::Deny(DenyReason::Forbidden) => Err(ApiError::Forbidden(format!(
                "{} requires the admin role",
                operation
            ))),
        }
    }
}

/// Evaluate a caller against the role an operation requires
///
/// Identity is checked before role. Admin satisfies every requirement.
pub fn authorize(caller: Option<&Caller>, required: Role) -> Decision {
    let Some(caller) = caller else {
        return Decision::Deny(DenyReason::Unauthenticated);
    };

    match required {
        Role::Citizen => Decision::Allow,
        Role::Admin if caller.is_admin() => Decision::Allow,
        Role::Admin => Decision::Deny(DenyReason::Forbidden),
    }
}

/// Authorize and return the caller, for handlers that need its identity
pub fn require<'a>(caller: Option<&'a Caller>, required: Role, operation: &str) -> ApiResult<&'a Caller> {
    authorize(caller, required).into_result(operation)?;
    caller.ok_or_else(|| ApiError::Unauthenticated(format!("{} requires a bearer token", operation)))
}
