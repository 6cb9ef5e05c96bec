//! Authorization for protected operations.
//!
//! Each protected operation is declared once in a capability table: the roles
//! allowed to call it, whether it mutates state, and whether a pending
//! identity may still perform it. Handlers resolve the caller from the bearer
//! access token and check the declaration up front, before any business
//! logic.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use uuid::Uuid;

use crate::{
    error::{AuthError, Result},
    identity::{IdentityStatus, Role},
    tokens::TokenIssuer,
};

/// Authenticated caller context derived from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub status: IdentityStatus,
}

/// Capability declaration for one protected operation.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    /// Stable action label, also used for audit entries.
    pub name: &'static str,
    /// Resource the operation touches, for audit grouping.
    pub resource: &'static str,
    pub roles: &'static [Role],
    pub mutation: bool,
    /// Whether a `PENDING` identity may perform this mutation. Defaults to
    /// false everywhere except operations a pending identity genuinely needs.
    pub pending_allowed: bool,
}

const ANY_ROLE: &[Role] = &Role::ALL;
const ADMIN_ROLES: &[Role] = &[Role::SuperAdmin, Role::Admin];

pub const MFA_SETUP: Operation = Operation {
    name: "POST /v1/auth/mfa/setup",
    resource: "auth",
    roles: ANY_ROLE,
    mutation: true,
    pending_allowed: false,
};

pub const MFA_CONFIRM: Operation = Operation {
    name: "POST /v1/auth/mfa/verify",
    resource: "auth",
    roles: ANY_ROLE,
    mutation: true,
    pending_allowed: false,
};

pub const PASSWORD_CHANGE: Operation = Operation {
    name: "PATCH /v1/auth/password/change",
    resource: "auth",
    roles: ANY_ROLE,
    mutation: true,
    pending_allowed: false,
};

// A pending identity holds tokens and must be able to end its own session.
pub const LOGOUT: Operation = Operation {
    name: "POST /v1/auth/logout",
    resource: "auth",
    roles: ANY_ROLE,
    mutation: true,
    pending_allowed: true,
};

pub const READ_SELF: Operation = Operation {
    name: "GET /v1/auth/me",
    resource: "auth",
    roles: ANY_ROLE,
    mutation: false,
    pending_allowed: false,
};

pub const IDENTITY_CREATE: Operation = Operation {
    name: "POST /v1/users",
    resource: "users",
    roles: ADMIN_ROLES,
    mutation: true,
    pending_allowed: false,
};

pub const IDENTITY_APPROVE: Operation = Operation {
    name: "PATCH /v1/users/:id/approve",
    resource: "users",
    roles: ADMIN_ROLES,
    mutation: true,
    pending_allowed: false,
};

/// Resolve the caller from the `Authorization` header.
///
/// # Errors
/// A request with no bearer token at all is rejected with `Forbidden`; a
/// token that fails verification yields `InvalidToken`.
pub fn require_principal(headers: &HeaderMap, tokens: &TokenIssuer) -> Result<AuthPrincipal> {
    let Some(token) = bearer_token(headers) else {
        return Err(AuthError::Forbidden);
    };

    let claims = tokens.decode_access(&token)?;
    Ok(AuthPrincipal {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        status: claims.status,
    })
}

/// Check the caller against an operation's capability declaration.
///
/// # Errors
/// `Forbidden` when the caller's role is not in the allow-list, or when a
/// pending identity attempts a mutation the operation does not allow.
pub fn authorize(principal: &AuthPrincipal, operation: &Operation) -> Result<()> {
    if !operation.roles.contains(&principal.role) {
        return Err(AuthError::Forbidden);
    }

    if principal.status == IdentityStatus::Pending
        && operation.mutation
        && !operation.pending_allowed
    {
        return Err(AuthError::Forbidden);
    }

    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
