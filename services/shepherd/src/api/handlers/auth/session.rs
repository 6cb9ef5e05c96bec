//! Login, token refresh, logout, password change, and the caller summary.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::state::AuthState;
use super::storage::{
    delete_refresh_token, lookup_identity_by_email, lookup_identity_by_id, update_last_login,
    update_password,
};
use super::types::{
    ChangePasswordRequest, LoginRequest, LoginResponse, LogoutRequest, RefreshRequest,
    TokenPairResponse,
};
use super::utils::{hash_token, normalize_email};
use crate::audit::AuditEvent;
use crate::error::{AuthError, Result};
use crate::guard::{self, authorize, require_principal};
use crate::identity::{IdentityStatus, IdentitySummary};
use crate::password::{hash_password, validate_new_password, verify_password};

/// Authenticate with email, password, and an MFA code when one is enrolled.
///
/// Unknown address, deactivated account, and wrong password are
/// indistinguishable to the caller. Email verification is the login gate, not
/// status: a verified-but-pending identity signs in and receives tokens whose
/// `status` claim keeps the pending-mutation guard in force.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials, or MFA required/failed"),
        (status = 403, description = "Email address not verified")
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    let identity = lookup_identity_by_email(&pool, &email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    if identity.status == IdentityStatus::Inactive {
        return Err(AuthError::InvalidCredentials);
    }
    verify_password(&request.password, &identity.password_hash)?;

    if !identity.email_verified {
        return Err(AuthError::EmailUnverified);
    }

    if identity.mfa_enabled {
        let Some(code) = request.mfa_code.as_deref() else {
            return Err(AuthError::MfaRequired);
        };
        state.mfa().challenge(&identity, code)?;
    }

    update_last_login(&pool, identity.id).await?;
    let pair = state.tokens().issue(&pool, &identity).await?;
    info!(identity = %identity.id, "login");

    Ok(Json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        identity: identity.summary(state.cipher()),
    }))
}

/// Rotate a refresh token into a fresh pair.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPairResponse),
        (status = 401, description = "Invalid or expired refresh token")
    ),
    tag = "auth"
)]
pub async fn refresh(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let identity = state
        .tokens()
        .validate_refresh(&pool, request.refresh_token.trim())
        .await?;
    let pair = state.tokens().issue(&pool, &identity).await?;

    Ok(Json(TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// End the session by deleting the presented refresh token.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    request_body = LogoutRequest,
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Logged out; repeat calls are also 204"),
        (status = 403, description = "No authenticated caller")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse> {
    let principal = require_principal(&headers, state.tokens())?;
    authorize(&principal, &guard::LOGOUT)?;

    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    delete_refresh_token(
        &pool,
        principal.id,
        &hash_token(request.refresh_token.trim()),
    )
    .await?;

    state.audit().record(AuditEvent::for_operation(
        &guard::LOGOUT,
        &principal,
        &headers,
        Some(principal.id),
        json!({ "refreshToken": request.refresh_token }),
    ));

    Ok(StatusCode::NO_CONTENT)
}

/// Change the caller's password after re-proving the current one.
#[utoipa::path(
    patch,
    path = "/v1/auth/password/change",
    request_body = ChangePasswordRequest,
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Password replaced"),
        (status = 401, description = "Current password mismatch"),
        (status = 403, description = "No authenticated caller, or pending identity")
    ),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<impl IntoResponse> {
    let principal = require_principal(&headers, state.tokens())?;
    authorize(&principal, &guard::PASSWORD_CHANGE)?;

    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };
    validate_new_password(&request.new_password)?;

    let identity = lookup_identity_by_id(&pool, principal.id)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    verify_password(&request.current_password, &identity.password_hash)?;

    let password_hash = hash_password(&request.new_password)?;
    update_password(&pool, identity.id, &password_hash).await?;

    state.audit().record(AuditEvent::for_operation(
        &guard::PASSWORD_CHANGE,
        &principal,
        &headers,
        Some(identity.id),
        json!({
            "currentPassword": request.current_password,
            "newPassword": request.new_password,
        }),
    ));

    Ok(StatusCode::NO_CONTENT)
}

/// Return the caller's identity summary.
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller identity", body = IdentitySummary),
        (status = 403, description = "No authenticated caller"),
        (status = 404, description = "Identity no longer exists")
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse> {
    let principal = require_principal(&headers, state.tokens())?;
    authorize(&principal, &guard::READ_SELF)?;

    let identity = lookup_identity_by_id(&pool, principal.id)
        .await?
        .ok_or(AuthError::NotFound)?;

    Ok(Json(identity.summary(state.cipher())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::state::tests::auth_state;
    use super::*;
    use axum::http::HeaderValue;
    use axum::http::header::AUTHORIZATION;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .unwrap()
    }

    #[tokio::test]
    async fn login_missing_payload() {
        let result = login(Extension(lazy_pool()), Extension(auth_state()), None).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn refresh_garbage_token_rejected() {
        // Signature verification fails before any store access.
        let result = refresh(
            Extension(lazy_pool()),
            Extension(auth_state()),
            Some(Json(RefreshRequest {
                refresh_token: "not-a-jwt".to_string(),
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn logout_without_bearer_is_forbidden() {
        let result = logout(
            HeaderMap::new(),
            Extension(lazy_pool()),
            Extension(auth_state()),
            Some(Json(LogoutRequest {
                refresh_token: "whatever".to_string(),
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn change_password_pending_identity_forbidden() {
        let state = auth_state();
        let mut identity = crate::identity::tests::identity();
        identity.status = IdentityStatus::Pending;
        let token = state.tokens().access_token_for_tests(&identity);

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let result = change_password(
            headers,
            Extension(lazy_pool()),
            Extension(state),
            Some(Json(ChangePasswordRequest {
                current_password: "Secret123".to_string(),
                new_password: "Secret456".to_string(),
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn change_password_weak_replacement_rejected() {
        let state = auth_state();
        let identity = crate::identity::tests::identity();
        let token = state.tokens().access_token_for_tests(&identity);

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let result = change_password(
            headers,
            Extension(lazy_pool()),
            Extension(state),
            Some(Json(ChangePasswordRequest {
                current_password: "Secret123".to_string(),
                new_password: "weak".to_string(),
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn me_without_bearer_is_forbidden() {
        let result = me(
            HeaderMap::new(),
            Extension(lazy_pool()),
            Extension(auth_state()),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }
}
