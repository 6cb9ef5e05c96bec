//! Multi-factor enrollment endpoints.
//!
//! Setup stores a fresh secret unconfirmed; verify proves one code against it
//! and only then flips `mfa_enabled`. Until that proof, login is unaffected.

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
use super::storage::{enable_mfa, lookup_identity_by_id, store_mfa_secret};
use super::types::{MfaSetupResponse, MfaVerifyRequest};
use crate::audit::AuditEvent;
use crate::error::{AuthError, Result};
use crate::guard::{self, authorize, require_principal};

/// Start enrollment: generate a secret and return it with the provisioning
/// URI and QR image. The secret appears in this response only.
#[utoipa::path(
    post,
    path = "/v1/auth/mfa/setup",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Unconfirmed secret generated", body = MfaSetupResponse),
        (status = 400, description = "MFA already enabled"),
        (status = 403, description = "No authenticated caller, or pending identity")
    ),
    tag = "auth"
)]
pub async fn mfa_setup(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse> {
    let principal = require_principal(&headers, state.tokens())?;
    authorize(&principal, &guard::MFA_SETUP)?;

    let identity = lookup_identity_by_id(&pool, principal.id)
        .await?
        .ok_or(AuthError::NotFound)?;

    let enrollment = state.mfa().begin_enrollment(&identity)?;
    store_mfa_secret(&pool, identity.id, &enrollment.secret).await?;

    state.audit().record(AuditEvent::for_operation(
        &guard::MFA_SETUP,
        &principal,
        &headers,
        Some(identity.id),
        json!({}),
    ));

    Ok(Json(MfaSetupResponse {
        secret: enrollment.secret,
        provisioning_uri: enrollment.provisioning_uri,
        qr_png_base64: enrollment.qr_png_base64,
    }))
}

/// Prove one code against the stored secret and enable MFA.
#[utoipa::path(
    post,
    path = "/v1/auth/mfa/verify",
    request_body = MfaVerifyRequest,
    security(("bearer" = [])),
    responses(
        (status = 204, description = "MFA enabled"),
        (status = 400, description = "Enrollment not started, or already enabled"),
        (status = 401, description = "Code mismatch; the secret stays for retry"),
        (status = 403, description = "No authenticated caller, or pending identity")
    ),
    tag = "auth"
)]
pub async fn mfa_verify(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<MfaVerifyRequest>>,
) -> Result<impl IntoResponse> {
    let principal = require_principal(&headers, state.tokens())?;
    authorize(&principal, &guard::MFA_CONFIRM)?;

    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let identity = lookup_identity_by_id(&pool, principal.id)
        .await?
        .ok_or(AuthError::NotFound)?;
    if identity.mfa_enabled {
        return Err(AuthError::AlreadyEnabled);
    }

    state.mfa().confirm_code(&identity, &request.code)?;
    enable_mfa(&pool, identity.id).await?;
    info!(identity = %identity.id, "MFA enabled");

    state.audit().record(AuditEvent::for_operation(
        &guard::MFA_CONFIRM,
        &principal,
        &headers,
        Some(identity.id),
        json!({}),
    ));

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::state::tests::auth_state;
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .unwrap()
    }

    #[tokio::test]
    async fn setup_without_bearer_is_forbidden() {
        let result = mfa_setup(
            HeaderMap::new(),
            Extension(lazy_pool()),
            Extension(auth_state()),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn verify_without_bearer_is_forbidden() {
        let result = mfa_verify(
            HeaderMap::new(),
            Extension(lazy_pool()),
            Extension(auth_state()),
            Some(Json(MfaVerifyRequest {
                code: "123456".to_string(),
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }
}
