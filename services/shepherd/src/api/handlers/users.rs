//! Administrative identity management.

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::auth::AuthState;
use super::auth::registration::encrypt_phone;
use super::auth::storage::{ApproveOutcome, SignupOutcome, approve_identity, insert_preverified};
use super::auth::types::CreateIdentityRequest;
use super::auth::utils::{normalize_email, valid_email};
use crate::audit::AuditEvent;
use crate::error::{AuthError, Result};
use crate::guard::{self, authorize, require_principal};
use crate::identity::{IdentityStatus, IdentitySummary};
use crate::password::{hash_password, validate_new_password};

/// Create an identity directly. Administrator-created accounts arrive with
/// the email already verified; the status comes from the payload and
/// defaults to `ACTIVE`.
#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateIdentityRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Identity created", body = IdentitySummary),
        (status = 403, description = "Caller is not an administrator"),
        (status = 409, description = "Email already registered")
    ),
    tag = "users"
)]
pub async fn create_identity(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreateIdentityRequest>>,
) -> Result<impl IntoResponse> {
    let principal = require_principal(&headers, state.tokens())?;
    authorize(&principal, &guard::IDENTITY_CREATE)?;

    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::Validation("Invalid email address".to_string()));
    }
    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(AuthError::Validation(
            "First and last name are required".to_string(),
        ));
    }
    validate_new_password(&request.password)?;

    let password_hash = hash_password(&request.password)?;
    let phone_envelope = encrypt_phone(&state, request.phone.as_deref())?;
    let status = request.status.unwrap_or(IdentityStatus::Active);

    let outcome = insert_preverified(
        &pool,
        &email,
        &password_hash,
        first_name,
        last_name,
        phone_envelope.as_deref(),
        request.role,
        status,
    )
    .await?;

    match outcome {
        SignupOutcome::Conflict => Err(AuthError::DuplicateIdentity),
        SignupOutcome::Created(id) => {
            info!(identity = %id, actor = %principal.id, "identity created by administrator");
            state.audit().record(AuditEvent::for_operation(
                &guard::IDENTITY_CREATE,
                &principal,
                &headers,
                Some(id),
                json!({
                    "email": email,
                    "role": request.role,
                    "status": status,
                    "password": request.password,
                }),
            ));

            let phone = request
                .phone
                .as_deref()
                .map(str::trim)
                .filter(|phone| !phone.is_empty())
                .map(str::to_string);
            Ok((
                StatusCode::CREATED,
                Json(IdentitySummary {
                    id,
                    email,
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                    phone,
                    role: request.role,
                    status,
                    email_verified: true,
                    mfa_enabled: false,
                    last_login: None,
                }),
            ))
        }
    }
}

/// Approve a pending identity, moving it to `ACTIVE`.
///
/// Approval requires a verified email address and is not reversible here;
/// deactivation is a separate administrative concern.
#[utoipa::path(
    patch,
    path = "/v1/users/{id}/approve",
    params(("id" = Uuid, Path, description = "Identity to approve")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Identity activated", body = IdentitySummary),
        (status = 400, description = "Not pending, or email unverified"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Unknown identity")
    ),
    tag = "users"
)]
pub async fn approve(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse> {
    let principal = require_principal(&headers, state.tokens())?;
    authorize(&principal, &guard::IDENTITY_APPROVE)?;

    match approve_identity(&pool, id).await? {
        ApproveOutcome::NotFound => Err(AuthError::NotFound),
        ApproveOutcome::NotPending => Err(AuthError::NotPending),
        ApproveOutcome::EmailUnverified => Err(AuthError::EmailUnverified),
        ApproveOutcome::Approved(identity) => {
            info!(identity = %identity.id, actor = %principal.id, "identity approved");
            state.notifier().send_account_approved(
                &identity.email,
                &identity.first_name,
                state.config().frontend_base_url(),
            );
            state.audit().record(AuditEvent::for_operation(
                &guard::IDENTITY_APPROVE,
                &principal,
                &headers,
                Some(identity.id),
                json!({ "email": identity.email }),
            ));

            Ok(Json(identity.summary(state.cipher())))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::auth::state::tests::auth_state;
    use super::*;
    use crate::identity::Role;
    use axum::http::HeaderValue;
    use axum::http::header::AUTHORIZATION;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .unwrap()
    }

    fn bearer_headers(state: &AuthState, role: Role) -> HeaderMap {
        let mut identity = crate::identity::tests::identity();
        identity.role = role;
        let token = state.tokens().access_token_for_tests(&identity);
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn create_without_bearer_is_forbidden() {
        let result = create_identity(
            HeaderMap::new(),
            Extension(lazy_pool()),
            Extension(auth_state()),
            None,
        )
        .await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn create_requires_admin_role() {
        let state = auth_state();
        let headers = bearer_headers(&state, Role::Volunteer);
        let result = create_identity(
            headers,
            Extension(lazy_pool()),
            Extension(state),
            Some(Json(CreateIdentityRequest {
                email: "bob@example.com".to_string(),
                password: "Secret123".to_string(),
                first_name: "Bob".to_string(),
                last_name: "Jones".to_string(),
                phone: None,
                role: Role::Volunteer,
                status: None,
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn create_rejects_invalid_email() {
        let state = auth_state();
        let headers = bearer_headers(&state, Role::Admin);
        let result = create_identity(
            headers,
            Extension(lazy_pool()),
            Extension(state),
            Some(Json(CreateIdentityRequest {
                email: "not-an-email".to_string(),
                password: "Secret123".to_string(),
                first_name: "Bob".to_string(),
                last_name: "Jones".to_string(),
                phone: None,
                role: Role::Volunteer,
                status: None,
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn approve_requires_admin_role() {
        let state = auth_state();
        let headers = bearer_headers(&state, Role::MinistryLeader);
        let result = approve(
            headers,
            Path(Uuid::new_v4()),
            Extension(lazy_pool()),
            Extension(state),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }
}
