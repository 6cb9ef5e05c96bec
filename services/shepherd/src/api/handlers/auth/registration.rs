//! Self-registration and email verification.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::state::AuthState;
use super::storage::{SignupOutcome, VerifyOutcome, consume_verification_token, insert_registration};
use super::types::{RegisterRequest, RegisterResponse, VerifyEmailRequest};
use super::utils::{
    build_verify_url, generate_single_use_token, hash_token, normalize_email, valid_email,
};
use crate::error::{AuthError, Result};
use crate::password::{hash_password, validate_new_password};

const REGISTER_ACK: &str = "Registration received. Check your email to verify your address.";

/// Create a pending identity and send the verification link.
///
/// The response carries the new id and a generic acknowledgment; the raw
/// verification token only ever travels in the email.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Pending identity created", body = RegisterResponse),
        (status = 400, description = "Malformed input"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse> {
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

    let token = generate_single_use_token()?;
    let outcome = insert_registration(
        &pool,
        &email,
        &password_hash,
        first_name,
        last_name,
        phone_envelope.as_deref(),
        &hash_token(&token),
        state.config().verification_token_ttl_seconds(),
    )
    .await?;

    match outcome {
        SignupOutcome::Conflict => Err(AuthError::DuplicateIdentity),
        SignupOutcome::Created(id) => {
            let verify_url = build_verify_url(state.config().frontend_base_url(), &token);
            state
                .notifier()
                .send_verification(&email, first_name, &verify_url);
            state
                .notifier()
                .send_registration_alert(state.config().admin_email(), &email);
            info!(identity = %id, "new registration");

            Ok((
                StatusCode::CREATED,
                Json(RegisterResponse {
                    id,
                    message: REGISTER_ACK.to_string(),
                }),
            ))
        }
    }
}

/// Consume the emailed verification token.
///
/// Verification is single-use: the token is cleared by the consuming update,
/// so presenting it a second time fails. Status is not changed here; approval
/// is a separate administrative step.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 204, description = "Email verified"),
        (status = 400, description = "Address already verified"),
        (status = 401, description = "Invalid or expired token")
    ),
    tag = "auth"
)]
pub async fn verify_email(
    pool: Extension<PgPool>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> Result<impl IntoResponse> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let token = request.token.trim();
    if token.is_empty() {
        return Err(AuthError::Validation("Missing token".to_string()));
    }

    match consume_verification_token(&pool, &hash_token(token)).await? {
        VerifyOutcome::Verified => Ok(StatusCode::NO_CONTENT),
        VerifyOutcome::AlreadyVerified => Err(AuthError::AlreadyVerified),
        VerifyOutcome::Invalid => Err(AuthError::InvalidToken),
    }
}

pub(crate) fn encrypt_phone(state: &AuthState, phone: Option<&str>) -> Result<Option<String>> {
    let Some(phone) = phone.map(str::trim).filter(|phone| !phone.is_empty()) else {
        return Ok(None);
    };
    state
        .cipher()
        .encrypt(phone)
        .map(Some)
        .map_err(|_| AuthError::Internal("failed to encrypt phone number".to_string()))
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
    async fn register_missing_payload() {
        let result = register(Extension(lazy_pool()), Extension(auth_state()), None).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn register_invalid_email() {
        let result = register(
            Extension(lazy_pool()),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                email: "not-an-email".to_string(),
                password: "Secret123".to_string(),
                first_name: "Alice".to_string(),
                last_name: "Smith".to_string(),
                phone: None,
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn register_weak_password() {
        let result = register(
            Extension(lazy_pool()),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                email: "alice@example.com".to_string(),
                password: "weak".to_string(),
                first_name: "Alice".to_string(),
                last_name: "Smith".to_string(),
                phone: None,
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn register_blank_name() {
        let result = register(
            Extension(lazy_pool()),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                email: "alice@example.com".to_string(),
                password: "Secret123".to_string(),
                first_name: "  ".to_string(),
                last_name: "Smith".to_string(),
                phone: None,
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn verify_email_missing_token() {
        let result = verify_email(
            Extension(lazy_pool()),
            Some(Json(VerifyEmailRequest {
                token: " ".to_string(),
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[test]
    fn phone_encryption_skips_blank_values() {
        let state = auth_state();
        assert_eq!(encrypt_phone(&state, None).unwrap(), None);
        assert_eq!(encrypt_phone(&state, Some("  ")).unwrap(), None);

        let envelope = encrypt_phone(&state, Some("+1 555 0100")).unwrap().unwrap();
        assert_eq!(state.cipher().decrypt(&envelope).unwrap(), "+1 555 0100");
    }
}
