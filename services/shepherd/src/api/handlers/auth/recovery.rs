//! Password recovery: forgot-password and reset.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::state::AuthState;
use super::storage::{consume_password_reset, set_password_reset};
use super::types::{ForgotPasswordRequest, GenericAck, ResetPasswordRequest};
use super::utils::{
    build_reset_url, generate_single_use_token, hash_token, normalize_email, valid_email,
};
use crate::error::{AuthError, Result};
use crate::password::{hash_password, validate_new_password};

/// Sent for every forgot-password request, hit or miss.
const RESET_ACK: &str = "If an account exists for this address, a password reset link has been sent.";

/// Request a password reset link.
///
/// The acknowledgment is identical whether or not the address is known; the
/// difference must not be observable, so even a store failure on the hit path
/// is only logged.
#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 202, description = "Acknowledged", body = GenericAck)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Result<impl IntoResponse> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if valid_email(&email) {
        let token = generate_single_use_token()?;
        match set_password_reset(
            &pool,
            &email,
            &hash_token(&token),
            state.config().reset_token_ttl_seconds(),
        )
        .await
        {
            Ok(Some(first_name)) => {
                let reset_url = build_reset_url(state.config().frontend_base_url(), &token);
                state
                    .notifier()
                    .send_password_reset(&email, &first_name, &reset_url);
            }
            Ok(None) => {}
            Err(err) => {
                error!("failed to store password reset token: {err:#}");
            }
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(GenericAck {
            message: RESET_ACK.to_string(),
        }),
    ))
}

/// Consume a reset token and set the new password.
///
/// A successful reset also revokes the identity's refresh tokens, so any
/// session minted before the recovery stops working.
#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password replaced"),
        (status = 400, description = "Malformed input"),
        (status = 401, description = "Invalid or expired token")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<impl IntoResponse> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let token = request.token.trim();
    if token.is_empty() {
        return Err(AuthError::Validation("Missing token".to_string()));
    }
    validate_new_password(&request.new_password)?;

    let password_hash = hash_password(&request.new_password)?;
    if consume_password_reset(&pool, &hash_token(token), &password_hash).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AuthError::InvalidToken)
    }
}
