//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::identity::{IdentitySummary, Role};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub mfa_code: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: IdentitySummary,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// The acknowledgment is identical whether or not the account exists.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GenericAck {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct MfaSetupResponse {
    pub secret: String,
    pub provisioning_uri: String,
    pub qr_png_base64: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MfaVerifyRequest {
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateIdentityRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    /// Defaults to `ACTIVE` when omitted.
    pub status: Option<crate::identity::IdentityStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn register_request_round_trips() -> Result<()> {
        let request = RegisterRequest {
            email: "alice@example.com".to_string(),
            password: "Secret123".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            phone: Some("+1 555 0100".to_string()),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: RegisterRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.phone.as_deref(), Some("+1 555 0100"));
        Ok(())
    }

    #[test]
    fn login_request_mfa_code_optional() -> Result<()> {
        let decoded: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "alice@example.com",
            "password": "Secret123",
        }))?;
        assert_eq!(decoded.mfa_code, None);
        Ok(())
    }

    #[test]
    fn create_identity_request_parses_role_and_status() -> Result<()> {
        let decoded: CreateIdentityRequest = serde_json::from_value(serde_json::json!({
            "email": "bob@example.com",
            "password": "Secret123",
            "first_name": "Bob",
            "last_name": "Jones",
            "role": "pastoral-staff",
            "status": "PENDING",
        }))?;
        assert_eq!(decoded.role, Role::PastoralStaff);
        assert_eq!(decoded.status, Some(crate::identity::IdentityStatus::Pending));
        Ok(())
    }

    #[test]
    fn create_identity_request_rejects_unknown_role() {
        let decoded: Result<CreateIdentityRequest, _> =
            serde_json::from_value(serde_json::json!({
                "email": "bob@example.com",
                "password": "Secret123",
                "first_name": "Bob",
                "last_name": "Jones",
                "role": "owner",
            }));
        assert!(decoded.is_err());
    }
}
