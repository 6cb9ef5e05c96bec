//! Access/refresh token minting, validation, and refresh rotation.
//!
//! Both token kinds carry the same claim shape but are signed with
//! independent secrets, so one can never be presented in place of the other.
//! Issuing persists the refresh token's hash and deletes any prior record for
//! the identity in the same transaction, keeping at most one refresh token
//! live per identity.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    api::handlers::auth::{storage, utils::hash_token},
    error::{AuthError, Result},
    identity::{Identity, IdentityStatus, Role},
};

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 30 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Claims carried by both access and refresh tokens.
///
/// `status` reflects the identity at issuance time; a later status change
/// only takes effect once the access token expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub status: IdentityStatus,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(access_secret: &SecretString, refresh_secret: &SecretString) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, access: i64, refresh: i64) -> Self {
        self.access_ttl_seconds = access;
        self.refresh_ttl_seconds = refresh;
        self
    }

    /// Mint a token pair and persist the refresh token record.
    ///
    /// The delete of prior records and the insert of the new one run in a
    /// single transaction, so two concurrent issues for the same identity
    /// cannot both leave a live row, and a racing logout cannot resurrect a
    /// superseded token.
    ///
    /// # Errors
    /// Returns an error if signing or the store update fails.
    pub async fn issue(&self, pool: &PgPool, identity: &Identity) -> Result<TokenPair> {
        let access_token = self.mint(&self.access_encoding, identity, self.access_ttl_seconds)?;
        let refresh_token = self.mint(&self.refresh_encoding, identity, self.refresh_ttl_seconds)?;

        let expires_at = Utc::now() + Duration::seconds(self.refresh_ttl_seconds);
        storage::replace_refresh_token(pool, identity.id, &hash_token(&refresh_token), expires_at)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Validate a refresh token and re-fetch its identity.
    ///
    /// Rotation is latest-wins: the token is checked for signature and expiry
    /// only, not matched against the stored record. Requiring a match with
    /// the single stored row would close the revocation gap for superseded
    /// tokens and is a possible hardening.
    ///
    /// # Errors
    /// Returns `InvalidToken` when the signature or expiry check fails, or
    /// when the identity no longer exists or has been deactivated.
    pub async fn validate_refresh(&self, pool: &PgPool, token: &str) -> Result<Identity> {
        let data = decode::<Claims>(token, &self.refresh_decoding, &Validation::default())
            .map_err(|_| AuthError::InvalidToken)?;

        let identity = storage::lookup_identity_by_id(pool, data.claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if identity.status == IdentityStatus::Inactive {
            return Err(AuthError::InvalidToken);
        }

        Ok(identity)
    }

    /// Decode and verify an access token.
    ///
    /// # Errors
    /// Returns `InvalidToken` when the signature or expiry check fails.
    pub fn decode_access(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.access_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    #[must_use]
    pub const fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    /// Sign an access token without touching the store. Test-only.
    #[cfg(test)]
    #[allow(clippy::unwrap_used)]
    pub(crate) fn access_token_for_tests(&self, identity: &Identity) -> String {
        self.mint(&self.access_encoding, identity, self.access_ttl_seconds)
            .unwrap()
    }

    fn mint(&self, key: &EncodingKey, identity: &Identity, ttl_seconds: i64) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            status: identity.status,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_seconds)).timestamp(),
        };

        encode(&Header::default(), &claims, key)
            .map_err(|_| AuthError::Internal("failed to sign token".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::tests::identity;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            &SecretString::from("access secret for tests"),
            &SecretString::from("refresh secret for tests"),
        )
    }

    #[test]
    fn access_token_round_trips() {
        let issuer = issuer();
        let identity = identity();

        let token = issuer
            .mint(&issuer.access_encoding, &identity, 60)
            .unwrap();
        let claims = issuer.decode_access(&token).unwrap();

        assert_eq!(claims.sub, identity.id);
        assert_eq!(claims.email, identity.email);
        assert_eq!(claims.role, identity.role);
        assert_eq!(claims.status, identity.status);
    }

    #[test]
    fn refresh_token_rejected_as_access() {
        let issuer = issuer();
        let identity = identity();

        let refresh = issuer
            .mint(&issuer.refresh_encoding, &identity, 60)
            .unwrap();
        assert!(matches!(
            issuer.decode_access(&refresh),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_rejected() {
        let issuer = issuer();
        let identity = identity();

        // Far enough in the past to clear the default validation leeway.
        let token = issuer
            .mint(&issuer.access_encoding, &identity, -120)
            .unwrap();
        assert!(matches!(
            issuer.decode_access(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_token_rejected() {
        assert!(matches!(
            issuer().decode_access("not-a-jwt"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn claims_payload_shape() {
        let issuer = issuer();
        let mut identity = identity();
        identity.role = crate::identity::Role::SuperAdmin;
        identity.status = crate::identity::IdentityStatus::Pending;

        let token = issuer
            .mint(&issuer.access_encoding, &identity, 60)
            .unwrap();
        let claims = issuer.decode_access(&token).unwrap();
        let value = serde_json::to_value(&claims).unwrap();

        assert_eq!(value["sub"], serde_json::json!(identity.id.to_string()));
        assert_eq!(value["role"], serde_json::json!("super-admin"));
        assert_eq!(value["status"], serde_json::json!("PENDING"));
    }
}
