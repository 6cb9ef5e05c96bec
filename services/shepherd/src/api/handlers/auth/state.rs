//! Auth configuration and shared request state.

use field_cipher::FieldCipher;

use crate::{api::email::Notifier, audit::AuditRecorder, mfa::MfaManager, tokens::TokenIssuer};

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_VERIFICATION_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_MFA_ISSUER: &str = "Shepherd";
const DEFAULT_ADMIN_EMAIL: &str = "admins@shepherd.church";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    verification_token_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
    mfa_issuer: String,
    admin_email: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            verification_token_ttl_seconds: DEFAULT_VERIFICATION_TOKEN_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
            mfa_issuer: DEFAULT_MFA_ISSUER.to_string(),
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_verification_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.verification_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_mfa_issuer(mut self, issuer: String) -> Self {
        self.mfa_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_admin_email(mut self, email: String) -> Self {
        self.admin_email = email;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    pub(crate) fn verification_token_ttl_seconds(&self) -> i64 {
        self.verification_token_ttl_seconds
    }

    pub(crate) fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    #[must_use]
    pub fn mfa_issuer(&self) -> &str {
        &self.mfa_issuer
    }

    pub(crate) fn admin_email(&self) -> &str {
        &self.admin_email
    }
}

/// Everything a handler needs beyond the connection pool. Built once at
/// startup and shared through an `Extension`.
pub struct AuthState {
    config: AuthConfig,
    cipher: FieldCipher,
    tokens: TokenIssuer,
    mfa: MfaManager,
    notifier: Notifier,
    audit: AuditRecorder,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        cipher: FieldCipher,
        tokens: TokenIssuer,
        notifier: Notifier,
        audit: AuditRecorder,
    ) -> Self {
        let mfa = MfaManager::new(config.mfa_issuer().to_string());
        Self {
            config,
            cipher,
            tokens,
            mfa,
            notifier,
            audit,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    #[must_use]
    pub fn mfa(&self) -> &MfaManager {
        &self.mfa
    }

    pub(crate) fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub(crate) fn audit(&self) -> &AuditRecorder {
        &self.audit
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::api::email::LogEmailSender;
    use secrecy::SecretString;
    use std::sync::Arc;

    pub(crate) fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new("https://staff.shepherd.church".to_string());
        let cipher = FieldCipher::from_passphrase("auth state test key").unwrap();
        let tokens = TokenIssuer::new(
            &SecretString::from("access secret for tests"),
            &SecretString::from("refresh secret for tests"),
        );
        let notifier = Notifier::new(Arc::new(LogEmailSender));
        let (audit, _rx) = AuditRecorder::detached();
        Arc::new(AuthState::new(config, cipher, tokens, notifier, audit))
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = AuthConfig::new("https://staff.shepherd.church".to_string());

        assert_eq!(config.access_ttl_seconds(), 1800);
        assert_eq!(config.refresh_ttl_seconds(), 604_800);
        assert_eq!(config.verification_token_ttl_seconds(), 86_400);
        assert_eq!(config.reset_token_ttl_seconds(), 3600);
        assert_eq!(config.mfa_issuer(), "Shepherd");
        assert_eq!(config.admin_email(), "admins@shepherd.church");

        let config = config
            .with_access_ttl_seconds(60)
            .with_refresh_ttl_seconds(120)
            .with_verification_token_ttl_seconds(300)
            .with_reset_token_ttl_seconds(30)
            .with_mfa_issuer("Shepherd Test".to_string())
            .with_admin_email("ops@shepherd.church".to_string());

        assert_eq!(config.access_ttl_seconds(), 60);
        assert_eq!(config.refresh_ttl_seconds(), 120);
        assert_eq!(config.verification_token_ttl_seconds(), 300);
        assert_eq!(config.reset_token_ttl_seconds(), 30);
        assert_eq!(config.mfa_issuer(), "Shepherd Test");
        assert_eq!(config.admin_email(), "ops@shepherd.church");
    }

    #[test]
    fn state_builds_mfa_manager_from_issuer() {
        let state = auth_state();
        assert_eq!(state.config().frontend_base_url(), "https://staff.shepherd.church");
        let identity = crate::identity::tests::identity();
        let enrollment = state.mfa().begin_enrollment(&identity).unwrap();
        assert!(enrollment.provisioning_uri.contains("Shepherd"));
    }
}
