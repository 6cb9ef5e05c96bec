use crate::api;
use anyhow::Result;
use secrecy::SecretString;

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
    pub field_passphrase: SecretString,
    pub frontend_base_url: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub verification_token_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub mfa_issuer: String,
    pub admin_email: String,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &self.dsn)
            .field("access_secret", &"***")
            .field("refresh_secret", &"***")
            .field("field_passphrase", &"***")
            .field("frontend_base_url", &self.frontend_base_url)
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .field(
                "verification_token_ttl_seconds",
                &self.verification_token_ttl_seconds,
            )
            .field("reset_token_ttl_seconds", &self.reset_token_ttl_seconds)
            .field("mfa_issuer", &self.mfa_issuer)
            .field("admin_email", &self.admin_email)
            .finish()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the key derivation, database connection, or server startup fails.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = api::handlers::auth::AuthConfig::new(args.frontend_base_url)
        .with_access_ttl_seconds(args.access_ttl_seconds)
        .with_refresh_ttl_seconds(args.refresh_ttl_seconds)
        .with_verification_token_ttl_seconds(args.verification_token_ttl_seconds)
        .with_reset_token_ttl_seconds(args.reset_token_ttl_seconds)
        .with_mfa_issuer(args.mfa_issuer)
        .with_admin_email(args.admin_email);

    api::new(
        args.port,
        args.dsn,
        auth_config,
        &args.access_secret,
        &args.refresh_secret,
        &args.field_passphrase,
    )
    .await
}
