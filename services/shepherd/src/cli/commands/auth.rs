use clap::{Arg, Command};

pub const ARG_ACCESS_TOKEN_SECRET: &str = "access-token-secret";
pub const ARG_REFRESH_TOKEN_SECRET: &str = "refresh-token-secret";
pub const ARG_FIELD_KEY: &str = "field-key";

pub fn with_args(command: Command) -> Command {
    let command = with_secret_args(command);
    let command = with_token_ttl_args(command);
    with_notification_args(command)
}

fn with_secret_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_SECRET)
                .long(ARG_ACCESS_TOKEN_SECRET)
                .help("HMAC secret for signing access tokens")
                .env("SHEPHERD_ACCESS_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_SECRET)
                .long(ARG_REFRESH_TOKEN_SECRET)
                .help("HMAC secret for signing refresh tokens, independent of the access secret")
                .env("SHEPHERD_REFRESH_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_FIELD_KEY)
                .long(ARG_FIELD_KEY)
                .help("Passphrase the field encryption key is derived from")
                .long_help(
                    "Passphrase the field encryption key is derived from. Changing it makes previously encrypted fields unreadable.",
                )
                .env("SHEPHERD_FIELD_KEY")
                .required(true),
        )
}

fn with_token_ttl_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("access-token-ttl-seconds")
                .long("access-token-ttl-seconds")
                .help("Access token lifetime in seconds")
                .env("SHEPHERD_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-token-ttl-seconds")
                .long("refresh-token-ttl-seconds")
                .help("Refresh token lifetime in seconds")
                .env("SHEPHERD_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("verification-token-ttl-seconds")
                .long("verification-token-ttl-seconds")
                .help("Email verification token lifetime in seconds")
                .env("SHEPHERD_VERIFICATION_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("reset-token-ttl-seconds")
                .long("reset-token-ttl-seconds")
                .help("Password reset token lifetime in seconds")
                .env("SHEPHERD_RESET_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_notification_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for verification and reset links")
                .env("SHEPHERD_FRONTEND_BASE_URL")
                .default_value("https://staff.shepherd.church"),
        )
        .arg(
            Arg::new("mfa-issuer")
                .long("mfa-issuer")
                .help("Issuer label shown in authenticator apps")
                .env("SHEPHERD_MFA_ISSUER")
                .default_value("Shepherd"),
        )
        .arg(
            Arg::new("admin-email")
                .long("admin-email")
                .help("Address notified of new registrations")
                .env("SHEPHERD_ADMIN_EMAIL")
                .default_value("admins@shepherd.church"),
        )
}
