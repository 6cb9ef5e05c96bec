//! Database helpers for identities, single-use tokens, and refresh tokens.
//!
//! Role and status columns are parsed into their enums here, at the boundary;
//! a row carrying an unknown value is a data error, not something to compare
//! strings against downstream. Invariants with a concurrency component (one
//! refresh token per identity, single-use reset tokens) are encoded in the
//! SQL itself: one transaction, or a conditional `UPDATE ... RETURNING`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::is_unique_violation;
use crate::identity::{Identity, IdentityStatus, Role};

/// Outcome when inserting a new identity.
#[derive(Debug)]
pub(crate) enum SignupOutcome {
    Created(Uuid),
    Conflict,
}

/// Outcome when consuming an email verification token.
#[derive(Debug)]
pub(crate) enum VerifyOutcome {
    Verified,
    AlreadyVerified,
    Invalid,
}

/// Outcome when approving a pending identity.
#[derive(Debug)]
pub(crate) enum ApproveOutcome {
    Approved(Identity),
    NotPending,
    EmailUnverified,
    NotFound,
}

const IDENTITY_COLUMNS: &str = r"
    id, email, password_hash, first_name, last_name, phone,
    role::text AS role, status::text AS status, email_verified,
    mfa_secret, mfa_enabled, last_login
";

fn identity_from_row(row: &PgRow) -> Result<Identity> {
    let role: String = row.get("role");
    let status: String = row.get("status");
    Ok(Identity {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        role: role.parse::<Role>().context("stored role is unknown")?,
        status: status
            .parse::<IdentityStatus>()
            .context("stored status is unknown")?,
        email_verified: row.get("email_verified"),
        mfa_secret: row.get("mfa_secret"),
        mfa_enabled: row.get("mfa_enabled"),
        last_login: row.get("last_login"),
    })
}

pub(crate) async fn lookup_identity_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Identity>> {
    let query = &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup identity by id")?;

    row.as_ref().map(identity_from_row).transpose()
}

pub(crate) async fn lookup_identity_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<Identity>> {
    let query = &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup identity by email")?;

    row.as_ref().map(identity_from_row).transpose()
}

/// Insert a self-registered identity: `PENDING`, unverified, with its
/// verification token hash and expiry in the same row.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn insert_registration(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    first_name: &str,
    last_name: &str,
    phone_envelope: Option<&str>,
    verification_token_hash: &[u8],
    token_ttl_seconds: i64,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO identities
            (email, password_hash, first_name, last_name, phone, role, status,
             email_verified, email_verification_token, email_verification_expires_at)
        VALUES ($1, $2, $3, $4, $5, 'volunteer', 'PENDING',
                FALSE, $6, NOW() + ($7 * INTERVAL '1 second'))
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .bind(phone_envelope)
        .bind(verification_token_hash)
        .bind(token_ttl_seconds)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert identity"),
    }
}

/// Insert an administrator-created identity: pre-verified, status chosen by
/// the caller, no verification token.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn insert_preverified(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    first_name: &str,
    last_name: &str,
    phone_envelope: Option<&str>,
    role: Role,
    status: IdentityStatus,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO identities
            (email, password_hash, first_name, last_name, phone, role, status, email_verified)
        VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .bind(phone_envelope)
        .bind(role.as_str())
        .bind(status.as_str())
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert identity"),
    }
}

/// Consume a verification token: single-use, so the token and its expiry are
/// cleared in the same statement that flips the flag. Status is untouched.
pub(crate) async fn consume_verification_token(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<VerifyOutcome> {
    let mut tx = pool.begin().await.context("begin verify transaction")?;

    let query = r"
        SELECT id, email_verified
        FROM identities
        WHERE email_verification_token = $1
          AND email_verification_expires_at > NOW()
        FOR UPDATE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup verification token")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(VerifyOutcome::Invalid);
    };

    if row.get::<bool, _>("email_verified") {
        let _ = tx.rollback().await;
        return Ok(VerifyOutcome::AlreadyVerified);
    }

    let id: Uuid = row.get("id");
    let query = r"
        UPDATE identities
        SET email_verified = TRUE,
            email_verification_token = NULL,
            email_verification_expires_at = NULL
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to mark email verified")?;

    tx.commit().await.context("commit verify transaction")?;
    Ok(VerifyOutcome::Verified)
}

/// Store a password reset token, overwriting any still-outstanding one.
/// Returns the recipient's first name when the email matched an identity.
pub(crate) async fn set_password_reset(
    pool: &PgPool,
    email: &str,
    token_hash: &[u8],
    token_ttl_seconds: i64,
) -> Result<Option<String>> {
    let query = r"
        UPDATE identities
        SET password_reset_token = $2,
            password_reset_expires_at = NOW() + ($3 * INTERVAL '1 second')
        WHERE email = $1
        RETURNING first_name
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(token_hash)
        .bind(token_ttl_seconds)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to store password reset token")?;

    Ok(row.map(|row| row.get("first_name")))
}

/// Consume a reset token and replace the password. Also deletes the
/// identity's refresh tokens in the same transaction, so a stolen session
/// does not survive a recovery.
pub(crate) async fn consume_password_reset(
    pool: &PgPool,
    token_hash: &[u8],
    new_password_hash: &str,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("begin reset transaction")?;

    let query = r"
        UPDATE identities
        SET password_hash = $2,
            password_reset_token = NULL,
            password_reset_expires_at = NULL
        WHERE password_reset_token = $1
          AND password_reset_expires_at > NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(new_password_hash)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to consume reset token")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(false);
    };

    let id: Uuid = row.get("id");
    let query = "DELETE FROM refresh_tokens WHERE identity_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke refresh tokens after reset")?;

    tx.commit().await.context("commit reset transaction")?;
    Ok(true)
}

/// Move a pending, verified identity to `ACTIVE`. The row is locked for the
/// checks so two concurrent approvals observe a consistent status.
pub(crate) async fn approve_identity(pool: &PgPool, id: Uuid) -> Result<ApproveOutcome> {
    let mut tx = pool.begin().await.context("begin approve transaction")?;

    let query = &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1 FOR UPDATE");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup identity for approval")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(ApproveOutcome::NotFound);
    };
    let mut identity = identity_from_row(&row)?;

    if identity.status != IdentityStatus::Pending {
        let _ = tx.rollback().await;
        return Ok(ApproveOutcome::NotPending);
    }
    if !identity.email_verified {
        let _ = tx.rollback().await;
        return Ok(ApproveOutcome::EmailUnverified);
    }

    let query = "UPDATE identities SET status = 'ACTIVE' WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to activate identity")?;

    tx.commit().await.context("commit approve transaction")?;

    identity.status = IdentityStatus::Active;
    Ok(ApproveOutcome::Approved(identity))
}

pub(crate) async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<()> {
    let query = "UPDATE identities SET last_login = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update last login")?;
    Ok(())
}

pub(crate) async fn update_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<()> {
    let query = "UPDATE identities SET password_hash = $2 WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}

/// Store a fresh, not-yet-confirmed TOTP secret. Restarting enrollment
/// replaces any earlier unconfirmed secret.
pub(crate) async fn store_mfa_secret(pool: &PgPool, id: Uuid, secret: &str) -> Result<()> {
    let query = r"
        UPDATE identities
        SET mfa_secret = $2,
            mfa_enabled = FALSE
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .bind(secret)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store MFA secret")?;
    Ok(())
}

/// Flip `mfa_enabled` after a successful proof. The predicate keeps the
/// flag from ever being set without a stored secret.
pub(crate) async fn enable_mfa(pool: &PgPool, id: Uuid) -> Result<()> {
    let query = r"
        UPDATE identities
        SET mfa_enabled = TRUE
        WHERE id = $1
          AND mfa_secret IS NOT NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to enable MFA")?;
    Ok(())
}

/// Replace the identity's refresh token: delete-then-insert in one
/// transaction, so at most one row is live no matter how issues interleave.
pub(crate) async fn replace_refresh_token(
    pool: &PgPool,
    identity_id: Uuid,
    token_hash: &[u8],
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin refresh transaction")?;

    let query = "DELETE FROM refresh_tokens WHERE identity_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identity_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete superseded refresh tokens")?;

    let query = r"
        INSERT INTO refresh_tokens (identity_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identity_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert refresh token")?;

    tx.commit().await.context("commit refresh transaction")?;
    Ok(())
}

/// Delete the matching refresh token. Logout is idempotent; deleting zero
/// rows is not an error.
pub(crate) async fn delete_refresh_token(
    pool: &PgPool,
    identity_id: Uuid,
    token_hash: &[u8],
) -> Result<()> {
    let query = "DELETE FROM refresh_tokens WHERE identity_id = $1 AND token_hash = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identity_id)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete refresh token")?;
    Ok(())
}
