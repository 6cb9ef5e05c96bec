//! # Shepherd (Identity & Session Core)
//!
//! `shepherd` issues and manages staff identities for the Shepherd church
//! application: password credentials, multi-factor enrollment, session
//! tokens, and encryption of sensitive person fields at rest.
//!
//! ## Identity Lifecycle
//!
//! Self-registered identities start as `PENDING` and unverified. Clicking the
//! emailed verification link marks the address verified; an administrator
//! then approves the account, moving it to `ACTIVE`. Administrators can also
//! create identities directly, which arrive pre-verified. Status only moves
//! forward; deactivation (`INACTIVE`) is an administrative action, never
//! automatic.
//!
//! A verified-but-pending identity may sign in and read data; every mutating
//! operation is rejected until approval unless the operation is explicitly
//! marked as allowed while pending.
//!
//! ## Sessions & Tokens
//!
//! Logins produce a short-lived access token and a longer-lived refresh
//! token, signed with independent secrets. Refresh tokens rotate: each issue
//! replaces the identity's previous token record in one transaction, so at
//! most one refresh token is live per identity at any time.
//!
//! ## Roles
//!
//! Access is controlled by a closed role set (`super-admin`, `admin`,
//! `pastoral-staff`, `admin-staff`, `ministry-leader`, `volunteer`); unknown
//! role or status values are rejected at the boundary rather than compared as
//! strings deeper in.

pub mod api;
pub mod audit;
pub mod cli;
pub mod error;
pub mod guard;
pub mod identity;
pub mod mfa;
pub mod password;
pub mod tokens;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
