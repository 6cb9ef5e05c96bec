//! Identity records and the closed role/status sets.
//!
//! Roles and statuses are modeled as enums and parsed once at the boundary
//! (request payloads, token claims, database rows). Anything downstream works
//! with the variants, never with raw strings.

use chrono::{DateTime, Utc};
use field_cipher::FieldCipher;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Staff roles, ordered from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    SuperAdmin,
    Admin,
    PastoralStaff,
    AdminStaff,
    MinistryLeader,
    Volunteer,
}

impl Role {
    pub const ALL: [Self; 6] = [
        Self::SuperAdmin,
        Self::Admin,
        Self::PastoralStaff,
        Self::AdminStaff,
        Self::MinistryLeader,
        Self::Volunteer,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super-admin",
            Self::Admin => "admin",
            Self::PastoralStaff => "pastoral-staff",
            Self::AdminStaff => "admin-staff",
            Self::MinistryLeader => "ministry-leader",
            Self::Volunteer => "volunteer",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "role",
                value: value.to_string(),
            })
    }
}

/// Account status. Transitions are monotonic: `PENDING` moves to `ACTIVE` on
/// approval and never back; `INACTIVE` is an administrative deactivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdentityStatus {
    Pending,
    Active,
    Inactive,
}

impl IdentityStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl std::str::FromStr for IdentityStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            other => Err(UnknownVariant {
                kind: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Full identity row as stored. The phone number field holds the encrypted
/// envelope, never the plaintext.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: IdentityStatus,
    pub email_verified: bool,
    pub mfa_secret: Option<String>,
    pub mfa_enabled: bool,
    pub last_login: Option<DateTime<Utc>>,
}

/// Caller-facing identity view. Carries no credential or MFA material.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IdentitySummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: IdentityStatus,
    pub email_verified: bool,
    pub mfa_enabled: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl Identity {
    /// Build the caller-facing view, decrypting the phone envelope.
    ///
    /// An unreadable envelope degrades to an unset field; a stored value we
    /// can no longer open is a data-quality problem, not a request failure.
    #[must_use]
    pub fn summary(&self, cipher: &FieldCipher) -> IdentitySummary {
        let phone = self.phone.as_deref().and_then(|envelope| {
            match cipher.decrypt(envelope) {
                Ok(value) if value.is_empty() => None,
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(identity = %self.id, "unreadable phone envelope, returning field as unset");
                    None
                }
            }
        });

        IdentitySummary {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone,
            role: self.role,
            status: self.status,
            email_verified: self.email_verified,
            mfa_enabled: self.mfa_enabled,
            last_login: self.last_login,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            phone: None,
            role: Role::Volunteer,
            status: IdentityStatus::Active,
            email_verified: true,
            mfa_secret: None,
            mfa_enabled: false,
            last_login: None,
        }
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn role_serializes_kebab_case() {
        let value = serde_json::to_value(Role::PastoralStaff).unwrap();
        assert_eq!(value, serde_json::json!("pastoral-staff"));
    }

    #[test]
    fn unknown_role_rejected() {
        assert!("SUPER_ADMIN".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            IdentityStatus::Pending,
            IdentityStatus::Active,
            IdentityStatus::Inactive,
        ] {
            assert_eq!(status.as_str().parse::<IdentityStatus>().unwrap(), status);
        }
        assert!("pending".parse::<IdentityStatus>().is_err());
    }

    #[test]
    fn summary_decrypts_phone() {
        let cipher = field_cipher::FieldCipher::from_passphrase("summary test key").unwrap();
        let mut record = identity();
        record.phone = Some(cipher.encrypt("+1 555 0100").unwrap());

        let summary = record.summary(&cipher);
        assert_eq!(summary.phone.as_deref(), Some("+1 555 0100"));
    }

    #[test]
    fn summary_degrades_unreadable_phone_to_unset() {
        let cipher = field_cipher::FieldCipher::from_passphrase("summary test key").unwrap();
        let mut record = identity();
        record.phone = Some("aa:bb:cc".to_string());

        let summary = record.summary(&cipher);
        assert_eq!(summary.phone, None);
    }
}
