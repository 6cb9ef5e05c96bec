//! TOTP enrollment and the login-time multi-factor challenge.
//!
//! Codes are standard 30-second-step TOTP (SHA-1, six digits) verified with a
//! skew of one step either side, tolerating client clock drift without
//! accepting stale codes.

use totp_rs::{Algorithm, Secret, TOTP};

use crate::{
    error::{AuthError, Result},
    identity::Identity,
};

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1;
const TOTP_STEP_SECONDS: u64 = 30;

/// Material handed to the user when enrollment starts. The secret is only
/// ever returned here; afterwards it stays server-side.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub secret: String,
    pub provisioning_uri: String,
    pub qr_png_base64: String,
}

#[derive(Debug, Clone)]
pub struct MfaManager {
    issuer: String,
}

impl MfaManager {
    #[must_use]
    pub fn new(issuer: String) -> Self {
        Self { issuer }
    }

    /// Generate a fresh secret and its provisioning URI / QR image.
    ///
    /// The caller stores the secret unconfirmed; `mfa_enabled` stays false
    /// until one code has been proven. Starting over replaces any earlier
    /// unconfirmed secret.
    ///
    /// # Errors
    /// Fails with `AlreadyEnabled` when MFA is already on for the identity.
    pub fn begin_enrollment(&self, identity: &Identity) -> Result<Enrollment> {
        if identity.mfa_enabled {
            return Err(AuthError::AlreadyEnabled);
        }

        let secret_bytes = Secret::generate_secret()
            .to_bytes()
            .map_err(|err| AuthError::Internal(format!("failed to generate TOTP secret: {err}")))?;
        let totp = self.totp_from_bytes(secret_bytes, &identity.email)?;

        let qr_png_base64 = totp
            .get_qr_base64()
            .map_err(|err| AuthError::Internal(format!("failed to render QR code: {err}")))?;

        Ok(Enrollment {
            secret: totp.get_secret_base32(),
            provisioning_uri: totp.get_url(),
            qr_png_base64,
        })
    }

    /// Prove one code against the stored, not-yet-confirmed secret.
    ///
    /// # Errors
    /// `InvalidMfaCode` on mismatch (the secret stays in place for retry);
    /// a validation error if enrollment was never started.
    pub fn confirm_code(&self, identity: &Identity, code: &str) -> Result<()> {
        let Some(secret) = identity.mfa_secret.as_deref() else {
            return Err(AuthError::Validation(
                "Multi-factor enrollment has not been started".to_string(),
            ));
        };

        if self.code_matches(secret, &identity.email, code)? {
            Ok(())
        } else {
            Err(AuthError::InvalidMfaCode)
        }
    }

    /// Login-time challenge. Identities without an enabled factor pass
    /// through; MFA that was never set up is not an error.
    ///
    /// # Errors
    /// `InvalidMfaCode` when a factor is enabled and the code mismatches.
    pub fn challenge(&self, identity: &Identity, code: &str) -> Result<()> {
        if !identity.mfa_enabled {
            return Ok(());
        }
        let Some(secret) = identity.mfa_secret.as_deref() else {
            return Ok(());
        };

        if self.code_matches(secret, &identity.email, code)? {
            Ok(())
        } else {
            Err(AuthError::InvalidMfaCode)
        }
    }

    fn code_matches(&self, secret_base32: &str, account: &str, code: &str) -> Result<bool> {
        let totp = self.totp_for(secret_base32, account)?;
        Ok(totp.check_current(code.trim()).unwrap_or(false))
    }

    fn totp_for(&self, secret_base32: &str, account: &str) -> Result<TOTP> {
        let secret_bytes = Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|_| AuthError::Internal("stored TOTP secret is not valid base32".to_string()))?;
        self.totp_from_bytes(secret_bytes, account)
    }

    fn totp_from_bytes(&self, secret_bytes: Vec<u8>, account: &str) -> Result<TOTP> {
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP_SECONDS,
            secret_bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|err| AuthError::Internal(format!("failed to build TOTP: {err}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::tests::identity;

    fn manager() -> MfaManager {
        MfaManager::new("Shepherd".to_string())
    }

    #[test]
    fn enrollment_produces_uri_and_secret() {
        let enrollment = manager().begin_enrollment(&identity()).unwrap();

        assert!(!enrollment.secret.is_empty());
        assert!(enrollment.provisioning_uri.starts_with("otpauth://totp/"));
        assert!(enrollment.provisioning_uri.contains("Shepherd"));
        assert!(!enrollment.qr_png_base64.is_empty());
    }

    #[test]
    fn enrollment_rejected_when_already_enabled() {
        let mut record = identity();
        record.mfa_enabled = true;
        assert!(matches!(
            manager().begin_enrollment(&record),
            Err(AuthError::AlreadyEnabled)
        ));
    }

    #[test]
    fn confirm_without_secret_is_validation_error() {
        assert!(matches!(
            manager().confirm_code(&identity(), "123456"),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn current_code_accepted_and_wrong_code_rejected() {
        let manager = manager();
        let mut record = identity();
        let enrollment = manager.begin_enrollment(&record).unwrap();
        record.mfa_secret = Some(enrollment.secret.clone());

        let totp = manager
            .totp_for(&enrollment.secret, &record.email)
            .unwrap();
        let code = totp.generate_current().unwrap();
        assert!(manager.confirm_code(&record, &code).is_ok());

        // Flip the first digit to guarantee a mismatch with the current code.
        let first = code.chars().next().unwrap();
        let flipped = if first == '0' { '1' } else { '0' };
        let wrong: String = std::iter::once(flipped).chain(code.chars().skip(1)).collect();
        assert!(matches!(
            manager.confirm_code(&record, &wrong),
            Err(AuthError::InvalidMfaCode)
        ));
    }

    #[test]
    fn challenge_passes_when_mfa_not_enabled() {
        let manager = manager();
        assert!(manager.challenge(&identity(), "000000").is_ok());

        // Enabled flag without a stored secret also means "not required".
        let mut record = identity();
        record.mfa_enabled = true;
        record.mfa_secret = None;
        assert!(manager.challenge(&record, "000000").is_ok());
    }

    #[test]
    fn challenge_enforces_code_when_enabled() {
        let manager = manager();
        let mut record = identity();
        let enrollment = manager.begin_enrollment(&record).unwrap();
        record.mfa_secret = Some(enrollment.secret.clone());
        record.mfa_enabled = true;

        let totp = manager
            .totp_for(&enrollment.secret, &record.email)
            .unwrap();
        let code = totp.generate_current().unwrap();
        assert!(manager.challenge(&record, &code).is_ok());
        assert!(matches!(
            manager.challenge(&record, "abcdef"),
            Err(AuthError::InvalidMfaCode)
        ));
    }
}
