//! Field-level encryption for sensitive person data (phone numbers and
//! similar PII) stored in the database.
//!
//! Values are encrypted with AES-256-GCM and stored as a three-part envelope:
//!
//! ```text
//! hex(iv):hex(tag):hex(ciphertext)
//! ```
//!
//! The 32-byte key is derived once at startup from an operator-supplied
//! passphrase via scrypt with a fixed salt, so the same passphrase always
//! opens existing envelopes. A [`FieldCipher`] holds only that derived key;
//! it is cheap to clone, safe to share across requests, and is handed to the
//! service state at construction instead of living in a global.
//!
//! A failed decryption means the stored value is unreadable (tampered,
//! truncated, or written under another key). Callers are expected to treat
//! that as "field unavailable" rather than failing the surrounding request.

use aes_gcm::{
    AesGcm,
    aead::{Aead, KeyInit, consts::U16},
    aes::Aes256,
};
use rand::{RngCore, rngs::OsRng};
use scrypt::Params;
use thiserror::Error;

/// AES-256-GCM with a 16-byte nonce, matching the stored envelope layout.
type EnvelopeCipher = AesGcm<Aes256, U16>;

const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Fixed KDF salt. Changing it would orphan every stored envelope.
const KEY_SALT: &[u8] = b"salt";

/// scrypt cost: N = 2^14, r = 8, p = 1.
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

const ENVELOPE_DELIMITER: char = ':';

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed")]
    DecryptionFailure,
}

/// Authenticated field encryption bound to one derived key.
#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; KEY_LEN],
}

impl FieldCipher {
    /// Derive the symmetric key from the configured passphrase.
    ///
    /// # Errors
    /// Returns an error if the scrypt parameters are rejected or derivation
    /// fails.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, CipherError> {
        let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN)
            .map_err(|_| CipherError::KeyDerivation)?;
        let mut key = [0u8; KEY_LEN];
        scrypt::scrypt(passphrase.as_bytes(), KEY_SALT, &params, &mut key)
            .map_err(|_| CipherError::KeyDerivation)?;
        Ok(Self { key })
    }

    /// Encrypt a field value into its envelope form.
    ///
    /// Empty input is returned unchanged; absent values are never encrypted.
    /// Every call draws a fresh random nonce, so encrypting the same value
    /// twice yields different envelopes.
    ///
    /// # Errors
    /// Returns an error if AEAD encryption fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = aes_gcm::Nonce::<U16>::from_slice(&nonce_bytes);

        let cipher = EnvelopeCipher::new_from_slice(&self.key)
            .map_err(|_| CipherError::Encryption)?;
        let sealed = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encryption)?;

        // The AEAD output is ciphertext with the tag appended; the envelope
        // keeps them as separate hex fields.
        if sealed.len() < TAG_LEN {
            return Err(CipherError::Encryption);
        }
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}{ENVELOPE_DELIMITER}{}{ENVELOPE_DELIMITER}{}",
            hex::encode(nonce_bytes),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    /// Decrypt an envelope back into the field value.
    ///
    /// Empty input is returned unchanged.
    ///
    /// # Errors
    /// Returns [`CipherError::DecryptionFailure`] when the envelope is
    /// malformed, the tag check fails, or the key differs from the one used
    /// to encrypt.
    pub fn decrypt(&self, envelope: &str) -> Result<String, CipherError> {
        if envelope.is_empty() {
            return Ok(String::new());
        }

        let mut parts = envelope.split(ENVELOPE_DELIMITER);
        let (Some(iv_hex), Some(tag_hex), Some(ciphertext_hex), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CipherError::DecryptionFailure);
        };

        let nonce_bytes = decode_component(iv_hex, NONCE_LEN)?;
        let tag = decode_component(tag_hex, TAG_LEN)?;
        let mut sealed = hex::decode(ciphertext_hex).map_err(|_| CipherError::DecryptionFailure)?;
        sealed.extend_from_slice(&tag);

        let nonce = aes_gcm::Nonce::<U16>::from_slice(&nonce_bytes);
        let cipher = EnvelopeCipher::new_from_slice(&self.key)
            .map_err(|_| CipherError::DecryptionFailure)?;
        let plaintext = cipher
            .decrypt(nonce, sealed.as_ref())
            .map_err(|_| CipherError::DecryptionFailure)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::DecryptionFailure)
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").field("key", &"***").finish()
    }
}

fn decode_component(hex_value: &str, expected_len: usize) -> Result<Vec<u8>, CipherError> {
    let bytes = hex::decode(hex_value).map_err(|_| CipherError::DecryptionFailure)?;
    if bytes.len() == expected_len {
        Ok(bytes)
    } else {
        Err(CipherError::DecryptionFailure)
    }
}
