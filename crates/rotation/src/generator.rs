//! Secret generation
//!
//! Produces a new credential value for a secret type, with descriptive
//! strength metadata. Uses the OS secure-random source; an unavailable
//! entropy source is fatal for the attempt, never silently retried.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use keywheel_core::SecretString;
use rand::rngs::OsRng;
use rand::TryRngCore as _;
use zeroize::Zeroize;

use crate::error::{RotationError, RotationResult};
use crate::model::{SecretMetadata, SecretType};

/// Password alphabet: letters, digits, and shell-safe punctuation
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.~!@#%^*+=";

/// Minimum entropy accepted by the validating step, per secret type
pub fn minimum_entropy_bits(secret_type: SecretType) -> u32 {
    match secret_type {
        SecretType::WebhookSecret => 512,
        SecretType::Certificate => 384,
        SecretType::OauthToken => 288,
        SecretType::ApiKey | SecretType::EncryptionKey | SecretType::DatabasePassword => 192,
    }
}

/// A freshly generated credential value plus descriptive metadata
#[derive(Debug, Clone)]
pub struct GeneratedSecret {
    /// The raw new value; only the deploy step may read it
    pub value: SecretString,

    /// Age, strength, entropy - safe to persist on the execution record
    pub metadata: SecretMetadata,
}

/// Generates credential values appropriate to each secret type
///
/// Pure over the requested type plus the OS entropy source; holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretGenerator;

impl SecretGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a new value for the given type
    ///
    /// Per-type output shapes:
    ///
    /// | type | random bytes | encoding |
    /// |---|---|---|
    /// | `api_key` | 32 | base64url |
    /// | `webhook_secret` | 64 | hex |
    /// | `encryption_key` | 32 | base64 |
    /// | `certificate` | 64 | base64 |
    /// | `database_password` | 32 chars | mixed charset |
    /// | fallback (`oauth_token`) | 48 | base64url |
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Generation`] when the platform's
    /// secure-random source is unavailable.
    pub fn generate(&self, secret_type: SecretType) -> RotationResult<GeneratedSecret> {
        match secret_type {
            SecretType::ApiKey => self.random_encoded(32, Encoding::Base64Url, "os-random/base64url"),
            SecretType::WebhookSecret => self.random_encoded(64, Encoding::Hex, "os-random/hex"),
            SecretType::EncryptionKey => self.random_encoded(32, Encoding::Base64, "os-random/base64"),
            SecretType::Certificate => self.random_encoded(64, Encoding::Base64, "os-random/base64"),
            SecretType::DatabasePassword => self.random_password(32),
            SecretType::OauthToken => {
                self.random_encoded(48, Encoding::Base64Url, "os-random/base64url")
            }
        }
    }

    fn random_encoded(
        &self,
        byte_len: usize,
        encoding: Encoding,
        algorithm: &str,
    ) -> RotationResult<GeneratedSecret> {
        let mut bytes = fill_random(byte_len)?;
        let encoded = match encoding {
            Encoding::Base64Url => URL_SAFE_NO_PAD.encode(&bytes),
            Encoding::Base64 => STANDARD.encode(&bytes),
            Encoding::Hex => hex::encode(&bytes),
        };
        bytes.zeroize();

        let entropy_bits = (byte_len * 8) as u32;
        Ok(GeneratedSecret {
            value: SecretString::new(encoded),
            metadata: metadata(entropy_bits, algorithm),
        })
    }

    fn random_password(&self, char_len: usize) -> RotationResult<GeneratedSecret> {
        // Rejection-free sampling: charset length divides into the byte
        // range with negligible bias for a 74-symbol alphabet, which is
        // acceptable for a 32-char password well above the entropy floor.
        let mut bytes = fill_random(char_len)?;
        let password: String = bytes
            .iter()
            .map(|b| PASSWORD_CHARSET[*b as usize % PASSWORD_CHARSET.len()] as char)
            .collect();
        bytes.zeroize();

        let entropy_bits = (char_len as f64 * (PASSWORD_CHARSET.len() as f64).log2()) as u32;
        Ok(GeneratedSecret {
            value: SecretString::new(password),
            metadata: metadata(entropy_bits, "os-random/charset"),
        })
    }
}

enum Encoding {
    Base64Url,
    Base64,
    Hex,
}

fn fill_random(len: usize) -> RotationResult<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| RotationError::Generation {
            reason: format!("secure-random source unavailable: {e}"),
        })?;
    Ok(bytes)
}

fn metadata(entropy_bits: u32, algorithm: &str) -> SecretMetadata {
    SecretMetadata {
        age_days: 0,
        strength_score: strength_score(entropy_bits),
        entropy_bits,
        algorithm: algorithm.to_string(),
    }
}

/// Heuristic 0-100 strength score: 256 bits of entropy scores 100
fn strength_score(entropy_bits: u32) -> u8 {
    ((u64::from(entropy_bits) * 100) / 256).min(100) as u8
}
