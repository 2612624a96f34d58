//! Passphrase-based authenticated encryption for stored OAuth tokens.
//!
//! Every call derives a fresh 256-bit key from the passphrase and a random
//! 16-byte salt with Argon2id, then seals the plaintext with AES-256-GCM
//! using a 16-byte nonce. The stored blob is self-describing:
//!
//! ```text
//! base64( salt[16] ‖ nonce[16] ‖ tag[16] ‖ ciphertext[..] )
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sellersync_common::crypto::{CredentialVault, KdfParams};
//!
//! let vault = CredentialVault::new(Some("correct horse battery staple"), KdfParams::testing());
//! let sealed = vault.encrypt("APP_USR-123")?;
//! assert_eq!(vault.decrypt(&sealed)?, "APP_USR-123");
//! assert!(!vault.uses_default_passphrase());
//! ```

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

/// AES-256-GCM with a 128-bit nonce.
type VaultCipher = AesGcm<Aes256, U16>;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const HEADER_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

/// Well-known development passphrase used when none is configured.
pub const DEFAULT_PASSPHRASE: &str = "sellersync-development-passphrase";

/// Vault failures.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The tag did not verify: wrong passphrase or tampered ciphertext.
    #[error("ciphertext failed authentication")]
    Authentication,

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ErrorClassification for VaultError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Authentication | Self::Malformed(_) => ErrorSeverity::Critical,
            Self::KeyDerivation(_) => ErrorSeverity::Error,
            Self::Common(inner) => inner.severity(),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Cheap parameters for unit tests.
    #[must_use]
    pub const fn testing() -> Self {
        Self { memory_kib: 64, iterations: 1, parallelism: 1 }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { memory_kib: 19 * 1024, iterations: 2, parallelism: 1 }
    }
}

/// Encrypts and decrypts token strings with a process-wide passphrase.
#[derive(Clone)]
pub struct CredentialVault {
    passphrase: Zeroizing<String>,
    params: KdfParams,
    default_passphrase: bool,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("passphrase", &"[REDACTED]")
            .field("params", &self.params)
            .field("default_passphrase", &self.default_passphrase)
            .finish()
    }
}

impl CredentialVault {
    /// Build a vault; falls back to [`DEFAULT_PASSPHRASE`] when `passphrase`
    /// is absent or blank.
    #[must_use]
    pub fn new(passphrase: Option<&str>, params: KdfParams) -> Self {
        match passphrase.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => {
                Self { passphrase: Zeroizing::new(p.to_string()), params, default_passphrase: false }
            }
            None => Self {
                passphrase: Zeroizing::new(DEFAULT_PASSPHRASE.to_string()),
                params,
                default_passphrase: true,
            },
        }
    }

    /// Whether the vault is running on the well-known default passphrase.
    #[must_use]
    pub fn uses_default_passphrase(&self) -> bool {
        self.default_passphrase
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        encrypt_with(plaintext, &self.passphrase, self.params)
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, VaultError> {
        decrypt_with(ciphertext, &self.passphrase, self.params)
    }
}

/// Encrypt `plaintext` under `passphrase` with default KDF parameters.
pub fn encrypt(plaintext: &str, passphrase: &str) -> Result<String, VaultError> {
    encrypt_with(plaintext, passphrase, KdfParams::default())
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(ciphertext: &str, passphrase: &str) -> Result<String, VaultError> {
    decrypt_with(ciphertext, passphrase, KdfParams::default())
}

fn encrypt_with(plaintext: &str, passphrase: &str, params: KdfParams) -> Result<String, VaultError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let cipher = derive_cipher(passphrase, &salt, params)?;
    let mut buffer = plaintext.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(aes_gcm::Nonce::<U16>::from_slice(&nonce), b"", &mut buffer)
        .map_err(|_| CommonError::internal("AES-GCM encryption failed"))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + buffer.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(tag.as_slice());
    blob.extend_from_slice(&buffer);
    buffer.zeroize();

    Ok(BASE64.encode(blob))
}

fn decrypt_with(ciphertext: &str, passphrase: &str, params: KdfParams) -> Result<String, VaultError> {
    let blob = BASE64
        .decode(ciphertext.trim())
        .map_err(|e| VaultError::Malformed(format!("base64 decode failed: {e}")))?;
    if blob.len() < HEADER_LEN {
        return Err(VaultError::Malformed(format!(
            "blob is {} bytes, header alone is {HEADER_LEN}",
            blob.len()
        )));
    }

    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce, rest) = rest.split_at(NONCE_LEN);
    let (tag, sealed) = rest.split_at(TAG_LEN);

    let cipher = derive_cipher(passphrase, salt, params)?;
    let mut buffer = Zeroizing::new(sealed.to_vec());
    cipher
        .decrypt_in_place_detached(
            aes_gcm::Nonce::<U16>::from_slice(nonce),
            b"",
            &mut buffer[..],
            aes_gcm::Tag::from_slice(tag),
        )
        .map_err(|_| VaultError::Authentication)?;

    String::from_utf8(buffer.to_vec())
        .map_err(|_| VaultError::Malformed("plaintext is not valid UTF-8".to_string()))
}

fn derive_cipher(passphrase: &str, salt: &[u8], params: KdfParams) -> Result<VaultCipher, VaultError> {
    let argon_params =
        Params::new(params.memory_kib, params.iterations, params.parallelism, Some(KEY_LEN))
            .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key[..])
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

    VaultCipher::new_from_slice(&key[..])
        .map_err(|e| VaultError::KeyDerivation(format!("invalid key length: {e}")))
}
