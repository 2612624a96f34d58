//! Token encryption at rest.

pub mod vault;

pub use vault::{decrypt, encrypt, CredentialVault, KdfParams, VaultError, DEFAULT_PASSPHRASE};
