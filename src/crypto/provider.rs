//! Capability interface of the external OpenPGP provider.
//!
//! The detector only locates bytes; decryption and verification happen
//! behind [`CryptoProvider`].

use thiserror::Error;

use crate::model::part::Part;

pub use crate::model::address::account_identity;

/// Whether the provider found the content encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum DecryptionStatus {
    NotEncrypted,
    Encrypted,
    /// Encrypted with an algorithm or key the provider considers weak.
    Insecure,
}

/// Verdict on a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SignatureVerdict {
    NoSignature,
    InvalidSignature,
    KeyMissing,
    ValidKeyConfirmed,
    ValidKeyUnconfirmed,
    InvalidKeyRevoked,
    InvalidKeyExpired,
    InvalidKeyInsecure,
}

/// Signature details reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SignatureStatus {
    pub verdict: SignatureVerdict,
    pub key_id: Option<u64>,
    pub primary_user_id: Option<String>,
}

/// What the provider returns for a successful call.
#[derive(Debug)]
pub struct ProviderOutput {
    pub decryption: DecryptionStatus,
    pub signature: Option<SignatureStatus>,
    /// Decrypted content as a part tree, if the call produced plaintext.
    pub plaintext: Option<Part>,
}

/// Failures reported by the provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The user dismissed a passphrase or key selection prompt.
    #[error("Operation cancelled by user")]
    Canceled,
    /// The provider rejected the request.
    #[error("Provider error: {0}")]
    Api(String),
}

/// OpenPGP operations offered by an external provider.
///
/// `identity` is the account identity built by [`account_identity`].
pub trait CryptoProvider {
    /// Decrypt (and verify, if signed) OpenPGP data: a `multipart/encrypted`
    /// payload or an inline PGP block.
    fn decrypt(&self, identity: &str, data: &[u8]) -> Result<ProviderOutput, ProviderError>;

    /// Verify a detached signature over `signed_content`.
    fn verify_detached(
        &self,
        identity: &str,
        signed_content: &[u8],
        signature: &[u8],
    ) -> Result<ProviderOutput, ProviderError>;
}
