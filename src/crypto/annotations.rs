//! Side table of crypto processing results, keyed by part identity.
//!
//! Annotations are keyed by [`PartId`], never by content: two structurally
//! identical parts at different positions are distinct entries.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::crypto::provider::{DecryptionStatus, SignatureStatus};
use crate::model::part::{Part, PartId};

/// Annotation store shared with background decryption tasks.
pub type SharedAnnotations = Arc<RwLock<CryptoAnnotations>>;

/// Outcome category of processing one crypto part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CryptoError {
    /// The provider processed the part.
    OpenPgpOk,
    /// The user cancelled an interaction the provider asked for.
    OpenPgpUiCanceled,
    /// The provider returned an error for this part.
    OpenPgpApiReturnedError,
    /// Encrypted content is present but not fully downloaded.
    OpenPgpEncryptedButIncomplete,
    /// Signed content is present but not fully downloaded.
    OpenPgpSignedButIncomplete,
    /// `multipart/encrypted` with a protocol other than OpenPGP.
    EncryptedButUnsupported,
    /// `multipart/signed` with a protocol other than OpenPGP.
    SignedButUnsupported,
    /// Encrypted content but no provider is configured.
    OpenPgpEncryptedNoProvider,
}

/// Result of processing one crypto part.
#[derive(Debug)]
pub struct CryptoResultAnnotation {
    error: CryptoError,
    replacement: Option<Part>,
    decryption: Option<DecryptionStatus>,
    signature: Option<SignatureStatus>,
    provider_error: Option<String>,
}

impl CryptoResultAnnotation {
    /// An annotation that records why a part was not (fully) processed.
    pub fn error_annotation(error: CryptoError, replacement: Option<Part>) -> Self {
        Self {
            error,
            replacement,
            decryption: None,
            signature: None,
            provider_error: None,
        }
    }

    /// A successful provider result. `replacement` is the decrypted content,
    /// if the operation produced any.
    pub fn openpgp_result(
        decryption: DecryptionStatus,
        signature: Option<SignatureStatus>,
        replacement: Option<Part>,
    ) -> Self {
        Self {
            error: CryptoError::OpenPgpOk,
            replacement,
            decryption: Some(decryption),
            signature,
            provider_error: None,
        }
    }

    /// The provider failed for this part.
    pub fn provider_error(message: impl Into<String>, replacement: Option<Part>) -> Self {
        Self {
            error: CryptoError::OpenPgpApiReturnedError,
            replacement,
            decryption: None,
            signature: None,
            provider_error: Some(message.into()),
        }
    }

    pub fn canceled() -> Self {
        Self::error_annotation(CryptoError::OpenPgpUiCanceled, None)
    }

    pub fn error_type(&self) -> CryptoError {
        self.error
    }

    /// Decrypted (or otherwise substituted) content for the annotated part.
    pub fn replacement_data(&self) -> Option<&Part> {
        self.replacement.as_ref()
    }

    pub fn has_replacement_data(&self) -> bool {
        self.replacement.is_some()
    }

    pub fn decryption(&self) -> Option<&DecryptionStatus> {
        self.decryption.as_ref()
    }

    pub fn signature(&self) -> Option<&SignatureStatus> {
        self.signature.as_ref()
    }

    pub fn provider_error_message(&self) -> Option<&str> {
        self.provider_error.as_deref()
    }
}

/// Identity-keyed map from parts to their processing results.
#[derive(Debug, Default)]
pub struct CryptoAnnotations {
    annotations: HashMap<PartId, CryptoResultAnnotation>,
}

impl CryptoAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result for `part`, replacing any earlier one.
    pub fn put(&mut self, part: &Part, annotation: CryptoResultAnnotation) {
        self.annotations.insert(part.id(), annotation);
    }

    /// Record the result for the part with identity `id`.
    pub fn insert(&mut self, id: PartId, annotation: CryptoResultAnnotation) {
        self.annotations.insert(id, annotation);
    }

    pub fn has(&self, part: &Part) -> bool {
        self.annotations.contains_key(&part.id())
    }

    pub fn get(&self, part: &Part) -> Option<&CryptoResultAnnotation> {
        self.annotations.get(&part.id())
    }

    pub fn get_by_id(&self, id: PartId) -> Option<&CryptoResultAnnotation> {
        self.annotations.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    /// The annotated part whose replacement data is `part`, if any.
    pub fn find_key_for_annotation_with_replacement_part(&self, part: &Part) -> Option<PartId> {
        self.annotations.iter().find_map(|(key, annotation)| {
            annotation
                .replacement_data()
                .filter(|replacement| replacement.id() == part.id())
                .map(|_| *key)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PartId, &CryptoResultAnnotation)> {
        self.annotations.iter()
    }
}
