//! Multi-pass decryption and verification driver.
//!
//! Passes run in a fixed order: `multipart/encrypted`, then
//! `multipart/signed` (which sees the plaintext of the first pass through
//! the annotations), then inline PGP. Every crypto part found ends up with
//! exactly one annotation unless it is skipped by the signed-only policy or
//! there is no provider to verify it.

use tracing::{debug, info, warn};

use crate::crypto::annotations::{CryptoAnnotations, CryptoError, CryptoResultAnnotation};
use crate::crypto::detector::{
    find_multipart_encrypted_parts, find_multipart_signed_parts, find_pgp_inline_parts,
    get_signature_data, is_multipart_encrypted_openpgp_protocol,
    is_multipart_signed_openpgp_protocol, pgp_inline_kind, CryptoShape, PgpInlineKind,
    TEXT_PLAIN,
};
use crate::crypto::provider::{CryptoProvider, ProviderError, ProviderOutput};
use crate::model::part::{Body, Part, PartId};

/// Drives a [`CryptoProvider`] over every crypto part of a message.
pub struct CryptoHelper<'p, P: CryptoProvider + ?Sized> {
    provider: Option<&'p P>,
    identity: String,
    process_signed_only: bool,
}

impl<'p, P: CryptoProvider + ?Sized> CryptoHelper<'p, P> {
    /// `identity` is passed through to the provider unchanged. With
    /// `process_signed_only` unset, only signatures that were encapsulated in
    /// encrypted content are verified, and inline signed-only blocks are left
    /// alone.
    pub fn new(provider: Option<&'p P>, identity: impl Into<String>, process_signed_only: bool) -> Self {
        Self {
            provider,
            identity: identity.into(),
            process_signed_only,
        }
    }

    /// Process `message` and return the annotations of every handled part.
    pub fn run(&self, message: &Part) -> CryptoAnnotations {
        let mut annotations = CryptoAnnotations::new();

        self.encrypted_pass(message, &mut annotations);
        self.signed_pass(message, &mut annotations);
        self.inline_pass(message, &mut annotations);

        info!(
            root = %message.id(),
            annotated = annotations.len(),
            "Crypto processing finished"
        );
        annotations
    }

    fn encrypted_pass(&self, message: &Part, annotations: &mut CryptoAnnotations) {
        let parts = find_multipart_encrypted_parts(message);
        debug!(pass = CryptoShape::MultipartEncrypted.label(), found = parts.len(), "Running pass");

        for part in parts {
            let annotation = if !part.is_complete() {
                CryptoResultAnnotation::error_annotation(
                    CryptoError::OpenPgpEncryptedButIncomplete,
                    Some(empty_part()),
                )
            } else if !is_multipart_encrypted_openpgp_protocol(part) {
                CryptoResultAnnotation::error_annotation(
                    CryptoError::EncryptedButUnsupported,
                    Some(empty_part()),
                )
            } else {
                match self.provider {
                    None => CryptoResultAnnotation::error_annotation(
                        CryptoError::OpenPgpEncryptedNoProvider,
                        Some(empty_part()),
                    ),
                    Some(provider) => match encrypted_payload(part) {
                        Some(payload) => {
                            into_annotation(part.id(), provider.decrypt(&self.identity, payload), None)
                        }
                        None => CryptoResultAnnotation::error_annotation(
                            CryptoError::OpenPgpEncryptedButIncomplete,
                            Some(empty_part()),
                        ),
                    },
                }
            };
            annotations.put(part, annotation);
        }
    }

    fn signed_pass(&self, message: &Part, annotations: &mut CryptoAnnotations) {
        let mut pending: Vec<(PartId, CryptoResultAnnotation)> = Vec::new();
        {
            let parts = find_multipart_signed_parts(message, annotations);
            debug!(pass = CryptoShape::MultipartSigned.label(), found = parts.len(), "Running pass");

            for part in parts {
                let encapsulated = annotations
                    .find_key_for_annotation_with_replacement_part(part)
                    .is_some();
                if !self.process_signed_only && !encapsulated {
                    debug!(part = %part.id(), "Skipping signed-only part");
                    continue;
                }
                if let Some(annotation) = self.signed_annotation(part) {
                    pending.push((part.id(), annotation));
                }
            }
        }

        for (id, annotation) in pending {
            annotations.insert(id, annotation);
        }
    }

    fn signed_annotation(&self, part: &Part) -> Option<CryptoResultAnnotation> {
        let signed_content = part.child(0);
        let available_content = || {
            signed_content
                .filter(|content| content.is_complete())
                .map(Part::duplicate)
        };

        if !part.is_complete() {
            return Some(CryptoResultAnnotation::error_annotation(
                CryptoError::OpenPgpSignedButIncomplete,
                available_content(),
            ));
        }
        if !is_multipart_signed_openpgp_protocol(part) {
            return Some(CryptoResultAnnotation::error_annotation(
                CryptoError::SignedButUnsupported,
                available_content(),
            ));
        }

        let provider = self.provider?;
        let content = signed_content?;
        let signature = match get_signature_data(part) {
            Ok(Some(signature)) => signature,
            Ok(None) => {
                return Some(CryptoResultAnnotation::error_annotation(
                    CryptoError::OpenPgpSignedButIncomplete,
                    available_content(),
                ))
            }
            Err(e) => {
                warn!(part = %part.id(), error = %e, "Cannot read signature");
                return Some(CryptoResultAnnotation::provider_error(e.to_string(), available_content()));
            }
        };

        let signed_bytes = wire_form(content);
        let result = provider.verify_detached(&self.identity, &signed_bytes, &signature);
        Some(into_annotation(part.id(), result, available_content()))
    }

    fn inline_pass(&self, message: &Part, annotations: &mut CryptoAnnotations) {
        let parts = find_pgp_inline_parts(message);
        debug!(pass = "pgp-inline", found = parts.len(), "Running pass");
        let fully_downloaded = message.is_complete();

        for part in parts {
            let Some(kind) = pgp_inline_kind(part) else {
                continue;
            };
            if kind == PgpInlineKind::Signed && !self.process_signed_only {
                debug!(part = %part.id(), "Skipping inline signed-only part");
                continue;
            }

            if !fully_downloaded {
                let error = match kind {
                    PgpInlineKind::Encrypted => CryptoError::OpenPgpEncryptedButIncomplete,
                    PgpInlineKind::Signed => CryptoError::OpenPgpSignedButIncomplete,
                };
                annotations.put(part, CryptoResultAnnotation::error_annotation(error, None));
                continue;
            }

            let Some(provider) = self.provider else {
                if kind == PgpInlineKind::Encrypted {
                    annotations.put(
                        part,
                        CryptoResultAnnotation::error_annotation(
                            CryptoError::OpenPgpEncryptedNoProvider,
                            None,
                        ),
                    );
                }
                continue;
            };

            let mut data = Vec::new();
            let annotation = match part.write_body(&mut data) {
                Ok(()) => into_annotation(part.id(), provider.decrypt(&self.identity, &data), None),
                Err(e) => CryptoResultAnnotation::provider_error(e.to_string(), None),
            };
            annotations.put(part, annotation);
        }
    }
}

/// Body of the data part (child 1) of a complete `multipart/encrypted`.
fn encrypted_payload(part: &Part) -> Option<&[u8]> {
    match part.child(1)?.body() {
        Body::Leaf(data) => Some(data),
        _ => None,
    }
}

/// Bytes a detached signature covers: the part's wire form when the parser
/// kept it, else a canonical `Content-Type` header followed by the body.
fn wire_form(part: &Part) -> Vec<u8> {
    if let Some(raw) = part.raw() {
        return raw.to_vec();
    }
    let mut out = format!("Content-Type: {}\r\n\r\n", part.content_type()).into_bytes();
    if part.write_body(&mut out).is_err() {
        debug!(part = %part.id(), "Signed content has no single body, headers only");
    }
    out
}

fn into_annotation(
    id: PartId,
    result: Result<ProviderOutput, ProviderError>,
    fallback_replacement: Option<Part>,
) -> CryptoResultAnnotation {
    match result {
        Ok(output) => CryptoResultAnnotation::openpgp_result(
            output.decryption,
            output.signature,
            output.plaintext.or(fallback_replacement),
        ),
        Err(ProviderError::Canceled) => {
            debug!(part = %id, "Provider interaction cancelled");
            CryptoResultAnnotation::canceled()
        }
        Err(ProviderError::Api(message)) => {
            warn!(part = %id, error = %message, "Provider returned an error");
            CryptoResultAnnotation::provider_error(message, fallback_replacement)
        }
    }
}

fn empty_part() -> Part {
    Part::leaf(TEXT_PLAIN, Vec::new())
}
