//! Crypto structure detection over a [`Part`] tree.
//!
//! Locates OpenPGP/MIME (RFC 1847 / RFC 3156) `multipart/encrypted` and
//! `multipart/signed` parts, inline PGP blocks in `text/plain` and legacy
//! mutt-style `application/pgp` leaves, and the ordinary attachments that
//! travel beside the crypto payload in a `multipart/mixed` envelope.
//!
//! Nothing here fails on malformed, empty or partially downloaded input:
//! a missing match is `None` or an empty list. The only panics are the
//! documented precondition checks of the `*_openpgp_protocol` functions.

use tracing::trace;

use crate::crypto::annotations::CryptoAnnotations;
use crate::error::Result;
use crate::model::part::Part;
use crate::parser::header::get_header_parameter;
use crate::parser::text::get_text_from_part;

pub const MULTIPART_ENCRYPTED: &str = "multipart/encrypted";
pub const MULTIPART_SIGNED: &str = "multipart/signed";
pub const MULTIPART_MIXED: &str = "multipart/mixed";
pub const MULTIPART_ALTERNATIVE: &str = "multipart/alternative";
pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_PGP: &str = "application/pgp";
pub const APPLICATION_PGP_ENCRYPTED: &str = "application/pgp-encrypted";
pub const APPLICATION_PGP_SIGNATURE: &str = "application/pgp-signature";
pub const PROTOCOL_PARAMETER: &str = "protocol";

const PGP_INLINE_START_MARKER: &str = "-----BEGIN PGP MESSAGE-----";
const PGP_INLINE_SIGNED_START_MARKER: &str = "-----BEGIN PGP SIGNED MESSAGE-----";

/// Characters decoded to look for an inline marker: room for the longer
/// marker plus a little leading whitespace.
const TEXT_LENGTH_FOR_INLINE_CHECK: usize = 36;

/// Which inline PGP marker a leaf starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PgpInlineKind {
    /// `-----BEGIN PGP MESSAGE-----`
    Encrypted,
    /// `-----BEGIN PGP SIGNED MESSAGE-----`
    Signed,
}

/// Structural crypto shape of a single part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CryptoShape {
    MultipartEncrypted,
    MultipartSigned,
    PgpInline(PgpInlineKind),
}

impl CryptoShape {
    pub fn label(self) -> &'static str {
        match self {
            CryptoShape::MultipartEncrypted => "multipart/encrypted",
            CryptoShape::MultipartSigned => "multipart/signed",
            CryptoShape::PgpInline(PgpInlineKind::Encrypted) => "pgp-inline encrypted",
            CryptoShape::PgpInline(PgpInlineKind::Signed) => "pgp-inline signed",
        }
    }
}

/// Classify `part` by its own structure, without looking at descendants
/// beyond the two direct children of a multipart/encrypted or
/// multipart/signed body.
pub fn classify_part(part: &Part) -> Option<CryptoShape> {
    if is_part_multipart_encrypted(part) {
        Some(CryptoShape::MultipartEncrypted)
    } else if is_part_multipart_signed(part) {
        Some(CryptoShape::MultipartSigned)
    } else {
        pgp_inline_kind(part).map(CryptoShape::PgpInline)
    }
}

/// Find the part that carries the message's crypto payload.
///
/// Only three conservative shapes are searched:
/// - `part` itself is encrypted or signed;
/// - `part` is `multipart/alternative` whose first alternative is inline PGP;
/// - `part` is `multipart/mixed` whose first child is either of the above.
///
/// In the mixed case every later child is appended, in order, to
/// `out_extra_parts`.
pub fn find_primary_encrypted_or_signed_part<'a>(
    part: &'a Part,
    out_extra_parts: &mut Vec<&'a Part>,
) -> Option<&'a Part> {
    if is_part_encrypted_or_signed(part) {
        return Some(part);
    }

    if let Some(found) = find_primary_part_in_alternative(part) {
        return Some(found);
    }

    find_primary_part_in_mixed(part, out_extra_parts)
}

fn find_primary_part_in_mixed<'a>(
    part: &'a Part,
    out_extra_parts: &mut Vec<&'a Part>,
) -> Option<&'a Part> {
    if !part.is_mime_type(MULTIPART_MIXED) {
        return None;
    }
    let (first, rest) = part.children().split_first()?;

    let found = if is_part_encrypted_or_signed(first) {
        Some(first)
    } else {
        find_primary_part_in_alternative(first)
    }?;

    trace!(part = %found.id(), extra = rest.len(), "Primary crypto part inside multipart/mixed");
    out_extra_parts.extend(rest.iter());
    Some(found)
}

fn find_primary_part_in_alternative(part: &Part) -> Option<&Part> {
    if !part.is_mime_type(MULTIPART_ALTERNATIVE) {
        return None;
    }
    // Only the first alternative is trusted; later ones are usually an
    // HTML restatement of the same text.
    part.child(0)
        .filter(|first| is_part_pgp_inline_encrypted_or_signed(first))
}

/// Every `multipart/encrypted` part in the tree, in document order.
pub fn find_multipart_encrypted_parts(start: &Part) -> Vec<&Part> {
    collect_matching(start, None, is_part_multipart_encrypted)
}

/// Every `multipart/signed` part in the tree, in document order.
///
/// Parts that already carry an annotation with replacement data are
/// replaced by that data before being tested or descended into.
pub fn find_multipart_signed_parts<'a>(
    start: &'a Part,
    annotations: &'a CryptoAnnotations,
) -> Vec<&'a Part> {
    collect_matching(start, Some(annotations), is_part_multipart_signed)
}

/// Every inline PGP part (encrypted or signed) in the tree, in document order.
pub fn find_pgp_inline_parts(start: &Part) -> Vec<&Part> {
    collect_matching(start, None, is_part_pgp_inline_encrypted_or_signed)
}

/// Depth-first search with an explicit stack. Matching parts are reported
/// and not expanded further.
fn collect_matching<'a>(
    start: &'a Part,
    annotations: Option<&'a CryptoAnnotations>,
    matches: fn(&Part) -> bool,
) -> Vec<&'a Part> {
    let mut found = Vec::new();
    let mut stack: Vec<&'a Part> = vec![start];

    while let Some(mut part) = stack.pop() {
        if let Some(replacement) = annotations
            .and_then(|a| a.get(part))
            .and_then(|annotation| annotation.replacement_data())
        {
            trace!(original = %part.id(), replacement = %replacement.id(), "Using replacement part");
            part = replacement;
        }

        if matches(part) {
            found.push(part);
            continue;
        }

        stack.extend(part.children().iter().rev());
    }

    found
}

/// The raw bytes of the detached signature of a `multipart/signed` part.
///
/// Returns `Ok(None)` when `part` is not multipart/signed or the signature
/// body has not been downloaded; an error only if the body cannot be
/// written out.
pub fn get_signature_data(part: &Part) -> Result<Option<Vec<u8>>> {
    if !is_part_multipart_signed(part) {
        return Ok(None);
    }
    let Some(signature_part) = part.child(1) else {
        return Ok(None);
    };
    if signature_part.is_body_missing() {
        return Ok(None);
    }

    let mut sink = Vec::new();
    signature_part.write_body(&mut sink)?;
    Ok(Some(sink))
}

/// `multipart/encrypted`, `multipart/signed`, or inline PGP.
pub fn is_part_encrypted_or_signed(part: &Part) -> bool {
    classify_part(part).is_some()
}

/// RFC 1847 `multipart/encrypted`: exactly two children, the `protocol`
/// parameter naming the control part (child 0).
///
/// Without a `protocol` parameter the part still matches when the data part
/// (child 1) has not been downloaded. A present but different protocol never
/// matches.
pub fn is_part_multipart_encrypted(part: &Part) -> bool {
    is_two_part_multipart(part, MULTIPART_ENCRYPTED, 0, 1)
}

/// RFC 1847 `multipart/signed`: exactly two children, the `protocol`
/// parameter naming the signature part (child 1).
///
/// Without a `protocol` parameter the part still matches when the signed
/// content (child 0) has not been downloaded.
pub fn is_part_multipart_signed(part: &Part) -> bool {
    is_two_part_multipart(part, MULTIPART_SIGNED, 1, 0)
}

fn is_two_part_multipart(
    part: &Part,
    mime_type: &str,
    protocol_child: usize,
    tolerated_child: usize,
) -> bool {
    if !part.is_mime_type(mime_type) {
        return false;
    }
    let children = part.children();
    if children.len() != 2 {
        return false;
    }

    match get_header_parameter(part.content_type(), PROTOCOL_PARAMETER) {
        Some(protocol) => children[protocol_child].is_mime_type(&protocol),
        None => children[tolerated_child].is_body_missing(),
    }
}

/// `true` if the `multipart/encrypted` part declares the OpenPGP protocol.
///
/// # Panics
///
/// If `part` is not `multipart/encrypted`; callers must check the shape first.
pub fn is_multipart_encrypted_openpgp_protocol(part: &Part) -> bool {
    assert!(
        part.is_mime_type(MULTIPART_ENCRYPTED),
        "part {} must be {MULTIPART_ENCRYPTED}, got {}",
        part.id(),
        part.mime_type()
    );
    has_protocol(part, APPLICATION_PGP_ENCRYPTED)
}

/// `true` if the `multipart/signed` part declares the OpenPGP protocol.
///
/// # Panics
///
/// If `part` is not `multipart/signed`; callers must check the shape first.
pub fn is_multipart_signed_openpgp_protocol(part: &Part) -> bool {
    assert!(
        part.is_mime_type(MULTIPART_SIGNED),
        "part {} must be {MULTIPART_SIGNED}, got {}",
        part.id(),
        part.mime_type()
    );
    has_protocol(part, APPLICATION_PGP_SIGNATURE)
}

fn has_protocol(part: &Part, expected: &str) -> bool {
    get_header_parameter(part.content_type(), PROTOCOL_PARAMETER)
        .is_some_and(|protocol| protocol.trim().eq_ignore_ascii_case(expected))
}

/// Inline PGP, either encrypted or signed-only.
pub fn is_part_pgp_inline_encrypted_or_signed(part: &Part) -> bool {
    pgp_inline_kind(part).is_some()
}

/// Inline PGP encrypted only; signed-only blocks do not count.
pub fn is_part_pgp_inline_encrypted(part: &Part) -> bool {
    pgp_inline_kind(part) == Some(PgpInlineKind::Encrypted)
}

/// The inline marker a `text/plain` or `application/pgp` leaf starts with,
/// ignoring leading whitespace.
pub fn pgp_inline_kind(part: &Part) -> Option<PgpInlineKind> {
    if !part.is_mime_type(TEXT_PLAIN) && !part.is_mime_type(APPLICATION_PGP) {
        return None;
    }

    let text = get_text_from_part(part, TEXT_LENGTH_FOR_INLINE_CHECK)?;
    let text = text.trim_start();
    if text.starts_with(PGP_INLINE_START_MARKER) {
        Some(PgpInlineKind::Encrypted)
    } else if text.starts_with(PGP_INLINE_SIGNED_START_MARKER) {
        Some(PgpInlineKind::Signed)
    } else {
        None
    }
}
