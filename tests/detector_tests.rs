//! Integration tests for message parsing, crypto structure detection and
//! the multi-pass crypto helper.

use std::path::Path;

use mimecrypt::crypto::annotations::{CryptoAnnotations, CryptoError};
use mimecrypt::crypto::detector::{
    find_multipart_encrypted_parts, find_multipart_signed_parts, find_pgp_inline_parts,
    find_primary_encrypted_or_signed_part, get_signature_data, is_multipart_encrypted_openpgp_protocol,
    is_part_pgp_inline_encrypted, is_part_pgp_inline_encrypted_or_signed,
};
use mimecrypt::crypto::helper::CryptoHelper;
use mimecrypt::crypto::provider::CryptoProvider;
use mimecrypt::model::part::{format_path, Part};
use mimecrypt::parser::eml::load_message;
use mimecrypt::parser::mime::ParseOptions;

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(name: &str) -> Part {
    load_message(fixture(name), ParseOptions::default()).expect("fixture parses")
}

fn path_of(root: &Part, part: &Part) -> String {
    format_path(&root.path_of(part.id()).expect("part is in the tree"))
}

// ─── PGP/MIME encrypted message is its own primary part ─────────────

#[test]
fn test_encrypted_message_primary_part() {
    let message = load("encrypted.eml");
    let mut extras = Vec::new();

    let primary = find_primary_encrypted_or_signed_part(&message, &mut extras).expect("primary");
    assert_eq!(primary.id(), message.id());
    assert!(extras.is_empty());
    assert!(is_multipart_encrypted_openpgp_protocol(primary));
    assert_eq!(find_multipart_encrypted_parts(&message).len(), 1);
}

// ─── Signed part inside multipart/mixed, attachment reported as extra ─

#[test]
fn test_signed_in_mixed_envelope() {
    let message = load("signed_mixed.eml");
    let mut extras = Vec::new();

    let primary = find_primary_encrypted_or_signed_part(&message, &mut extras).expect("primary");
    assert_eq!(primary.mime_type(), "multipart/signed");
    assert_eq!(path_of(&message, primary), "1");
    assert_eq!(extras.len(), 1);
    assert_eq!(extras[0].mime_type(), "application/pdf");

    let annotations = CryptoAnnotations::new();
    let signed = find_multipart_signed_parts(&message, &annotations);
    assert_eq!(signed.len(), 1);
    assert_eq!(signed[0].id(), primary.id());
}

// ─── Detached signature bytes ───────────────────────────────────────

#[test]
fn test_signature_data_and_raw_signed_content() {
    let message = load("signed_mixed.eml");
    let signed = &message.children()[0];

    let signature = get_signature_data(signed).expect("readable").expect("present");
    let text = String::from_utf8_lossy(&signature);
    assert!(text.starts_with("-----BEGIN PGP SIGNATURE-----"));
    assert!(text.contains("-----END PGP SIGNATURE-----"));

    let raw = signed.children()[0].raw().expect("signed content keeps its wire form");
    let raw = String::from_utf8_lossy(raw);
    assert!(raw.starts_with("Content-Type: text/plain; charset=utf-8"));
    assert!(raw.contains("Report attached."));

    assert_eq!(get_signature_data(&message).expect("readable"), None);
}

// ─── Inline signed-only text ────────────────────────────────────────

#[test]
fn test_inline_signed_message() {
    let message = load("inline_signed.eml");
    assert!(is_part_pgp_inline_encrypted_or_signed(&message));
    assert!(!is_part_pgp_inline_encrypted(&message));
    assert_eq!(find_pgp_inline_parts(&message).len(), 1);

    let mut extras = Vec::new();
    let primary = find_primary_encrypted_or_signed_part(&message, &mut extras);
    assert_eq!(primary.map(Part::id), Some(message.id()));
}

// ─── Only the first alternative is eligible ─────────────────────────

#[test]
fn test_pgp_in_second_alternative_is_not_primary() {
    let message = load("alternative_second.eml");
    let mut extras = Vec::new();
    assert!(find_primary_encrypted_or_signed_part(&message, &mut extras).is_none());
    // The exhaustive search still finds the text/plain block; HTML never counts.
    let inline = find_pgp_inline_parts(&message);
    assert_eq!(inline.len(), 1);
    assert_eq!(inline[0].mime_type(), "text/plain");
}

// ─── Partial download tolerance ─────────────────────────────────────

#[test]
fn test_partial_download_tolerance() {
    let full = load("partial_encrypted.eml");
    assert!(find_multipart_encrypted_parts(&full).is_empty());

    let partial = load_message(
        fixture("partial_encrypted.eml"),
        ParseOptions {
            partial_download: true,
        },
    )
    .expect("parse");
    assert!(!partial.is_complete());
    assert_eq!(find_multipart_encrypted_parts(&partial).len(), 1);
}

// ─── Helper without a provider ──────────────────────────────────────

#[test]
fn test_helper_without_provider() {
    let message = load("encrypted.eml");
    let annotations =
        CryptoHelper::<dyn CryptoProvider>::new(None, "<bob@example.com>", false).run(&message);
    assert_eq!(
        annotations.get(&message).map(|a| a.error_type()),
        Some(CryptoError::OpenPgpEncryptedNoProvider)
    );

    let signed = load("signed_mixed.eml");
    let annotations = CryptoHelper::<dyn CryptoProvider>::new(None, "<bob@example.com>", true).run(&signed);
    assert!(annotations.is_empty());
}

#[test]
fn test_helper_marks_partial_encrypted_incomplete() {
    let message = load_message(
        fixture("partial_encrypted.eml"),
        ParseOptions {
            partial_download: true,
        },
    )
    .expect("parse");
    let annotations = CryptoHelper::<dyn CryptoProvider>::new(None, "<bob@example.com>", false).run(&message);
    let annotation = annotations.get(&message).expect("annotated");
    assert_eq!(annotation.error_type(), CryptoError::OpenPgpEncryptedButIncomplete);
    assert!(annotation.has_replacement_data());
}
