//! Integration tests for the IMAP tokenizer and response classifiers.

use std::collections::BTreeMap;
use std::path::Path;

use mimecrypt::error::MimeCryptError;
use mimecrypt::imap::parser::{parse_response_line, parse_transcript};
use mimecrypt::imap::{classify, ClassifiedResponse, CommandKind};

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(path).expect("fixture readable")
}

#[test]
fn test_select_transcript() {
    let responses = parse_transcript(&fixture("select.txt")).expect("parse");
    assert_eq!(responses.len(), 8);

    let Some(ClassifiedResponse::Select(select)) = classify(CommandKind::Select, &responses) else {
        panic!("expected a select response");
    };
    assert!(!select.read_only);
    assert_eq!(select.uid_validity, Some(3_857_529_045));
    assert_eq!(select.state.message_count, Some(172));
    assert_eq!(select.state.uid_next, Some(4392));
    assert!(select.flags.iter().any(|f| f == "\\Draft"));
}

#[test]
fn test_copy_transcript() {
    let responses = parse_transcript(&fixture("copy.txt")).expect("parse");
    let Some(ClassifiedResponse::CopyUid(copy)) = classify(CommandKind::Copy, &responses) else {
        panic!("expected a COPYUID response");
    };
    assert_eq!(copy.uid_validity, 38505);
    assert_eq!(
        copy.uid_mapping,
        BTreeMap::from([(304, 3956), (319, 3957), (320, 3958)])
    );
    assert_eq!(copy.state.expunged, 1);
    assert_eq!(copy.state.uid_next, Some(3959));
}

#[test]
fn test_batched_copy_merge() {
    let first = parse_transcript("A1 OK [COPYUID 9 1:2 11:12] Done\r\n").expect("parse");
    let second = parse_transcript("* 2 EXPUNGE\r\nA2 OK [COPYUID 9 3 13] Done\r\n").expect("parse");

    let Some(ClassifiedResponse::CopyUid(mut merged)) = classify(CommandKind::Copy, &first) else {
        panic!("first batch");
    };
    let Some(ClassifiedResponse::CopyUid(later)) = classify(CommandKind::Copy, &second) else {
        panic!("second batch");
    };
    merged.merge(later);
    assert_eq!(merged.uid_mapping.len(), 3);
    assert_eq!(merged.uid_mapping.get(&3), Some(&13));
    assert_eq!(merged.state.expunged, 1);
}

#[test]
fn test_wrong_kind_is_none() {
    let responses = parse_transcript(&fixture("select.txt")).expect("parse");
    assert_eq!(classify(CommandKind::Copy, &responses), None);
    assert_eq!(classify(CommandKind::Search, &responses), None);
    assert_eq!(classify(CommandKind::Capability, &responses), None);
}

#[test]
fn test_capability_greeting_and_store() {
    let greeting = parse_transcript("* OK [CAPABILITY IMAP4rev1 UIDPLUS MOVE] ready\r\n").expect("parse");
    match classify(CommandKind::Capability, &greeting) {
        Some(ClassifiedResponse::Capability(capabilities)) => {
            assert!(capabilities.has("uidplus"));
            assert!(capabilities.has("MOVE"));
        }
        other => panic!("unexpected {other:?}"),
    }

    let store = parse_transcript("* 7 FETCH (FLAGS (\\Seen) UID 70)\r\nS1 OK STORE done\r\n").expect("parse");
    match classify(CommandKind::Store, &store) {
        Some(ClassifiedResponse::Store(store)) => {
            assert_eq!(store.updates.len(), 1);
            assert_eq!(store.updates[0].uid, Some(70));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_malformed_line_is_an_error() {
    let err = parse_response_line("* 1 FETCH (FLAGS (\\Seen)").expect_err("unterminated");
    assert!(matches!(err, MimeCryptError::ImapParse { line: 1, .. }));
}
