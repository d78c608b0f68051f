//! UIDPLUS `COPYUID` response code (RFC 4315).

use std::collections::BTreeMap;

use tracing::warn;

use crate::imap::response::ImapResponse;
use crate::imap::selected::SelectedState;
use crate::imap::sequence::expand_sequence_set;

/// Source UID to destination UID mapping reported after `UID COPY`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CopyUidResponse {
    pub state: SelectedState,
    pub uid_validity: u64,
    pub uid_mapping: BTreeMap<u64, u64>,
}

impl CopyUidResponse {
    /// Collect every `[COPYUID uidvalidity source-set destination-set]` code
    /// in tagged or untagged status responses. A batched `UID COPY` or a
    /// `UID MOVE` may report several; their mappings are unioned and the
    /// last code's UIDVALIDITY wins, as with [`merge`](Self::merge).
    ///
    /// Codes whose sets do not expand or differ in size are skipped. `None`
    /// when no well-formed code is present.
    pub fn parse(responses: &[ImapResponse]) -> Option<Self> {
        let mut codes = responses.iter().filter_map(copy_uid);
        let (mut uid_validity, mut uid_mapping) = codes.next()?;
        for (validity, mapping) in codes {
            uid_validity = validity;
            uid_mapping.extend(mapping);
        }
        Some(Self {
            state: SelectedState::scan(responses),
            uid_validity,
            uid_mapping,
        })
    }

    /// Union the mappings of a later batch. The later batch wins on
    /// conflicting source UIDs and on the UIDVALIDITY value.
    pub fn merge(&mut self, later: CopyUidResponse) {
        self.state.merge(&later.state);
        self.uid_validity = later.uid_validity;
        self.uid_mapping.extend(later.uid_mapping);
    }
}

fn copy_uid(response: &ImapResponse) -> Option<(u64, BTreeMap<u64, u64>)> {
    if !response.is_status("OK") {
        return None;
    }
    let code = response.response_code()?;
    if code.len() < 4 || !code[0].is_atom("COPYUID") {
        return None;
    }

    let uid_validity = code[1].as_number()?;
    let source = expand_sequence_set(code[2].as_text()?);
    let destination = expand_sequence_set(code[3].as_text()?);
    let (Some(source), Some(destination)) = (source, destination) else {
        warn!("COPYUID sequence set does not expand");
        return None;
    };
    if source.len() != destination.len() {
        warn!(
            source = source.len(),
            destination = destination.len(),
            "COPYUID source and destination sets differ in size"
        );
        return None;
    }

    Some((uid_validity, source.into_iter().zip(destination).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imap::parser::parse_transcript;

    fn parse(transcript: &str) -> Option<CopyUidResponse> {
        CopyUidResponse::parse(&parse_transcript(transcript).expect("parse"))
    }

    #[test]
    fn test_tagged_copyuid() {
        let response = parse("A003 OK [COPYUID 38505 304,319:320 3956:3958] Done\r\n").expect("copyuid");
        assert_eq!(response.uid_validity, 38505);
        assert_eq!(
            response.uid_mapping,
            BTreeMap::from([(304, 3956), (319, 3957), (320, 3958)])
        );
    }

    #[test]
    fn test_untagged_copyuid() {
        let response = parse("* OK [COPYUID 23 1 101] Moved\r\nA1 OK done\r\n").expect("copyuid");
        assert_eq!(response.uid_mapping, BTreeMap::from([(1, 101)]));
    }

    #[test]
    fn test_multiple_codes_in_one_batch() {
        let response = parse(
            "* OK [COPYUID 9 1 11] Moved\r\n* 1 EXPUNGE\r\n* OK [COPYUID 9 2 12] Moved\r\nA1 OK done\r\n",
        )
        .expect("copyuid");
        assert_eq!(response.uid_mapping, BTreeMap::from([(1, 11), (2, 12)]));
        assert_eq!(response.state.expunged, 1);
    }

    #[test]
    fn test_later_code_wins_in_one_batch() {
        let response = parse(
            "* OK [COPYUID 9 1 11] Moved\r\n* OK [COPYUID 10 1:2 21:22] Moved\r\nA1 OK done\r\n",
        )
        .expect("copyuid");
        assert_eq!(response.uid_validity, 10);
        assert_eq!(response.uid_mapping, BTreeMap::from([(1, 21), (2, 22)]));
    }

    #[test]
    fn test_malformed_code_is_skipped() {
        let response = parse("* OK [COPYUID 9 1:2 11] Moved\r\nA1 OK [COPYUID 9 3 13] Done\r\n")
            .expect("copyuid");
        assert_eq!(response.uid_mapping, BTreeMap::from([(3, 13)]));
    }

    #[test]
    fn test_shape_mismatch() {
        assert_eq!(parse("A1 OK [COPYUID 23 1:2 101] Done\r\n"), None);
        assert_eq!(parse("A1 OK [COPYUID 23 1] Done\r\n"), None);
        assert_eq!(parse("A1 OK [COPYUID 23 * 101] Done\r\n"), None);
        assert_eq!(parse("A1 NO [COPYUID 23 1 101] Done\r\n"), None);
        assert_eq!(parse("A1 OK [APPENDUID 23 101] Done\r\n"), None);
        assert_eq!(parse("A1 OK Done\r\n"), None);
    }

    #[test]
    fn test_merge_batches() {
        let mut merged = parse("* 2 EXPUNGE\r\nA1 OK [COPYUID 23 1:2 101:102] Done\r\n").expect("first");
        merged.merge(
            parse("* 1 EXPUNGE\r\n* 8 EXISTS\r\nA2 OK [COPYUID 23 5 105] Done\r\n").expect("second"),
        );
        assert_eq!(
            merged.uid_mapping,
            BTreeMap::from([(1, 101), (2, 102), (5, 105)])
        );
        assert_eq!(merged.state.expunged, 2);
        assert_eq!(merged.state.message_count, Some(8));
    }
}
