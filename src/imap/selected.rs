//! Mailbox state updates that may ride along with any command's responses.

use crate::imap::response::ImapResponse;

/// Untagged `EXISTS`/`EXPUNGE` data and the `UIDNEXT` hint seen in a batch
/// of responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SelectedState {
    /// Last `* n EXISTS`.
    pub message_count: Option<u64>,
    /// Number of `* n EXPUNGE` responses.
    pub expunged: u64,
    /// Last `* OK [UIDNEXT n]`.
    pub uid_next: Option<u64>,
}

impl SelectedState {
    /// Scan `responses` in order. Every typed response calls this first.
    pub fn scan(responses: &[ImapResponse]) -> Self {
        let mut state = Self::default();

        for response in responses {
            if let Some(count) = response.numbered("EXISTS") {
                state.message_count = Some(count);
            } else if response.numbered("EXPUNGE").is_some() {
                state.expunged += 1;
            } else if let Some(uid_next) = uid_next(response) {
                state.uid_next = Some(uid_next);
            }
        }

        state
    }

    /// Combine with the state of a later batch: expunges add up, the later
    /// batch's scalars win where present.
    pub fn merge(&mut self, later: &SelectedState) {
        self.expunged += later.expunged;
        if later.message_count.is_some() {
            self.message_count = later.message_count;
        }
        if later.uid_next.is_some() {
            self.uid_next = later.uid_next;
        }
    }
}

fn uid_next(response: &ImapResponse) -> Option<u64> {
    if response.is_tagged() || !response.is_status("OK") {
        return None;
    }
    match response.response_code()? {
        [name, value, ..] if name.is_atom("UIDNEXT") => value.as_number(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imap::parser::parse_transcript;

    #[test]
    fn test_scan() {
        let responses = parse_transcript(
            "* 17 EXISTS\r\n\
             * 3 EXPUNGE\r\n\
             * 3 EXPUNGE\r\n\
             * OK [UIDNEXT 4392] Predicted next UID\r\n\
             * 15 EXISTS\r\n\
             A1 OK [UIDNEXT 1] tagged codes are not hints\r\n",
        )
        .expect("parse");
        let state = SelectedState::scan(&responses);
        assert_eq!(
            state,
            SelectedState {
                message_count: Some(15),
                expunged: 2,
                uid_next: Some(4392),
            }
        );
    }

    #[test]
    fn test_scan_empty() {
        assert_eq!(SelectedState::scan(&[]), SelectedState::default());
    }

    #[test]
    fn test_merge() {
        let mut first = SelectedState {
            message_count: Some(10),
            expunged: 1,
            uid_next: Some(50),
        };
        first.merge(&SelectedState {
            message_count: Some(9),
            expunged: 2,
            uid_next: None,
        });
        assert_eq!(
            first,
            SelectedState {
                message_count: Some(9),
                expunged: 3,
                uid_next: Some(50),
            }
        );
    }
}
