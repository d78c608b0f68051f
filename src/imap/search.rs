//! Untagged `SEARCH` results.

use crate::imap::response::ImapResponse;
use crate::imap::selected::SelectedState;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SearchResponse {
    pub state: SelectedState,
    /// Message numbers or UIDs, in the order the server sent them.
    pub numbers: Vec<u64>,
}

impl SearchResponse {
    /// Collect the numbers of every `* SEARCH ...` line. Tokens that are not
    /// numbers (such as a `(MODSEQ n)` suffix) are skipped. `None` if there
    /// is no `SEARCH` line at all.
    pub fn parse(responses: &[ImapResponse]) -> Option<Self> {
        let mut lines = responses
            .iter()
            .filter(|r| !r.is_tagged() && !r.continuation && r.starts_with("SEARCH"))
            .peekable();
        lines.peek()?;

        let numbers = lines
            .flat_map(|r| r.items[1..].iter().filter_map(|item| item.as_number()))
            .collect();

        Some(Self {
            state: SelectedState::scan(responses),
            numbers,
        })
    }

    pub fn merge(&mut self, later: SearchResponse) {
        self.state.merge(&later.state);
        self.numbers.extend(later.numbers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imap::parser::parse_transcript;

    fn parse(transcript: &str) -> Option<SearchResponse> {
        SearchResponse::parse(&parse_transcript(transcript).expect("parse"))
    }

    #[test]
    fn test_search_hits() {
        let response = parse("* SEARCH 2 84 882\r\nA1 OK SEARCH completed\r\n").expect("search");
        assert_eq!(response.numbers, vec![2, 84, 882]);
    }

    #[test]
    fn test_empty_search_and_skipped_tokens() {
        assert_eq!(parse("* SEARCH\r\nA1 OK\r\n").map(|r| r.numbers), Some(vec![]));
        assert_eq!(
            parse("* SEARCH 4 x 9 (MODSEQ 917162500)\r\n").map(|r| r.numbers),
            Some(vec![4, 9])
        );
    }

    #[test]
    fn test_no_search_line() {
        assert_eq!(parse("A1 OK SEARCH completed\r\n"), None);
        assert_eq!(parse("A1 SEARCH 1 2\r\n"), None);
    }

    #[test]
    fn test_multiple_lines_and_merge() {
        let mut response = parse("* SEARCH 1\r\n* 4 EXISTS\r\n* SEARCH 3\r\n").expect("search");
        assert_eq!(response.numbers, vec![1, 3]);
        response.merge(parse("* SEARCH 7\r\n").expect("search"));
        assert_eq!(response.numbers, vec![1, 3, 7]);
        assert_eq!(response.state.message_count, Some(4));
    }
}
