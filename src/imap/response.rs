//! Tokenized IMAP server responses.

/// One token of a server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImapItem {
    /// Bare atom or number.
    Atom(String),
    /// Quoted string, or the free-form text after a status response.
    Str(String),
    /// `{n}` literal payload.
    Literal(Vec<u8>),
    Nil,
    /// Parenthesised list or bracketed response code.
    List(Vec<ImapItem>),
}

impl ImapItem {
    /// Text of an atom or string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ImapItem::Atom(s) | ImapItem::Str(s) => Some(s),
            ImapItem::Literal(_) | ImapItem::Nil | ImapItem::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ImapItem]> {
        match self {
            ImapItem::List(items) => Some(items),
            _ => None,
        }
    }

    /// An atom or string equal to `name`, ignoring ASCII case.
    pub fn is_atom(&self, name: &str) -> bool {
        self.as_text().is_some_and(|s| s.eq_ignore_ascii_case(name))
    }

    /// An atom holding an unsigned decimal number.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            ImapItem::Atom(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                s.parse().ok()
            }
            _ => None,
        }
    }
}

/// A single response: untagged (`*`), tagged, or a continuation request (`+`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImapResponse {
    pub tag: Option<String>,
    pub continuation: bool,
    pub items: Vec<ImapItem>,
}

impl ImapResponse {
    pub fn is_tagged(&self) -> bool {
        self.tag.is_some()
    }

    pub fn item(&self, index: usize) -> Option<&ImapItem> {
        self.items.get(index)
    }

    /// The first item is the atom `name`, e.g. `SEARCH` or `CAPABILITY`.
    pub fn starts_with(&self, name: &str) -> bool {
        self.item(0).is_some_and(|item| item.is_atom(name))
    }

    /// The first item is the status atom `status` (`OK`, `NO`, ...).
    pub fn is_status(&self, status: &str) -> bool {
        is_status_atom(status) && self.starts_with(status)
    }

    /// The bracketed response code of a status response, e.g. the
    /// `[UIDNEXT 5]` in `* OK [UIDNEXT 5] Predicted next UID`.
    pub fn response_code(&self) -> Option<&[ImapItem]> {
        let status = self.item(0)?.as_text()?;
        if !is_status_atom(status) {
            return None;
        }
        self.item(1)?.as_list()
    }

    /// Untagged `n NAME` data such as `* 23 EXISTS`.
    pub fn numbered(&self, name: &str) -> Option<u64> {
        if self.is_tagged() || self.continuation {
            return None;
        }
        match self.items.as_slice() {
            [number, kind, ..] if kind.is_atom(name) => number.as_number(),
            _ => None,
        }
    }
}

/// Status atoms whose remaining text is free-form (RFC 3501 `resp-text`).
pub fn is_status_atom(symbol: &str) -> bool {
    ["OK", "NO", "BAD", "PREAUTH", "BYE"]
        .iter()
        .any(|status| symbol.eq_ignore_ascii_case(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(s: &str) -> ImapItem {
        ImapItem::Atom(s.to_string())
    }

    #[test]
    fn test_response_code() {
        let response = ImapResponse {
            tag: None,
            continuation: false,
            items: vec![
                atom("OK"),
                ImapItem::List(vec![atom("UIDNEXT"), atom("5")]),
                ImapItem::Str("Predicted".into()),
            ],
        };
        let code = response.response_code().expect("code");
        assert!(code[0].is_atom("uidnext"));
        assert_eq!(code[1].as_number(), Some(5));
    }

    #[test]
    fn test_numbered() {
        let response = ImapResponse {
            tag: None,
            continuation: false,
            items: vec![atom("23"), atom("EXISTS")],
        };
        assert_eq!(response.numbered("exists"), Some(23));
        assert_eq!(response.numbered("EXPUNGE"), None);

        let tagged = ImapResponse {
            tag: Some("A1".into()),
            ..response
        };
        assert_eq!(tagged.numbered("EXISTS"), None);
    }

    #[test]
    fn test_as_number_rejects_signs() {
        assert_eq!(atom("+5").as_number(), None);
        assert_eq!(atom("").as_number(), None);
        assert_eq!(ImapItem::Str("5".into()).as_number(), None);
    }
}
