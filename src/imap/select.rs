//! Completion of `SELECT` / `EXAMINE`.

use crate::imap::response::ImapResponse;
use crate::imap::selected::SelectedState;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SelectResponse {
    pub state: SelectedState,
    /// `[READ-ONLY]` on the tagged completion. Servers that send neither
    /// `READ-ONLY` nor `READ-WRITE` grant write access.
    pub read_only: bool,
    pub uid_validity: Option<u64>,
    /// `* FLAGS (...)`
    pub flags: Vec<String>,
}

impl SelectResponse {
    /// `None` unless the batch ends in a tagged `OK`.
    pub fn parse(responses: &[ImapResponse]) -> Option<Self> {
        let completion = responses.iter().rev().find(|r| r.is_tagged())?;
        if !completion.is_status("OK") {
            return None;
        }

        let read_only = completion
            .response_code()
            .and_then(|code| code.first())
            .is_some_and(|name| name.is_atom("READ-ONLY"));

        let mut uid_validity = None;
        let mut flags = Vec::new();
        for response in responses.iter().filter(|r| !r.is_tagged() && !r.continuation) {
            if let Some([name, value, ..]) = response.response_code() {
                if name.is_atom("UIDVALIDITY") {
                    uid_validity = value.as_number().or(uid_validity);
                }
            } else if let Some([_, list, ..]) = response
                .starts_with("FLAGS")
                .then_some(response.items.as_slice())
            {
                if let Some(values) = list.as_list() {
                    flags = values
                        .iter()
                        .filter_map(|flag| flag.as_text().map(str::to_string))
                        .collect();
                }
            }
        }

        Some(Self {
            state: SelectedState::scan(responses),
            read_only,
            uid_validity,
            flags,
        })
    }

    /// A later completion replaces this one; counters still add up.
    pub fn merge(&mut self, later: SelectResponse) {
        self.state.merge(&later.state);
        self.read_only = later.read_only;
        self.uid_validity = later.uid_validity.or(self.uid_validity);
        if !later.flags.is_empty() {
            self.flags = later.flags;
        }
    }
}
