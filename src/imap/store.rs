//! Acknowledgment of a `STORE` / `UID STORE` command.

use crate::imap::response::{ImapItem, ImapResponse};
use crate::imap::selected::SelectedState;

/// Flags of one message as echoed by an untagged `FETCH`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FlagUpdate {
    pub sequence: u64,
    pub uid: Option<u64>,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreResponse {
    pub state: SelectedState,
    pub updates: Vec<FlagUpdate>,
}

impl StoreResponse {
    /// `None` unless the batch ends in a tagged `OK`; a `STORE` that was
    /// refused (`NO`/`BAD`) is not an acknowledgment.
    pub fn parse(responses: &[ImapResponse]) -> Option<Self> {
        let completion = responses.iter().rev().find(|r| r.is_tagged())?;
        if !completion.is_status("OK") {
            return None;
        }

        let updates = responses.iter().filter_map(flag_update).collect();
        Some(Self {
            state: SelectedState::scan(responses),
            updates,
        })
    }

    pub fn merge(&mut self, later: StoreResponse) {
        self.state.merge(&later.state);
        self.updates.extend(later.updates);
    }
}

/// `* n FETCH (... FLAGS (...) ...)`
fn flag_update(response: &ImapResponse) -> Option<FlagUpdate> {
    if response.is_tagged() || response.continuation {
        return None;
    }
    let [sequence, kind, attributes] = response.items.as_slice() else {
        return None;
    };
    if !kind.is_atom("FETCH") {
        return None;
    }
    let sequence = sequence.as_number()?;
    let attributes = attributes.as_list()?;

    let mut uid = None;
    let mut flags = None;
    for pair in attributes.chunks(2) {
        match pair {
            [name, value] if name.is_atom("UID") => uid = value.as_number(),
            [name, ImapItem::List(values)] if name.is_atom("FLAGS") => {
                flags = values
                    .iter()
                    .map(|flag| flag.as_text().map(str::to_string))
                    .collect::<Option<Vec<_>>>();
            }
            _ => {}
        }
    }

    Some(FlagUpdate {
        sequence,
        uid,
        flags: flags?,
    })
}
