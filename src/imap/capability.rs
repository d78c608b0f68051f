//! `CAPABILITY` data, either as an untagged response or as a response code.

use std::collections::BTreeSet;

use crate::imap::response::{ImapItem, ImapResponse};
use crate::imap::selected::SelectedState;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CapabilityResponse {
    pub state: SelectedState,
    /// Upper-cased capability names.
    pub capabilities: BTreeSet<String>,
}

impl CapabilityResponse {
    /// Collect capabilities from `* CAPABILITY ...` lines and
    /// `[CAPABILITY ...]` codes (as sent in a greeting or after LOGIN).
    /// `None` if no response carries a well-formed capability list.
    pub fn parse(responses: &[ImapResponse]) -> Option<Self> {
        let state = SelectedState::scan(responses);
        let mut capabilities = BTreeSet::new();
        let mut found = false;

        for response in responses {
            if let Some(names) = capability_names(response) {
                capabilities.extend(names);
                found = true;
            }
        }

        found.then_some(Self {
            state,
            capabilities,
        })
    }

    /// Case-insensitive capability check.
    pub fn has(&self, capability: &str) -> bool {
        self.capabilities.contains(&capability.to_ascii_uppercase())
    }

    pub fn merge(&mut self, later: CapabilityResponse) {
        self.state.merge(&later.state);
        self.capabilities.extend(later.capabilities);
    }
}

fn capability_names(response: &ImapResponse) -> Option<Vec<String>> {
    let items: &[ImapItem] = if !response.is_tagged()
        && !response.continuation
        && response.starts_with("CAPABILITY")
    {
        &response.items
    } else {
        response
            .response_code()
            .filter(|code| code.first().is_some_and(|item| item.is_atom("CAPABILITY")))?
    };

    // Every name must be an atom; anything else is not a capability list.
    items[1..]
        .iter()
        .map(|item| match item {
            ImapItem::Atom(name) => Some(name.to_ascii_uppercase()),
            _ => None,
        })
        .collect()
}
