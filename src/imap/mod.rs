//! Typed views of IMAP server response batches.
//!
//! A batch is every response received for one command, tagged completion
//! included. Each response kind scans the batch once: [`SelectedState::scan`]
//! first, then its own extraction. A batch that does not have the expected
//! shape yields `None`.

pub mod capability;
pub mod copy_uid;
pub mod parser;
pub mod response;
pub mod search;
pub mod select;
pub mod selected;
pub mod sequence;
pub mod store;

use tracing::debug;

use capability::CapabilityResponse;
use copy_uid::CopyUidResponse;
use response::ImapResponse;
use search::SearchResponse;
use select::SelectResponse;
use selected::SelectedState;
use store::StoreResponse;

/// The command a batch of responses answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CommandKind {
    Capability,
    /// `UID COPY` / `UID MOVE`
    Copy,
    Search,
    Store,
    /// `SELECT` or `EXAMINE`
    Select,
}

/// A response batch classified by the command it answers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedResponse {
    Capability(CapabilityResponse),
    CopyUid(CopyUidResponse),
    Search(SearchResponse),
    Store(StoreResponse),
    Select(SelectResponse),
}

impl ClassifiedResponse {
    pub fn state(&self) -> &SelectedState {
        match self {
            ClassifiedResponse::Capability(r) => &r.state,
            ClassifiedResponse::CopyUid(r) => &r.state,
            ClassifiedResponse::Search(r) => &r.state,
            ClassifiedResponse::Store(r) => &r.state,
            ClassifiedResponse::Select(r) => &r.state,
        }
    }
}

/// Extract the typed response for `kind` from `responses`.
pub fn classify(kind: CommandKind, responses: &[ImapResponse]) -> Option<ClassifiedResponse> {
    let classified = match kind {
        CommandKind::Capability => CapabilityResponse::parse(responses).map(ClassifiedResponse::Capability),
        CommandKind::Copy => CopyUidResponse::parse(responses).map(ClassifiedResponse::CopyUid),
        CommandKind::Search => SearchResponse::parse(responses).map(ClassifiedResponse::Search),
        CommandKind::Store => StoreResponse::parse(responses).map(ClassifiedResponse::Store),
        CommandKind::Select => SelectResponse::parse(responses).map(ClassifiedResponse::Select),
    };
    debug!(?kind, matched = classified.is_some(), responses = responses.len(), "Classified responses");
    classified
}
