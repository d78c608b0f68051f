//! Core data model types: the MIME part tree and account addresses.

pub mod address;
pub mod part;
