//! Message parsing: raw bytes to part tree, header parameters, and bounded
//! text extraction.

pub mod eml;
pub mod header;
pub mod mime;
pub mod text;
