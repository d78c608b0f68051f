//! Loading individual `.eml` files (RFC 5322 messages, optionally with an
//! mbox `From ` line) into a part tree.

use std::path::Path;

use crate::error::{MimeCryptError, Result};
use crate::model::part::Part;
use crate::parser::mime::{parse_message, ParseOptions};

/// Read a message file and parse it into a [`Part`] tree.
pub fn load_message(path: impl AsRef<Path>, options: ParseOptions) -> Result<Part> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MimeCryptError::FileNotFound(path.to_path_buf())
        } else {
            MimeCryptError::io(path, e)
        }
    })?;

    tracing::debug!(path = %path.display(), bytes = data.len(), "Loaded message file");
    parse_message(&data, options)
}
