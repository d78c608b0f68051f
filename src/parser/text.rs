//! Bounded text extraction from leaf parts.

use crate::model::part::{Body, Part};
use crate::parser::header::decode_charset;

/// Longest byte sequence a single decoded character can come from.
const MAX_BYTES_PER_CHAR: usize = 4;

/// Decode at most `max_chars` characters of a leaf part's text, honoring
/// its charset (UTF-8 when none is declared).
///
/// Only a prefix of the body is decoded, so classifying a large part stays
/// cheap. Returns `None` for multipart parts and bodies that were not
/// downloaded.
pub fn get_text_from_part(part: &Part, max_chars: usize) -> Option<String> {
    let Body::Leaf(data) = part.body() else {
        return None;
    };

    let limit = data.len().min(max_chars.saturating_mul(MAX_BYTES_PER_CHAR));
    let charset = part.charset().unwrap_or_else(|| "utf-8".to_string());
    let decoded = decode_charset(&charset, &data[..limit]);

    Some(decoded.chars().take(max_chars).collect())
}
