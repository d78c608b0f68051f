//! Raw RFC 5322 message → [`Part`] tree.

use std::collections::{HashMap, HashSet};

use mail_parser::{MessageParser, MimeHeaders, PartType};
use tracing::{debug, trace};

use crate::error::{MimeCryptError, Result};
use crate::model::part::Part;
use crate::parser::header::{decode_header_bytes, get_header, unfold_headers};

/// Options controlling how a raw message becomes a part tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// The message was only partially downloaded: zero-length leaf bodies
    /// are treated as not fetched instead of empty.
    pub partial_download: bool,
}

/// Parse a complete raw message (headers + body) into a part tree.
///
/// A leading mbox `From ` line and a UTF-8 BOM are skipped. Leaf bodies are
/// transfer-decoded; text leaves are transcoded to UTF-8 by `mail-parser`
/// and tagged with that charset. Embedded `message/rfc822` parts stay
/// leaves holding the raw embedded message.
pub fn parse_message(raw_message: &[u8], options: ParseOptions) -> Result<Part> {
    let message_bytes = skip_from_line(raw_message);

    let parser = MessageParser::default();
    let msg = parser
        .parse(message_bytes)
        .ok_or_else(|| MimeCryptError::MimeError("Failed to parse message".into()))?;

    // Post-order over mail-parser's flat part list, without recursion.
    let mut built: HashMap<usize, Part> = HashMap::new();
    let mut stack: Vec<(usize, bool)> = vec![(0, false)];
    // Children of multipart/signed keep their wire form for detached verification.
    let mut keep_raw: HashSet<usize> = HashSet::new();

    while let Some((id, expanded)) = stack.pop() {
        let mime_part = msg.parts.get(id).ok_or_else(|| {
            MimeCryptError::MimeError(format!("Dangling part reference {id}"))
        })?;
        let content_type = raw_content_type(message_bytes, mime_part);

        let part = match &mime_part.body {
            PartType::Multipart(children) if !expanded => {
                if is_multipart_signed(&content_type) {
                    keep_raw.extend(children.iter().copied());
                }
                stack.push((id, true));
                for &child in children.iter().rev() {
                    stack.push((child, false));
                }
                continue;
            }
            PartType::Multipart(children) => {
                let kids = children
                    .iter()
                    .filter_map(|child| built.remove(child))
                    .collect();
                Part::multipart(content_type, kids)
            }
            PartType::Text(_) | PartType::Html(_) => {
                leaf(content_type, mime_part.contents(), options).with_charset("utf-8")
            }
            PartType::Binary(_) | PartType::InlineBinary(_) | PartType::Message(_) => {
                leaf(content_type, mime_part.contents(), options)
            }
        };
        let part = if keep_raw.contains(&id) {
            match raw_span(message_bytes, mime_part) {
                Some(raw) => part.with_raw(raw),
                None => part,
            }
        } else {
            part
        };
        trace!(part_id = id, mime_type = part.mime_type(), "Built part");
        built.insert(id, part);
    }

    let root = built
        .remove(&0)
        .ok_or_else(|| MimeCryptError::MimeError("Message has no root part".into()))?;
    debug!(
        mime_type = root.mime_type(),
        parts = msg.parts.len(),
        "Parsed message tree"
    );
    Ok(root)
}

fn leaf(content_type: String, contents: &[u8], options: ParseOptions) -> Part {
    if options.partial_download && contents.is_empty() {
        Part::unfetched(content_type)
    } else {
        Part::leaf(content_type, contents.to_vec())
    }
}

fn is_multipart_signed(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|t| t.trim().eq_ignore_ascii_case("multipart/signed"))
}

/// Headers and body of a part exactly as they appear in the message.
fn raw_span<'a>(message_bytes: &'a [u8], part: &mail_parser::MessagePart<'_>) -> Option<&'a [u8]> {
    let start = part.raw_header_offset() as usize;
    let end = part.raw_end_offset() as usize;
    message_bytes.get(start..end)
}

/// Recover the part's `Content-Type` header exactly as written (unfolded),
/// falling back to the parsed type without parameters.
fn raw_content_type(message_bytes: &[u8], part: &mail_parser::MessagePart<'_>) -> String {
    let start = part.raw_header_offset() as usize;
    let end = part.raw_body_offset() as usize;

    if let Some(header_bytes) = message_bytes.get(start..end) {
        let headers = unfold_headers(&decode_header_bytes(header_bytes));
        if let Some(value) = get_header(&headers, "content-type") {
            return value;
        }
    }

    part.content_type()
        .map(|ct: &mail_parser::ContentType| {
            let main = ct.ctype();
            match ct.subtype() {
                Some(sub) => format!("{main}/{sub}"),
                None => main.to_string(),
            }
        })
        .unwrap_or_default()
}

/// Skip the `From ` separator line at the start of mbox messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    // Handle BOM
    let data = if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    };

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::part::Body;

    const SIGNED: &str = "From: alice@example.com\r\n\
Subject: signed\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/signed; micalg=pgp-sha256;\r\n\
\tprotocol=\"application/pgp-signature\"; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hello\r\n\
--b1\r\n\
Content-Type: application/pgp-signature; name=\"signature.asc\"\r\n\
\r\n\
-----BEGIN PGP SIGNATURE-----\r\n\
\r\n\
iQEzBAEBCAAdFiEE\r\n\
-----END PGP SIGNATURE-----\r\n\
--b1--\r\n";

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        let result = skip_from_line(data);
        assert!(result.starts_with(b"Subject:"));
    }

    #[test]
    fn test_skip_from_line_no_from() {
        let data = b"Subject: Test\n\nBody\n";
        let result = skip_from_line(data);
        assert_eq!(result, data);
    }

    #[test]
    fn test_parse_multipart_signed_tree() {
        let root = parse_message(SIGNED.as_bytes(), ParseOptions::default()).expect("parse");
        assert_eq!(root.mime_type(), "multipart/signed");
        assert!(root.content_type().contains("protocol=\"application/pgp-signature\""));
        assert_eq!(root.children().len(), 2);
        assert_eq!(root.children()[0].mime_type(), "text/plain");
        assert_eq!(root.children()[1].mime_type(), "application/pgp-signature");
        let signed_raw = root.children()[0].raw().expect("raw signed content kept");
        assert!(signed_raw.starts_with(b"Content-Type: text/plain"));
        assert!(root.raw().is_none());
    }

    #[test]
    fn test_parse_simple_text() {
        let raw = b"Subject: hi\r\nContent-Type: text/plain\r\n\r\nbody text\r\n";
        let root = parse_message(raw, ParseOptions::default()).expect("parse");
        assert_eq!(root.mime_type(), "text/plain");
        match root.body() {
            Body::Leaf(data) => assert!(String::from_utf8_lossy(data).contains("body text")),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_partial_download_marks_empty_leaves_unfetched() {
        let raw = "Content-Type: multipart/mixed; boundary=\"x\"\r\n\r\n\
--x\r\n\
Content-Type: text/plain\r\n\
\r\n\
\r\n\
--x--\r\n";
        let full = parse_message(raw.as_bytes(), ParseOptions::default()).expect("parse");
        assert!(full.is_complete());
        let partial = parse_message(
            raw.as_bytes(),
            ParseOptions {
                partial_download: true,
            },
        )
        .expect("parse");
        assert!(!partial.is_complete());
    }
}
