//! The MIME part tree consumed by the crypto structure detector.
//!
//! A [`Part`] is built once (by [`crate::parser::mime`] or programmatically)
//! and then only read. Every part carries a [`PartId`] that is unique for the
//! lifetime of the process, so two structurally identical parts are still
//! distinct keys for [`crate::crypto::annotations::CryptoAnnotations`].

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{MimeCryptError, Result};
use crate::parser::header::get_header_parameter;

/// Default content type of a part without a `Content-Type` header (RFC 2045 §5.2).
pub const DEFAULT_MIME_TYPE: &str = "text/plain";

static NEXT_PART_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a part, assigned at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct PartId(u64);

impl PartId {
    fn next() -> Self {
        Self(NEXT_PART_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logging and reports.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Body of a part.
///
/// Leaves are tri-state: `NotFetched` (partial download, content never
/// seen), `Leaf` with an empty buffer (fetched, legitimately empty), or
/// `Leaf` with content.
#[derive(Debug)]
pub enum Body {
    /// The body has not been downloaded.
    NotFetched,
    /// Transfer-decoded leaf content.
    Leaf(Vec<u8>),
    /// Ordered child parts of a multipart body.
    Multipart(Vec<Part>),
}

/// A node of the MIME tree.
#[derive(Debug)]
pub struct Part {
    id: PartId,
    /// Lower-cased `type/subtype`, parameters stripped.
    mime_type: String,
    /// Raw (unfolded) `Content-Type` header value.
    content_type: String,
    /// Charset override for leaf bytes that were already transcoded.
    charset: Option<String>,
    /// Raw headers and body as they appeared on the wire, when kept.
    raw: Option<Vec<u8>>,
    body: Body,
}

impl Part {
    /// Create a part from its raw `Content-Type` value and a body.
    pub fn new(content_type: impl Into<String>, body: Body) -> Self {
        let content_type = content_type.into();
        Self {
            id: PartId::next(),
            mime_type: mime_type_of(&content_type),
            content_type,
            charset: None,
            raw: None,
            body,
        }
    }

    /// A leaf part with downloaded content.
    pub fn leaf(content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::new(content_type, Body::Leaf(data.into()))
    }

    /// A leaf part whose body has not been downloaded.
    pub fn unfetched(content_type: impl Into<String>) -> Self {
        Self::new(content_type, Body::NotFetched)
    }

    /// A multipart part with the given children.
    pub fn multipart(content_type: impl Into<String>, children: Vec<Part>) -> Self {
        Self::new(content_type, Body::Multipart(children))
    }

    /// Override the charset used to decode leaf bytes.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Keep the raw wire form (headers and body) of this part.
    pub fn with_raw(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    pub fn id(&self) -> PartId {
        self.id
    }

    /// Lower-cased `type/subtype`.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Raw `Content-Type` header value, parameters included.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Raw wire form, if it was kept at parse time.
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Case-insensitive comparison against a bare `type/subtype`.
    pub fn is_mime_type(&self, candidate: &str) -> bool {
        self.mime_type.eq_ignore_ascii_case(candidate.trim())
    }

    /// Charset for decoding leaf bytes: the override, else the header's
    /// `charset` parameter.
    pub fn charset(&self) -> Option<String> {
        self.charset
            .clone()
            .or_else(|| get_header_parameter(&self.content_type, "charset"))
    }

    /// `true` if the body has not been downloaded.
    pub fn is_body_missing(&self) -> bool {
        matches!(self.body, Body::NotFetched)
    }

    /// Child parts; empty for leaves.
    pub fn children(&self) -> &[Part] {
        match &self.body {
            Body::Multipart(children) => children,
            Body::Leaf(_) | Body::NotFetched => &[],
        }
    }

    /// The child at `index` of a multipart body.
    pub fn child(&self, index: usize) -> Option<&Part> {
        self.children().get(index)
    }

    /// Follow a path of child indexes from this part.
    pub fn part_at(&self, path: &[usize]) -> Option<&Part> {
        path.iter().try_fold(self, |part, &index| part.child(index))
    }

    /// `true` iff no leaf anywhere below this part is missing its body.
    pub fn is_complete(&self) -> bool {
        let mut stack = vec![self];
        while let Some(part) = stack.pop() {
            match &part.body {
                Body::NotFetched => return false,
                Body::Leaf(_) => {}
                Body::Multipart(children) => stack.extend(children.iter()),
            }
        }
        true
    }

    /// Write the leaf content to `out`.
    ///
    /// Fails for bodies that were not downloaded and for multipart bodies,
    /// which have no single byte stream in this model.
    pub fn write_body(&self, out: &mut dyn Write) -> Result<()> {
        match &self.body {
            Body::Leaf(data) => {
                out.write_all(data)?;
                Ok(())
            }
            Body::NotFetched => Err(MimeCryptError::BodyUnavailable(format!(
                "{} body of part {} was not downloaded",
                self.mime_type, self.id
            ))),
            Body::Multipart(_) => Err(MimeCryptError::BodyUnavailable(format!(
                "part {} is {}, not a leaf",
                self.id, self.mime_type
            ))),
        }
    }

    /// Deep copy of this subtree. Every copied part gets a fresh [`PartId`].
    pub fn duplicate(&self) -> Part {
        enum Step<'a> {
            Visit(&'a Part),
            Assemble(&'a Part),
        }

        let mut steps = vec![Step::Visit(self)];
        let mut built: Vec<Part> = Vec::new();

        while let Some(step) = steps.pop() {
            match step {
                Step::Visit(part) => match &part.body {
                    Body::Multipart(children) => {
                        steps.push(Step::Assemble(part));
                        steps.extend(children.iter().rev().map(Step::Visit));
                    }
                    Body::Leaf(data) => built.push(part.copy_with_body(Body::Leaf(data.clone()))),
                    Body::NotFetched => built.push(part.copy_with_body(Body::NotFetched)),
                },
                Step::Assemble(part) => {
                    let first_child = built.len() - part.children().len();
                    let children = built.split_off(first_child);
                    built.push(part.copy_with_body(Body::Multipart(children)));
                }
            }
        }

        built
            .pop()
            .expect("every visited subtree assembles into exactly one part")
    }

    fn copy_with_body(&self, body: Body) -> Part {
        Part {
            id: PartId::next(),
            mime_type: self.mime_type.clone(),
            content_type: self.content_type.clone(),
            charset: self.charset.clone(),
            raw: self.raw.clone(),
            body,
        }
    }

    /// Every part of the tree in document order, paired with its index path.
    pub fn walk(&self) -> Vec<(Vec<usize>, &Part)> {
        let mut out = Vec::new();
        let mut stack = vec![(Vec::new(), self)];
        while let Some((path, part)) = stack.pop() {
            for (index, child) in part.children().iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(index);
                stack.push((child_path, child));
            }
            out.push((path, part));
        }
        out
    }

    /// Index path of the part with `id` below this one.
    pub fn path_of(&self, id: PartId) -> Option<Vec<usize>> {
        self.walk()
            .into_iter()
            .find(|(_, part)| part.id == id)
            .map(|(path, _)| path)
    }
}

/// Extract the bare, lower-cased `type/subtype` from a Content-Type value.
fn mime_type_of(content_type: &str) -> String {
    let bare = content_type.split(';').next().unwrap_or("").trim();
    if bare.is_empty() {
        DEFAULT_MIME_TYPE.to_string()
    } else {
        bare.to_ascii_lowercase()
    }
}

/// Render a path like `[0, 2]` as `1.3`, the IMAP part numbering.
pub fn format_path(path: &[usize]) -> String {
    if path.is_empty() {
        return "root".to_string();
    }
    path.iter()
        .map(|i| (i + 1).to_string())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_strips_parameters() {
        let part = Part::leaf("Text/Plain; charset=\"ISO-8859-1\"", "x");
        assert_eq!(part.mime_type(), "text/plain");
        assert!(part.is_mime_type("TEXT/PLAIN"));
        assert_eq!(part.charset().as_deref(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_empty_content_type_defaults_to_text_plain() {
        let part = Part::leaf("", "x");
        assert_eq!(part.mime_type(), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_ids_are_unique_for_identical_parts() {
        let a = Part::leaf("text/plain", "same");
        let b = Part::leaf("text/plain", "same");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_is_complete() {
        let complete = Part::multipart(
            "multipart/mixed",
            vec![Part::leaf("text/plain", ""), Part::leaf("image/png", "png")],
        );
        assert!(complete.is_complete());

        let partial = Part::multipart(
            "multipart/mixed",
            vec![
                Part::leaf("text/plain", "a"),
                Part::multipart("multipart/alternative", vec![Part::unfetched("text/html")]),
            ],
        );
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_write_body() {
        let mut sink = Vec::new();
        Part::leaf("text/plain", "hello")
            .write_body(&mut sink)
            .expect("leaf body");
        assert_eq!(sink, b"hello");

        let err = Part::unfetched("text/plain").write_body(&mut sink);
        assert!(matches!(err, Err(MimeCryptError::BodyUnavailable(_))));
    }

    #[test]
    fn test_duplicate_copies_structure_with_fresh_ids() {
        let tree = Part::multipart(
            "multipart/mixed",
            vec![
                Part::multipart(
                    "multipart/alternative",
                    vec![Part::leaf("text/plain", "a"), Part::unfetched("text/html")],
                ),
                Part::leaf("application/pdf", "pdf").with_raw("raw"),
            ],
        );
        let copy = tree.duplicate();
        assert_ne!(copy.id(), tree.id());
        let original: Vec<_> = tree.walk().iter().map(|(p, part)| (p.clone(), part.mime_type().to_string())).collect();
        let copied: Vec<_> = copy.walk().iter().map(|(p, part)| (p.clone(), part.mime_type().to_string())).collect();
        assert_eq!(original, copied);
        assert!(copy.part_at(&[0, 1]).is_some_and(Part::is_body_missing));
        assert_eq!(copy.part_at(&[1]).and_then(Part::raw), Some(b"raw".as_slice()));
    }

    #[test]
    fn test_walk_document_order() {
        let tree = Part::multipart(
            "multipart/mixed",
            vec![
                Part::multipart("multipart/alternative", vec![Part::leaf("text/plain", "")]),
                Part::leaf("application/pdf", ""),
            ],
        );
        let paths: Vec<String> = tree.walk().iter().map(|(p, _)| format_path(p)).collect();
        assert_eq!(paths, vec!["root", "1", "1.1", "2"]);
        let pdf = tree.part_at(&[1]).expect("pdf");
        assert_eq!(tree.path_of(pdf.id()), Some(vec![1]));
    }
}
