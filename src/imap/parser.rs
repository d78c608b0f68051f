//! Tokenizer for IMAP server responses (RFC 3501 §9 response grammar).
//!
//! Lines are split into [`ImapItem`]s. Status responses (`OK`, `NO`, `BAD`,
//! `PREAUTH`, `BYE`) and continuation requests keep their text after the
//! optional response code as one [`ImapItem::Str`], so that something like
//! `{123}` in human-readable text is never taken for a literal.
//!
//! Nested lists are parsed with an explicit stack.

use tracing::{debug, trace};

use crate::error::{MimeCryptError, Result};
use crate::imap::response::{is_status_atom, ImapItem, ImapResponse};

/// Parse every response of a server transcript. Blank lines are skipped.
pub fn parse_transcript(input: &str) -> Result<Vec<ImapResponse>> {
    let mut cursor = Cursor::new(input.as_bytes());
    let mut responses = Vec::new();

    while !cursor.at_end() {
        if cursor.skip_blank_line() {
            continue;
        }
        responses.push(cursor.response()?);
    }

    debug!(responses = responses.len(), "Parsed IMAP transcript");
    Ok(responses)
}

/// Parse exactly one response. A trailing line break is allowed.
pub fn parse_response_line(line: &str) -> Result<ImapResponse> {
    let mut cursor = Cursor::new(line.as_bytes());
    let response = cursor.response()?;
    if !cursor.at_end() {
        return Err(cursor.err("unexpected data after end of response"));
    }
    Ok(response)
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
    /// 1-based line number, for error reports.
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) {
        if let Some(b) = self.peek() {
            if b == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
    }

    fn err(&self, reason: impl Into<String>) -> MimeCryptError {
        MimeCryptError::imap(self.line, reason)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.peek() {
            Some(b) if b == expected => {
                self.bump();
                Ok(())
            }
            Some(b) => Err(self.err(format!(
                "expected '{}' but got '{}'",
                expected as char,
                b.escape_ascii()
            ))),
            None => Err(self.err(format!(
                "expected '{}' but reached end of input",
                expected as char
            ))),
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.bump();
        }
    }

    fn skip_blank_line(&mut self) -> bool {
        match self.peek() {
            Some(b'\n') => {
                self.bump();
                true
            }
            Some(b'\r') if self.input.get(self.pos + 1) == Some(&b'\n') => {
                self.bump();
                self.bump();
                true
            }
            _ => false,
        }
    }

    fn end_of_line(&mut self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(b'\n') => {
                self.bump();
                Ok(())
            }
            Some(b'\r') => {
                self.bump();
                if self.peek().is_some() {
                    self.expect(b'\n')?;
                }
                Ok(())
            }
            Some(b) => Err(self.err(format!("expected end of line, got '{}'", b.escape_ascii()))),
        }
    }

    fn response(&mut self) -> Result<ImapResponse> {
        let line = self.line;
        let mut response = ImapResponse {
            tag: None,
            continuation: false,
            items: Vec::new(),
        };

        match self.peek() {
            Some(b'+') => {
                self.bump();
                response.continuation = true;
                self.response_text(&mut response.items)?;
                trace!(line, "Continuation request");
                return Ok(response);
            }
            Some(b'*') => {
                self.bump();
                self.expect(b' ')?;
            }
            _ => {
                response.tag = Some(self.tag()?);
                self.expect(b' ')?;
            }
        }

        let symbol = match self.scalar()? {
            ImapItem::Atom(symbol) => symbol,
            other => return Err(self.err(format!("response must start with an atom, got {other:?}"))),
        };
        let is_status = is_status_atom(&symbol);
        response.items.push(ImapItem::Atom(symbol));

        if is_status {
            self.response_text(&mut response.items)?;
        } else {
            self.remaining_items(&mut response.items)?;
        }

        trace!(line, tag = ?response.tag, items = response.items.len(), "Parsed response");
        Ok(response)
    }

    fn tag(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\r' || b == b'\n' {
                break;
            }
            self.bump();
        }
        if start == self.pos {
            return Err(self.err("missing response tag"));
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    /// `[SP] ["[" code "]" [SP]] text`
    fn response_text(&mut self, items: &mut Vec<ImapItem>) -> Result<()> {
        if self.peek() == Some(b' ') {
            self.bump();
        }
        if self.peek() == Some(b'[') {
            items.push(self.list()?);
            if self.peek() == Some(b' ') {
                self.bump();
            }
        }

        let start = self.pos;
        while !matches!(self.peek(), None | Some(b'\r' | b'\n')) {
            self.bump();
        }
        if self.pos > start {
            let text = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
            items.push(ImapItem::Str(text));
        }
        self.end_of_line()
    }

    fn remaining_items(&mut self, items: &mut Vec<ImapItem>) -> Result<()> {
        loop {
            self.skip_spaces();
            match self.peek() {
                None | Some(b'\r' | b'\n') => return self.end_of_line(),
                Some(b'(' | b'[') => items.push(self.list()?),
                Some(b @ (b')' | b']')) => {
                    return Err(self.err(format!("unbalanced '{}'", b as char)))
                }
                Some(_) => items.push(self.scalar()?),
            }
        }
    }

    /// A parenthesised or bracketed list, starting at its opening delimiter.
    fn list(&mut self) -> Result<ImapItem> {
        let mut open: Vec<(u8, Vec<ImapItem>)> = Vec::new();

        loop {
            match self.peek() {
                Some(b'(') => {
                    self.bump();
                    open.push((b')', Vec::new()));
                }
                Some(b'[') => {
                    self.bump();
                    open.push((b']', Vec::new()));
                }
                Some(b @ (b')' | b']')) => match open.pop() {
                    Some((close, items)) if close == b => {
                        self.bump();
                        let list = ImapItem::List(items);
                        match open.last_mut() {
                            Some((_, parent)) => parent.push(list),
                            None => return Ok(list),
                        }
                    }
                    _ => return Err(self.err(format!("unbalanced '{}'", b as char))),
                },
                Some(b' ' | b'\t') => self.bump(),
                None | Some(b'\r' | b'\n') => return Err(self.err("unterminated list")),
                Some(_) => {
                    let item = self.scalar()?;
                    match open.last_mut() {
                        Some((_, items)) => items.push(item),
                        None => return Err(self.err("list item outside of a list")),
                    }
                }
            }
        }
    }

    /// Atom, number, `NIL`, quoted string or literal.
    fn scalar(&mut self) -> Result<ImapItem> {
        match self.peek() {
            Some(b'"') => self.quoted(),
            Some(b'{') => self.literal(),
            _ => {
                let start = self.pos;
                while let Some(b) = self.peek() {
                    if is_atom_delimiter(b) {
                        break;
                    }
                    self.bump();
                }
                if start == self.pos {
                    return Err(match self.peek() {
                        Some(b) => self.err(format!("unexpected character '{}'", b.escape_ascii())),
                        None => self.err("unexpected end of input"),
                    });
                }
                let atom = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
                if atom.eq_ignore_ascii_case("NIL") {
                    Ok(ImapItem::Nil)
                } else {
                    Ok(ImapItem::Atom(atom))
                }
            }
        }
    }

    fn quoted(&mut self) -> Result<ImapItem> {
        self.expect(b'"')?;
        let mut value = Vec::new();
        let mut escape = false;

        loop {
            match self.peek() {
                None | Some(b'\r' | b'\n') => return Err(self.err("unterminated quoted string")),
                Some(b'\\') if !escape => escape = true,
                Some(b'"') if !escape => {
                    self.bump();
                    return Ok(ImapItem::Str(String::from_utf8_lossy(&value).into_owned()));
                }
                Some(b) => {
                    value.push(b);
                    escape = false;
                }
            }
            self.bump();
        }
    }

    /// `{n}` CRLF followed by exactly n bytes.
    fn literal(&mut self) -> Result<ImapItem> {
        self.expect(b'{')?;
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b != b'}' && b != b'\r' && b != b'\n') {
            self.bump();
        }
        let size_text = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        self.expect(b'}')?;
        // LITERAL+ (RFC 7888) marks non-synchronizing literals with a trailing '+'.
        let size: usize = size_text
            .trim_end_matches('+')
            .parse()
            .map_err(|_| self.err(format!("invalid literal size '{size_text}'")))?;

        if self.peek() == Some(b'\r') {
            self.bump();
        }
        self.expect(b'\n')?;

        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.err(format!("literal of {size} bytes is truncated")))?;
        let data = self.input[self.pos..end].to_vec();
        self.line += data.iter().filter(|&&b| b == b'\n').count();
        self.pos = end;
        Ok(ImapItem::Literal(data))
    }
}

fn is_atom_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'[' | b']' | b'{' | b' ' | b'"') || b <= 0x1f || b == 0x7f
}
