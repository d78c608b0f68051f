//! RFC 5322 header handling: folding, parameter extraction (RFC 2045 §5.1),
//! and charset decoding.

use tracing::warn;

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    // Strip BOM if present
    let bytes = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &bytes[3..]
    } else {
        bytes
    };

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
pub fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

/// Get the first value for a header name (`name` must be lowercase).
pub fn get_header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

/// Extract a parameter from a structured header value such as
/// `multipart/signed; micalg=pgp-sha256; protocol="application/pgp-signature"`.
///
/// The parameter name is matched case-insensitively. Surrounding quotes are
/// removed from the value. Semicolons inside quoted values do not split
/// parameters. Returns `None` when the parameter is absent.
pub fn get_header_parameter(header_value: &str, parameter_name: &str) -> Option<String> {
    let wanted = parameter_name.trim();
    if wanted.is_empty() {
        return None;
    }

    // The first segment is the value itself, not a parameter.
    for segment in split_parameters(header_value).into_iter().skip(1) {
        let Some((name, value)) = segment.split_once('=') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case(wanted) {
            return Some(unquote(value.trim()));
        }
    }
    None
}

/// Split a header value on `;`, ignoring separators inside quoted strings.
fn split_parameters(value: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in value.chars() {
        match ch {
            '\r' | '\n' => continue,
            _ if escaped => {
                escaped = false;
                current.push(ch);
            }
            '\\' if in_quotes => {
                escaped = true;
                current.push(ch);
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ';' if !in_quotes => segments.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    segments.push(current);
    segments
}

/// Strip surrounding double-quotes and resolve backslash escapes inside them.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(ch);
            }
        }
        out
    } else {
        value.to_string()
    }
}

/// Decode bytes using a named charset.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let charset_lower = charset.trim().to_lowercase();
    match charset_lower.as_str() {
        "utf-8" | "utf8" | "us-ascii" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(
                    charset = charset,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfold_headers() {
        let text = "Content-Type: multipart/signed;\n\tprotocol=\"application/pgp-signature\"\nFrom: user@example.com\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "content-type");
        assert_eq!(
            headers[0].1,
            "multipart/signed; protocol=\"application/pgp-signature\""
        );
    }

    #[test]
    fn test_get_header_parameter_quoted() {
        let value = "multipart/encrypted; protocol=\"application/pgp-encrypted\"; boundary=abc";
        assert_eq!(
            get_header_parameter(value, "protocol").as_deref(),
            Some("application/pgp-encrypted")
        );
        assert_eq!(get_header_parameter(value, "boundary").as_deref(), Some("abc"));
    }

    #[test]
    fn test_get_header_parameter_case_insensitive_name() {
        let value = "multipart/signed; PROTOCOL=application/pgp-signature";
        assert_eq!(
            get_header_parameter(value, "protocol").as_deref(),
            Some("application/pgp-signature")
        );
    }

    #[test]
    fn test_get_header_parameter_absent() {
        assert_eq!(get_header_parameter("multipart/signed", "protocol"), None);
        assert_eq!(get_header_parameter("", "protocol"), None);
        // A parameter whose name merely starts with the wanted one is not a match.
        assert_eq!(
            get_header_parameter("multipart/signed; protocols=x", "protocol"),
            None
        );
    }

    #[test]
    fn test_get_header_parameter_semicolon_inside_quotes() {
        let value = "text/plain; name=\"a;b.txt\"; charset=utf-8";
        assert_eq!(get_header_parameter(value, "name").as_deref(), Some("a;b.txt"));
        assert_eq!(get_header_parameter(value, "charset").as_deref(), Some("utf-8"));
    }

    #[test]
    fn test_decode_charset_latin1() {
        assert_eq!(decode_charset("ISO-8859-1", &[0x63, 0x61, 0x66, 0xE9]), "café");
    }

    #[test]
    fn test_decode_charset_unknown_falls_back() {
        assert_eq!(decode_charset("x-made-up", b"plain"), "plain");
    }

    #[test]
    fn test_decode_header_bytes_windows1252() {
        assert_eq!(decode_header_bytes(&[0x4D, 0xFC, 0x6C]), "Mül");
    }
}
