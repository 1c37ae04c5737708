use std::collections::HashMap;

use crate::http::parser::ParseError;

const CRLF: &[u8] = b"\r\n";

/// Token characters allowed in a header name besides ASCII letters and digits.
const TOKEN_SPECIALS: &[u8] = b"!#$%&'*+-.^_`|~";

/// Header table keyed by lower-cased field name.
///
/// Lookups are case-insensitive. Setting a name that is already present
/// appends the new value to the old one, separated by `", "`, which is how
/// repeated request headers are folded together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves a header value by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Inserts a header, merging with an existing value of the same name.
    pub fn set(&mut self, name: &str, value: &str) {
        self.entries
            .entry(name.to_ascii_lowercase())
            .and_modify(|current| {
                current.push_str(", ");
                current.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    /// Inserts a header, replacing any existing value of the same name.
    pub fn overwrite(&mut self, name: &str, value: &str) {
        self.entries
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs. Iteration order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses at most one header line from the front of `data`.
    ///
    /// Returns the number of bytes consumed and whether the blank line that
    /// ends the header block was reached. When `data` holds no complete line
    /// yet, nothing is consumed and the caller should retry with more bytes.
    pub fn parse_one(&mut self, data: &[u8]) -> Result<(usize, bool), ParseError> {
        let Some(line_end) = find_crlf(data) else {
            return Ok((0, false));
        };

        if line_end == 0 {
            return Ok((CRLF.len(), true));
        }

        let line = data[..line_end].trim_ascii();

        let Some(colon) = line.iter().position(|&b| b == b':') else {
            return Err(ParseError::MalformedHeaderLine(
                String::from_utf8_lossy(line).into_owned(),
            ));
        };
        let (key, value) = (&line[..colon], &line[colon + 1..]);

        if key.is_empty() {
            return Err(ParseError::MalformedHeaderLine(
                String::from_utf8_lossy(line).into_owned(),
            ));
        }
        validate_key(key)?;

        // Values are opaque; bytes outside UTF-8 are kept as replacement chars.
        let key = String::from_utf8_lossy(key);
        let value = String::from_utf8_lossy(value.trim_ascii());
        self.set(&key, &value);

        Ok((line_end + CRLF.len(), false))
    }
}

fn validate_key(key: &[u8]) -> Result<(), ParseError> {
    let Some(pos) = key.iter().position(|&b| !is_token_byte(b)) else {
        return Ok(());
    };

    let ch = String::from_utf8_lossy(&key[pos..])
        .chars()
        .next()
        .unwrap_or(char::REPLACEMENT_CHARACTER);

    Err(ParseError::InvalidHeaderKey {
        ch,
        byte: key[pos],
        key: String::from_utf8_lossy(key).into_owned(),
    })
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || TOKEN_SPECIALS.contains(&b)
}

pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2)
        .position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_header() {
        let mut headers = Headers::new();
        let data = b"Host: localhost:42069\r\n\r\n";

        let (n, done) = headers.parse_one(data).unwrap();

        assert_eq!(n, 23);
        assert!(!done);
        assert_eq!(headers.get("host"), Some("localhost:42069"));
    }

    #[test]
    fn token_specials_are_accepted() {
        assert!(validate_key(b"X-Custom_Header.v1~").is_ok());
        assert!(validate_key(b"a!#$%&'*+-.^_`|~z").is_ok());
    }

    #[test]
    fn empty_key_is_rejected() {
        let mut headers = Headers::new();
        let result = headers.parse_one(b": value\r\n");

        assert!(matches!(result, Err(ParseError::MalformedHeaderLine(_))));
    }

    #[test]
    fn bad_byte_in_key_is_reported() {
        let err = validate_key(b"H\xffst").unwrap_err();

        assert!(matches!(
            err,
            ParseError::InvalidHeaderKey { ch: '\u{fffd}', byte: 0xff, .. }
        ));
    }
}
