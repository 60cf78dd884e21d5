//! Lenient JSON input layer.
//!
//! Program input (and files read by `load`) may contain `//` and `/* */`
//! comments and trailing commas. The reader strips those down to strict JSON
//! before handing the text to `serde_json`, replacing stripped bytes with
//! spaces so reported line/column positions still point into the original
//! text. [`ValueStream`] yields each complete top-level value from an input
//! that may hold several programs in sequence.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("{message} (line {line}, column {column})")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },
    #[error("unexpected end of input: {message} (line {line}, column {column})")]
    Incomplete {
        message: String,
        line: usize,
        column: usize,
    },
}

/// Parse a single lenient JSON value.
pub fn read_value(input: &str) -> Result<Value, ReadError> {
    let clean = sanitize(input);
    serde_json::from_str(&clean).map_err(|e| classify(&e, 0, &clean))
}

/// Incremental reader for inputs carrying several top-level values.
#[derive(Debug)]
pub struct ValueStream {
    clean: String,
    offset: usize,
}

impl ValueStream {
    pub fn new(input: &str) -> Self {
        Self {
            clean: sanitize(input),
            offset: 0,
        }
    }

    /// Next complete value, `Ok(None)` once only whitespace remains.
    pub fn next_value(&mut self) -> Result<Option<Value>, ReadError> {
        let rest = &self.clean[self.offset..];
        if rest.trim_start().is_empty() {
            return Ok(None);
        }
        let mut iter = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        match iter.next() {
            Some(Ok(value)) => {
                self.offset += iter.byte_offset();
                Ok(Some(value))
            }
            Some(Err(e)) => Err(classify(&e, self.offset, &self.clean)),
            None => Ok(None),
        }
    }
}

/// Map a serde_json error at `base` bytes into the full text onto absolute
/// line/column coordinates.
fn classify(err: &serde_json::Error, base: usize, full_text: &str) -> ReadError {
    let local_offset = offset_of(&full_text[base..], err.line(), err.column());
    let (line, column) = line_col(full_text, base + local_offset);
    let message = err.to_string();
    // serde_json reports positions for the remainder only; strip its own
    // coordinates so the absolute ones are not contradicted.
    let message = message
        .split(" at line ")
        .next()
        .unwrap_or(&message)
        .to_string();
    if err.is_eof() {
        ReadError::Incomplete {
            message,
            line,
            column,
        }
    } else {
        ReadError::Syntax {
            message,
            line,
            column,
        }
    }
}

/// Byte offset of a 1-based (line, column) position.
fn offset_of(text: &str, line: usize, column: usize) -> usize {
    let mut current_line = 1;
    let mut line_start = 0;
    if line > 1 {
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                current_line += 1;
                line_start = i + 1;
                if current_line == line {
                    break;
                }
            }
        }
    }
    (line_start + column.saturating_sub(1)).min(text.len())
}

/// 1-based (line, column) of a byte offset.
fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let mut line = 1;
    let mut line_start = 0;
    for (i, b) in text.as_bytes()[..offset].iter().enumerate() {
        if *b == b'\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    (line, offset - line_start + 1)
}

/// Replace comments and trailing commas with spaces, leaving strings and
/// newlines intact so byte positions keep their meaning.
fn sanitize(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                out[i] = b' ';
                out[i + 1] = b' ';
                i += 2;
                while i < bytes.len() {
                    if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        out[i] = b' ';
                        out[i + 1] = b' ';
                        i += 2;
                        break;
                    }
                    if bytes[i] != b'\n' {
                        out[i] = b' ';
                    }
                    i += 1;
                }
            }
            b',' => {
                let next = skip_trivia(bytes, i + 1);
                if matches!(bytes.get(next), Some(b'}') | Some(b']')) {
                    out[i] = b' ';
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    // Only ASCII bytes were replaced with spaces, so the result is still
    // valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

/// Position just past the string literal starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    i
}

/// Position of the next non-whitespace, non-comment byte at or after `i`.
fn skip_trivia(bytes: &[u8], mut i: usize) -> usize {
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) == Some(&b'/') && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if bytes.get(i) == Some(&b'/') && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i < bytes.len() {
                if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    i += 2;
                    break;
                }
                i += 1;
            }
            continue;
        }
        return i;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn comments_are_stripped() {
        let value = read_value(
            r#"
            // leading comment
            {
                "a": 1, /* inline */ "b": 2
            }
            "#,
        )
        .unwrap();
        assert_eq!(value, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn trailing_commas_are_tolerated() {
        let value = read_value(r#"{"xs": [1, 2, 3,], "o": {"k": 1,},}"#).unwrap();
        assert_eq!(value, json!({"xs": [1, 2, 3], "o": {"k": 1}}));
    }

    #[test]
    fn trailing_comma_before_comment_and_bracket() {
        let value = read_value("[1, 2, // tail\n]").unwrap();
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn comment_markers_inside_strings_survive() {
        let value = read_value(r#"{"url": "http://example.com", "note": "a, ]"}"#).unwrap();
        assert_eq!(value["url"], json!("http://example.com"));
        assert_eq!(value["note"], json!("a, ]"));
    }

    #[test]
    fn stream_yields_each_top_level_value() {
        let mut stream = ValueStream::new("{\"a\": 1}\n// next\n[2, 3]\n\"last\"\n");
        assert_eq!(stream.next_value().unwrap(), Some(json!({"a": 1})));
        assert_eq!(stream.next_value().unwrap(), Some(json!([2, 3])));
        assert_eq!(stream.next_value().unwrap(), Some(json!("last")));
        assert_eq!(stream.next_value().unwrap(), None);
    }

    #[test]
    fn incomplete_tail_is_reported_as_such() {
        let mut stream = ValueStream::new("{\"a\": 1}\n{\"b\": ");
        assert_eq!(stream.next_value().unwrap(), Some(json!({"a": 1})));
        match stream.next_value() {
            Err(ReadError::Incomplete { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected incomplete error, got {other:?}"),
        }
    }

    #[test]
    fn syntax_errors_carry_absolute_positions() {
        let mut stream = ValueStream::new("1\n@");
        assert_eq!(stream.next_value().unwrap(), Some(json!(1)));
        match stream.next_value() {
            Err(ReadError::Syntax { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }
}
