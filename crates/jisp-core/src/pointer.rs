//! RFC 6901 JSON Pointer resolution.
//!
//! One deliberate extension over the RFC: `"/"` (and the empty pointer)
//! resolve to the document root, matching how programs address the whole
//! document in `get`/`enter`.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    #[error("path not found")]
    NotFound,
    #[error("intermediate segment is not a container")]
    Type,
    #[error("array index out of range")]
    Range,
    #[error("malformed pointer")]
    Invalid,
}

/// Escape a single reference token (`~` → `~0`, `/` → `~1`).
pub fn escape_token(token: &str) -> String {
    if !token.contains('~') && !token.contains('/') {
        return token.to_string();
    }
    token.replace('~', "~0").replace('/', "~1")
}

/// Unescape a single reference token, rejecting dangling or unknown escapes.
pub fn unescape_token(token: &str) -> Result<String, PointerError> {
    if !token.contains('~') {
        return Ok(token.to_string());
    }
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(PointerError::Invalid),
        }
    }
    Ok(out)
}

/// Split a pointer into unescaped reference tokens. The empty pointer and
/// `"/"` both yield no tokens (root).
pub fn parse_pointer(pointer: &str) -> Result<Vec<String>, PointerError> {
    if pointer.is_empty() || pointer == "/" {
        return Ok(Vec::new());
    }
    let rest = pointer.strip_prefix('/').ok_or(PointerError::Invalid)?;
    rest.split('/').map(unescape_token).collect()
}

/// Decimal array index per RFC 6901: digits only, no leading zero (except
/// "0" itself).
fn parse_index(token: &str) -> Result<usize, PointerError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PointerError::Invalid);
    }
    if token.len() > 1 && token.starts_with('0') {
        return Err(PointerError::Invalid);
    }
    token.parse().map_err(|_| PointerError::Invalid)
}

/// Resolve a pointer against a document root.
pub fn resolve<'a>(root: &'a Value, pointer: &str) -> Result<&'a Value, PointerError> {
    let tokens = parse_pointer(pointer)?;
    let mut current = root;
    for token in &tokens {
        match current {
            Value::Object(map) => {
                current = map.get(token).ok_or(PointerError::NotFound)?;
            }
            Value::Array(arr) => {
                let idx = parse_index(token)?;
                if idx >= arr.len() {
                    return Err(PointerError::Range);
                }
                current = &arr[idx];
            }
            _ => return Err(PointerError::Type),
        }
    }
    Ok(current)
}

/// Mutable resolution; identical traversal and error classification.
pub fn resolve_mut<'a>(root: &'a mut Value, pointer: &str) -> Result<&'a mut Value, PointerError> {
    let tokens = parse_pointer(pointer)?;
    let mut current = root;
    for token in &tokens {
        match current {
            Value::Object(map) => {
                current = map.get_mut(token).ok_or(PointerError::NotFound)?;
            }
            Value::Array(arr) => {
                let idx = parse_index(token)?;
                if idx >= arr.len() {
                    return Err(PointerError::Range);
                }
                current = &mut arr[idx];
            }
            _ => return Err(PointerError::Type),
        }
    }
    Ok(current)
}

/// Pointer addressing a single root key, used by the residual logger.
pub fn path_for_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 1);
    out.push('/');
    out.push_str(&escape_token(key));
    out
}

/// Pointer addressing a stack slot.
pub fn path_for_stack_index(index: usize) -> String {
    format!("/stack/{index}")
}

/// Append-position pointer (`<base>/-`), with the root special case.
pub fn path_for_append(base: &str) -> String {
    if base == "/" || base.is_empty() {
        "/-".to_string()
    } else {
        format!("{base}/-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_pointers_resolve_to_root() {
        let doc = json!({"a": 1});
        assert_eq!(resolve(&doc, "/").unwrap(), &doc);
        assert_eq!(resolve(&doc, "").unwrap(), &doc);
    }

    #[test]
    fn escape_decoding_follows_rfc6901() {
        let doc = json!({"a/b": 1, "a~b": 2});
        assert_eq!(resolve(&doc, "/a~1b").unwrap(), &json!(1));
        assert_eq!(resolve(&doc, "/a~0b").unwrap(), &json!(2));
        assert_eq!(path_for_key("a/b"), "/a~1b");
        assert_eq!(path_for_key("a~b"), "/a~0b");
    }

    #[test]
    fn array_indices_are_strict_decimals() {
        let doc = json!({"xs": [10, 20, 30]});
        assert_eq!(resolve(&doc, "/xs/1").unwrap(), &json!(20));
        assert_eq!(resolve(&doc, "/xs/3"), Err(PointerError::Range));
        assert_eq!(resolve(&doc, "/xs/01"), Err(PointerError::Invalid));
        assert_eq!(resolve(&doc, "/xs/-"), Err(PointerError::Invalid));
    }

    #[test]
    fn error_classification() {
        let doc = json!({"a": {"b": 5}, "s": "str"});
        assert_eq!(resolve(&doc, "/missing"), Err(PointerError::NotFound));
        assert_eq!(resolve(&doc, "/s/x"), Err(PointerError::Type));
        assert_eq!(resolve(&doc, "no-slash"), Err(PointerError::Invalid));
        assert_eq!(resolve(&doc, "/a~2b"), Err(PointerError::Invalid));
    }

    #[test]
    fn resolve_mut_reaches_nested_slots() {
        let mut doc = json!({"a": {"b": [1, 2]}});
        *resolve_mut(&mut doc, "/a/b/0").unwrap() = json!(99);
        assert_eq!(doc, json!({"a": {"b": [99, 2]}}));
    }

    #[test]
    fn append_paths() {
        assert_eq!(path_for_append("/"), "/-");
        assert_eq!(path_for_append("/xs"), "/xs/-");
    }
}
