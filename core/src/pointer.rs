//! RFC 6901 JSON pointer resolution over `serde_json::Value`.
//!
//! `set` auto-creates missing intermediate objects so patches can build
//! nested paths in one op. Sequence segments accept `-` (append, `set`
//! only) or an integer. Errors distinguish a malformed pointer
//! ([`AtForgeError::InvalidPointer`]) from a well-formed one that misses
//! the document ([`AtForgeError::PathNotFound`], `IndexOutOfRange`).

use serde_json::Value;
use serde_json::json;

use crate::error::AtForgeError;
use crate::error::Result;

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn split(pointer: &str) -> Result<Vec<String>> {
    if !pointer.starts_with('/') {
        return Err(AtForgeError::invalid_pointer(
            pointer,
            "must start with `/`",
        ));
    }
    Ok(pointer.split('/').skip(1).map(unescape).collect())
}

fn parse_index(pointer: &str, token: &str) -> Result<i64> {
    token.parse::<i64>().map_err(|_| {
        AtForgeError::invalid_pointer(pointer, format!("invalid sequence index `{token}`"))
    })
}

/// Resolve `pointer` for reading. The empty pointer addresses the whole
/// document. An out-of-bounds index reads as an absent path.
pub fn get<'a>(doc: &'a Value, pointer: &str) -> Result<&'a Value> {
    if pointer.is_empty() {
        return Ok(doc);
    }
    let tokens = split(pointer)?;
    let mut cur = doc;
    for token in &tokens {
        cur = match cur {
            Value::Object(map) => map
                .get(token)
                .ok_or_else(|| AtForgeError::path_not_found(pointer))?,
            Value::Array(items) => {
                if token == "-" {
                    return Err(AtForgeError::invalid_pointer(
                        pointer,
                        "`-` is not addressable in get",
                    ));
                }
                let idx = parse_index(pointer, token)?;
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| items.get(i))
                    .ok_or_else(|| AtForgeError::path_not_found(pointer))?
            }
            _ => {
                return Err(AtForgeError::invalid_pointer(
                    pointer,
                    format!("cannot traverse `{token}` in a scalar"),
                ));
            }
        };
    }
    Ok(cur)
}

/// Walk to the parent of the addressed location, creating missing
/// intermediate objects, and return it with the final (unescaped) token.
fn walk_parent<'a>(
    doc: &'a mut Value,
    pointer: &str,
    tokens: &[String],
) -> Result<(&'a mut Value, String)> {
    let Some((last, route)) = tokens.split_last() else {
        return Err(AtForgeError::invalid_pointer(pointer, "empty token list"));
    };
    let mut cur = doc;
    for token in route {
        cur = match cur {
            Value::Object(map) => map.entry(token.clone()).or_insert_with(|| json!({})),
            Value::Array(items) => {
                if token == "-" {
                    return Err(AtForgeError::invalid_pointer(
                        pointer,
                        "`-` only allowed as the final segment",
                    ));
                }
                let idx = parse_index(pointer, token)?;
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(|| AtForgeError::index_out_of_range(pointer, idx))?
            }
            _ => {
                return Err(AtForgeError::invalid_pointer(
                    pointer,
                    format!("cannot traverse `{token}` in a scalar"),
                ));
            }
        };
    }
    Ok((cur, last.clone()))
}

pub(crate) fn set_in_place(
    doc: &mut Value,
    pointer: &str,
    value: Value,
    create_only: bool,
) -> Result<()> {
    if pointer.is_empty() {
        *doc = value;
        return Ok(());
    }
    let tokens = split(pointer)?;
    let (parent, token) = walk_parent(doc, pointer, &tokens)?;
    match parent {
        Value::Object(map) => {
            if create_only && map.contains_key(&token) {
                return Err(AtForgeError::path_exists(pointer));
            }
            map.insert(token, value);
            Ok(())
        }
        Value::Array(items) => {
            if token == "-" {
                items.push(value);
                return Ok(());
            }
            let idx = parse_index(pointer, &token)?;
            if idx < 0 {
                return Err(AtForgeError::index_out_of_range(pointer, idx));
            }
            let i = usize::try_from(idx).unwrap_or(usize::MAX);
            if create_only && i < items.len() {
                return Err(AtForgeError::path_exists(pointer));
            }
            if i < items.len() {
                items[i] = value;
            } else if i == items.len() {
                items.push(value);
            } else {
                return Err(AtForgeError::index_out_of_range(pointer, idx));
            }
            Ok(())
        }
        _ => Err(AtForgeError::invalid_pointer(
            pointer,
            "parent is not a container",
        )),
    }
}

pub(crate) fn remove_in_place(doc: &mut Value, pointer: &str) -> Result<()> {
    if pointer.is_empty() {
        return Err(AtForgeError::invalid_pointer(
            pointer,
            "cannot remove the document root",
        ));
    }
    let tokens = split(pointer)?;
    let (parent, token) = walk_parent(doc, pointer, &tokens)?;
    match parent {
        Value::Object(map) => {
            if map.remove(&token).is_none() {
                return Err(AtForgeError::path_not_found(pointer));
            }
            Ok(())
        }
        Value::Array(items) => {
            let idx = parse_index(pointer, &token)?;
            let in_range = usize::try_from(idx)
                .ok()
                .filter(|i| *i < items.len())
                .ok_or_else(|| AtForgeError::index_out_of_range(pointer, idx))?;
            items.remove(in_range);
            Ok(())
        }
        _ => Err(AtForgeError::invalid_pointer(
            pointer,
            "parent is not a container",
        )),
    }
}

/// Copy-on-write `set`: returns the updated document, the input untouched.
/// With `create_only`, an already-occupied target fails with `PathExists`.
pub fn set(doc: &Value, pointer: &str, value: Value, create_only: bool) -> Result<Value> {
    let mut out = doc.clone();
    set_in_place(&mut out, pointer, value, create_only)?;
    Ok(out)
}

/// Copy-on-write `remove`: returns the updated document.
pub fn remove(doc: &Value, pointer: &str) -> Result<Value> {
    let mut out = doc.clone();
    remove_in_place(&mut out, pointer)?;
    Ok(out)
}
