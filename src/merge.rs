//! Typed merge operators
//!
//! Keys of an incoming mapping may carry an operator suffix which decides
//! how the incoming value is combined with the value already present under
//! the base key. Operations are applied in the declared order of the
//! incoming mapping and the suffix is stripped from the stored key.

use regex::Regex;

use crate::error::Error;
use crate::value::{Map, Value};

/// Merge operator parsed from a key suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// No suffix: replace the current value
    Replace,
    /// `+`: extend the current value
    Append,
    /// `+<`: extend the current value, lists are prepended
    Prepend,
    /// `-`: reduce the current value
    Reduce,
    /// `~`: regex substitution on the current value
    Substitute,
    /// `-~`: regex based removal from the current value
    Erase,
}

/// Split a data key into its base name and merge operator.
pub fn split_key(key: &str) -> (&str, Operator) {
    if let Some(base) = key.strip_suffix("+<") {
        (base, Operator::Prepend)
    } else if let Some(base) = key.strip_suffix("-~") {
        (base, Operator::Erase)
    } else if let Some(base) = key.strip_suffix('+') {
        (base, Operator::Append)
    } else if let Some(base) = key.strip_suffix('-') {
        (base, Operator::Reduce)
    } else if let Some(base) = key.strip_suffix('~') {
        (base, Operator::Substitute)
    } else {
        (key, Operator::Replace)
    }
}

/// Merge `source` into `data`, applying operator suffixes.
///
/// The `node` name is only used in error messages.
pub fn merge_data(data: &mut Map, source: &Map, node: &str) -> Result<(), Error> {
    for (key, value) in source {
        let (base, operator) = split_key(key);
        match operator {
            Operator::Replace => {
                data.insert(base.to_string(), value.clone());
            }
            Operator::Append => merge_plus(data, base, value, false, node)?,
            Operator::Prepend => merge_plus(data, base, value, true, node)?,
            Operator::Reduce => merge_minus(data, base, value, node)?,
            Operator::Substitute => merge_substitute(data, base, value, node)?,
            Operator::Erase => merge_erase(data, base, value, node)?,
        }
    }
    Ok(())
}

fn merge_error(node: &str, key: &str, message: impl Into<String>) -> Error {
    Error::Merge {
        node: node.to_string(),
        key: key.to_string(),
        message: message.into(),
    }
}

/// Compile a pattern, reporting failures as merge errors.
fn pattern(node: &str, key: &str, pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|error| merge_error(node, key, format!("invalid pattern: {error}")))
}

fn merge_plus(
    data: &mut Map,
    base: &str,
    value: &Value,
    prepend: bool,
    node: &str,
) -> Result<(), Error> {
    // Nothing to extend, keep the incoming value as is (inner suffixes
    // stay deferred until a matching mapping shows up)
    let Some(current) = data.get(base).cloned() else {
        data.insert(base.to_string(), value.clone());
        return Ok(());
    };
    let merged = match (current, value) {
        (Value::Map(mut current), Value::Map(incoming)) => {
            merge_data(&mut current, incoming, node)?;
            Value::Map(current)
        }
        (Value::List(current), Value::List(incoming)) => {
            let mut items = Vec::with_capacity(current.len() + incoming.len());
            if prepend {
                items.extend(incoming.iter().cloned());
                items.extend(current);
            } else {
                items.extend(current);
                items.extend(incoming.iter().cloned());
            }
            Value::List(items)
        }
        (Value::Int(current), Value::Int(incoming)) => Value::Int(current + incoming),
        (Value::Float(current), Value::Float(incoming)) => Value::Float(current + incoming),
        (Value::Int(current), Value::Float(incoming)) => Value::Float(current as f64 + incoming),
        (Value::Float(current), Value::Int(incoming)) => Value::Float(current + *incoming as f64),
        (Value::String(current), Value::String(incoming)) => {
            if prepend {
                Value::String(format!("{incoming}{current}"))
            } else {
                Value::String(format!("{current}{incoming}"))
            }
        }
        // Apply the current mapping as the base of every incoming element
        (Value::Map(current), Value::List(incoming)) => {
            let mut items = Vec::with_capacity(incoming.len());
            for item in incoming {
                let Some(patch) = item.as_map() else {
                    return Err(merge_error(
                        node,
                        base,
                        format!("cannot update a {} with a mapping", item.kind()),
                    ));
                };
                let mut element = current.clone();
                merge_data(&mut element, patch, node)?;
                items.push(Value::Map(element));
            }
            Value::List(items)
        }
        // Distribute the incoming mapping into every current element
        (Value::List(current), Value::Map(incoming)) => {
            let mut items = Vec::with_capacity(current.len());
            for item in current {
                let kind = item.kind();
                let Value::Map(mut element) = item else {
                    return Err(merge_error(
                        node,
                        base,
                        format!("cannot update a {kind} with a mapping"),
                    ));
                };
                merge_data(&mut element, incoming, node)?;
                items.push(Value::Map(element));
            }
            Value::List(items)
        }
        (current, incoming) => {
            return Err(merge_error(
                node,
                base,
                format!("cannot merge a {} with a {}", incoming.kind(), current.kind()),
            ));
        }
    };
    data.insert(base.to_string(), merged);
    Ok(())
}

fn merge_minus(data: &mut Map, base: &str, value: &Value, node: &str) -> Result<(), Error> {
    // Reducing an attribute the parent never defined is a no-op
    let Some(current) = data.get(base).cloned() else {
        return Ok(());
    };
    let reduced = match (current, value) {
        (Value::Int(current), Value::Int(incoming)) => Value::Int(current - incoming),
        (Value::Float(current), Value::Float(incoming)) => Value::Float(current - incoming),
        (Value::Int(current), Value::Float(incoming)) => Value::Float(current as f64 - incoming),
        (Value::Float(current), Value::Int(incoming)) => Value::Float(current - *incoming as f64),
        (Value::String(current), Value::String(incoming)) => {
            let regex = pattern(node, base, incoming)?;
            Value::String(regex.replace_all(&current, "").into_owned())
        }
        (Value::String(current), Value::List(incoming)) => {
            let mut text = current;
            for item in incoming {
                let Some(expression) = item.as_str() else {
                    return Err(merge_error(node, base, "patterns must be strings"));
                };
                let regex = pattern(node, base, expression)?;
                text = regex.replace_all(&text, "").into_owned();
            }
            Value::String(text)
        }
        (Value::List(current), Value::List(incoming)) => Value::List(
            current
                .into_iter()
                .filter(|item| !incoming.contains(item))
                .collect(),
        ),
        (Value::Map(mut current), Value::List(incoming)) => {
            for item in incoming {
                let Some(key) = item.as_str() else {
                    return Err(merge_error(node, base, "removed keys must be strings"));
                };
                current.shift_remove(key);
            }
            Value::Map(current)
        }
        (current, incoming) => {
            return Err(merge_error(
                node,
                base,
                format!(
                    "cannot reduce a {} with a {}",
                    current.kind(),
                    incoming.kind()
                ),
            ));
        }
    };
    data.insert(base.to_string(), reduced);
    Ok(())
}

/// Parse a `dPATTERNdREPLACEMENTd` substitution where the first character
/// is the delimiter.
fn parse_substitution(raw: &str) -> Result<(&str, &str), String> {
    let mut chars = raw.chars();
    let delimiter = chars
        .next()
        .ok_or_else(|| String::from("empty substitution"))?;
    let body = &raw[delimiter.len_utf8()..];
    let parts: Vec<&str> = body.split(delimiter).collect();
    match parts.as_slice() {
        [pattern, replacement, rest] if rest.is_empty() => Ok((pattern, replacement)),
        _ => Err(format!(
            "expected '{d}pattern{d}replacement{d}', got '{raw}'",
            d = delimiter
        )),
    }
}

fn substitutions(node: &str, base: &str, value: &Value) -> Result<Vec<(Regex, String)>, Error> {
    let raw_items: Vec<&str> = match value {
        Value::String(item) => vec![item.as_str()],
        Value::List(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| merge_error(node, base, "substitutions must be strings"))
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(merge_error(
                node,
                base,
                format!("substitutions must be strings, got a {}", other.kind()),
            ));
        }
    };
    let mut compiled = Vec::with_capacity(raw_items.len());
    for raw in raw_items {
        let (expression, replacement) =
            parse_substitution(raw).map_err(|message| merge_error(node, base, message))?;
        compiled.push((pattern(node, base, expression)?, replacement.to_string()));
    }
    Ok(compiled)
}

fn merge_substitute(data: &mut Map, base: &str, value: &Value, node: &str) -> Result<(), Error> {
    // Substituting into an attribute the parent never defined is a no-op
    let Some(current) = data.get(base).cloned() else {
        return Ok(());
    };
    let subs = substitutions(node, base, value)?;
    let apply = |text: &str| {
        let mut out = text.to_string();
        for (regex, replacement) in &subs {
            out = regex.replace_all(&out, replacement.as_str()).into_owned();
        }
        out
    };
    let substituted = match current {
        Value::String(text) => Value::String(apply(&text)),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let Some(text) = item.as_str() else {
                    return Err(merge_error(
                        node,
                        base,
                        format!("cannot substitute in a {}", item.kind()),
                    ));
                };
                out.push(Value::String(apply(text)));
            }
            Value::List(out)
        }
        other => {
            return Err(merge_error(
                node,
                base,
                format!("cannot substitute in a {}", other.kind()),
            ));
        }
    };
    data.insert(base.to_string(), substituted);
    Ok(())
}

fn erase_patterns(node: &str, base: &str, value: &Value) -> Result<Vec<Regex>, Error> {
    let raw_items: Vec<&str> = match value {
        Value::String(item) => vec![item.as_str()],
        Value::List(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| merge_error(node, base, "patterns must be strings"))
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(merge_error(
                node,
                base,
                format!("patterns must be strings, got a {}", other.kind()),
            ));
        }
    };
    raw_items
        .into_iter()
        .map(|raw| pattern(node, base, raw))
        .collect()
}

fn merge_erase(data: &mut Map, base: &str, value: &Value, node: &str) -> Result<(), Error> {
    // Removing from an attribute the parent never defined is a no-op
    let Some(current) = data.get(base).cloned() else {
        return Ok(());
    };
    let patterns = erase_patterns(node, base, value)?;
    let matches = |text: &str| patterns.iter().any(|regex| regex.is_match(text));
    let erased = match current {
        Value::List(items) => Value::List(
            items
                .into_iter()
                .filter(|item| !matches(&item.to_display_string()))
                .collect(),
        ),
        Value::String(text) => {
            if matches(&text) {
                Value::String(String::new())
            } else {
                Value::String(text)
            }
        }
        Value::Map(mut map) => {
            map.retain(|key, _| !matches(key));
            Value::Map(map)
        }
        other => {
            return Err(merge_error(
                node,
                base,
                format!("cannot remove from a {}", other.kind()),
            ));
        }
    };
    data.insert(base.to_string(), erased);
    Ok(())
}
