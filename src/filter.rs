//! Advanced filter expressions over node attributes
//!
//! A filter combines `key: pattern` atoms with `|` (or) and `&` (and):
//!
//! ```text
//! tag: Tier1 | tag: Tier2 | tag: Tier3
//! category: Sanity, Security & tag: -destructive
//! ```
//!
//! Comma-separated values are a shortcut for value-level alternatives and
//! a leading `-` negates an atom. An atom without a colon is a regular
//! expression matched against the node name. Both operators can be
//! escaped with a backslash inside patterns (`tag: Tier(1\|2)`).

use indexmap::IndexMap;
use regex::Regex;

use crate::error::FilterError;
use crate::value::{Map, Value};

/// Matching options
#[derive(Debug, Clone, Copy)]
pub struct FilterOptions {
    /// Case-sensitive matching (folds filter, keys and values when off)
    pub sensitive: bool,
    /// Treat patterns as anchored regular expressions instead of plain
    /// string equality
    pub regexp: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            sensitive: true,
            regexp: false,
        }
    }
}

/// Check whether the filter matches the given data.
///
/// `name` provides the node name for colon-less atoms; filters which use
/// such an atom fail with [`FilterError::MissingName`] when it is absent.
/// Atoms referring to keys missing from the data evaluate false.
pub fn matches(
    filter: &str,
    data: &Map,
    name: Option<&str>,
    options: &FilterOptions,
) -> Result<bool, FilterError> {
    if filter.trim().is_empty() {
        return Ok(true);
    }

    // Stringify the data, lists element-wise
    let mut stringified: IndexMap<String, Vec<String>> = IndexMap::new();
    for (key, value) in data {
        let values = match value {
            Value::List(items) => items.iter().map(Value::to_display_string).collect(),
            other => vec![other.to_display_string()],
        };
        stringified.insert(key.clone(), values);
    }

    let (filter, name) = if options.sensitive {
        (filter.to_string(), name.map(str::to_string))
    } else {
        let lowered = stringified
            .into_iter()
            .map(|(key, values)| {
                (
                    key.to_lowercase(),
                    values.into_iter().map(|v| v.to_lowercase()).collect(),
                )
            })
            .collect();
        stringified = lowered;
        (filter.to_lowercase(), name.map(str::to_lowercase))
    };

    // At least one or-clause must match
    for clause in split_unescaped(&filter, '|') {
        if check_clause(&clause, &stringified, name.as_deref(), options)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Split on an operator, skipping backslash-escaped occurrences.
/// Escape pairs are kept verbatim for [`unescape`] at the atom level.
fn split_unescaped(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == separator {
            parts.push(current.clone());
            current.clear();
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// Turn `\|` and `\&` into the literal operator characters.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) if next == '|' || next == '&' => out.push(next),
                Some(next) => {
                    out.push(c);
                    out.push(next);
                }
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn check_clause(
    clause: &str,
    data: &IndexMap<String, Vec<String>>,
    name: Option<&str>,
    options: &FilterOptions,
) -> Result<bool, FilterError> {
    // Group literal values by dimension, keep name atoms aside
    let mut literals: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut name_atoms: Vec<String> = Vec::new();
    for literal in split_unescaped(clause, '&') {
        let literal = literal.trim();
        if literal.is_empty() {
            return Err(FilterError::InvalidFilter(clause.trim().to_string()));
        }
        match literal.split_once(':') {
            Some((dimension, value)) => literals
                .entry(dimension.trim().to_string())
                .or_default()
                .push(unescape(value.trim())),
            None => name_atoms.push(unescape(literal)),
        }
    }

    for atom in &name_atoms {
        let Some(name) = name else {
            return Err(FilterError::MissingName);
        };
        let regex = compile(atom)?;
        if !regex.is_match(name) {
            return Ok(false);
        }
    }

    for (dimension, values) in &literals {
        // A key missing from the data makes the atom false
        let Some(data_values) = data.get(dimension) else {
            return Ok(false);
        };
        for value in values {
            if !check_value(data_values, value, options)? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Check a single value (possibly a comma-separated list of alternatives)
/// against the data values of its dimension.
fn check_value(
    data_values: &[String],
    value: &str,
    options: &FilterOptions,
) -> Result<bool, FilterError> {
    for atom in value.split(',').map(str::trim) {
        if let Some(atom) = atom.strip_prefix('-') {
            // Negated: good when no data value matches
            let mut found = false;
            for data_value in data_values {
                if match_value(atom, data_value, options)? {
                    found = true;
                    break;
                }
            }
            if !found {
                return Ok(true);
            }
        } else {
            for data_value in data_values {
                if match_value(atom, data_value, options)? {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

fn match_value(pattern: &str, text: &str, options: &FilterOptions) -> Result<bool, FilterError> {
    if options.regexp {
        let regex = compile(&format!("^(?:{pattern})$"))?;
        Ok(regex.is_match(text))
    } else {
        Ok(pattern == text)
    }
}

fn compile(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(pattern).map_err(|error| FilterError::InvalidPattern {
        pattern: pattern.to_string(),
        source: error,
    })
}
