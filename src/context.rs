//! Context dimensions and the `when` expression language
//!
//! A context maps dimension names (`distro`, `arch`, ...) to one or more
//! version-structured values. Rules such as `distro < fedora-33 and arch
//! == x86_64` are evaluated against the context with three possible
//! outcomes: [`Outcome::True`], [`Outcome::False`] and
//! [`Outcome::CannotDecide`] when a comparison is undefined (for example
//! when the dimension is missing from the context). Boolean combinations
//! follow the Kleene truth tables.

use std::collections::HashMap;

use regex::Regex;

use crate::error::ContextError;

/// Result of evaluating a rule against a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    True,
    False,
    CannotDecide,
}

impl Outcome {
    pub fn and(self, other: Outcome) -> Outcome {
        match (self, other) {
            (Outcome::False, _) | (_, Outcome::False) => Outcome::False,
            (Outcome::True, Outcome::True) => Outcome::True,
            _ => Outcome::CannotDecide,
        }
    }

    pub fn or(self, other: Outcome) -> Outcome {
        match (self, other) {
            (Outcome::True, _) | (_, Outcome::True) => Outcome::True,
            (Outcome::False, Outcome::False) => Outcome::False,
            _ => Outcome::CannotDecide,
        }
    }

    pub fn is_true(self) -> bool {
        self == Outcome::True
    }
}

impl From<bool> for Outcome {
    fn from(value: bool) -> Self {
        if value {
            Outcome::True
        } else {
            Outcome::False
        }
    }
}

/// A dimension value split into a name and ordered version parts
///
/// `centos-8.3.0` has the name `centos` and version parts `8`, `3`, `0`.
/// A value with no separators has no version parts at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextValue {
    parts: Vec<String>,
}

impl ContextValue {
    /// Split a raw value on `:`, `.` and `-` separators.
    pub fn new(text: &str) -> Self {
        ContextValue {
            parts: text
                .split([':', '.', '-'])
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.parts.first().map(String::as_str)
    }

    pub fn version_parts(&self) -> &[String] {
        &self.parts[1.min(self.parts.len())..]
    }

    /// Compare two values, the right side defines the precision.
    ///
    /// `minor_mode` restricts ordering comparisons to matching major
    /// versions (the `~` prefixed operators). With `ordered` the result
    /// is a regular three-way comparison, otherwise only equality is
    /// decided (0 equal, 1 different). `None` means the comparison is
    /// undefined and the caller cannot decide.
    fn version_cmp(
        &self,
        other: &ContextValue,
        minor_mode: bool,
        ordered: bool,
        case_sensitive: bool,
    ) -> Option<i32> {
        let left = &self.parts;
        let right = &other.parts;
        if left.is_empty() || right.is_empty() {
            return None;
        }
        let eq = |a: &str, b: &str| {
            if case_sensitive {
                a == b
            } else {
                a.eq_ignore_ascii_case(b)
            }
        };
        if !eq(&left[0], &right[0]) {
            // Different names cannot be ordered
            if ordered {
                return None;
            }
            return Some(1);
        }
        if minor_mode && right.len() > 1 {
            // The right side cares about the major version
            let left_major = left.get(1)?;
            if !eq(left_major, &right[1]) {
                if ordered {
                    if right.len() > 2 {
                        // Minor comparison across mismatched majors
                        return None;
                    }
                } else {
                    return Some(1);
                }
            }
        }
        for (first, second) in left[1..].iter().zip(right[1..].iter()) {
            let compared = compare_part(first, second, case_sensitive);
            if compared != 0 {
                return Some(compared);
            }
        }
        let leftover = right.len() as i64 - left.len() as i64;
        if leftover <= 0 {
            // Everything the right side wanted compared equal
            Some(0)
        } else if minor_mode {
            None
        } else if !ordered {
            Some(1)
        } else if left.len() == 1 {
            // Ordering needs at least one version part on the left
            None
        } else {
            Some(-1)
        }
    }
}

/// Compare two version parts: numerically when both are integers,
/// lexically otherwise. The literal `rawhide` is greater than anything.
fn compare_part(first: &str, second: &str, case_sensitive: bool) -> i32 {
    let (first, second) = if case_sensitive {
        (first.to_string(), second.to_string())
    } else {
        (first.to_lowercase(), second.to_lowercase())
    };
    if first == second {
        return 0;
    }
    if first == "rawhide" {
        return 1;
    }
    if second == "rawhide" {
        return -1;
    }
    match (first.parse::<i64>(), second.parse::<i64>()) {
        (Ok(a), Ok(b)) => ordering_to_i32(a.cmp(&b)),
        _ => ordering_to_i32(first.cmp(&second)),
    }
}

fn ordering_to_i32(ordering: std::cmp::Ordering) -> i32 {
    match ordering {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

/// Binary comparison operators of the rule language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    MinorEq,
    MinorNotEq,
    MinorLess,
    MinorLessEq,
    MinorGreater,
    MinorGreaterEq,
}

#[derive(Debug, Clone, PartialEq)]
enum Expression {
    Literal(bool),
    Defined { dimension: String, negated: bool },
    Binary {
        dimension: String,
        op: Op,
        values: Vec<ContextValue>,
    },
}

/// Turn single `=` into `==` unless it is part of another operator.
fn normalize_equals(rule: &str) -> String {
    let chars: Vec<char> = rule.chars().collect();
    let mut out = String::with_capacity(rule.len());
    for (index, &c) in chars.iter().enumerate() {
        out.push(c);
        if c != '=' {
            continue;
        }
        let prev = index.checked_sub(1).map(|i| chars[i]);
        let next = chars.get(index + 1);
        let part_of_operator = matches!(prev, Some('=') | Some('!') | Some('~') | Some('<') | Some('>'))
            || next == Some(&'=');
        if !part_of_operator {
            out.push('=');
        }
    }
    out
}

/// Parse a rule into or-groups of and-joined expressions.
fn parse_rule(rule: &str) -> Result<Vec<Vec<Expression>>, ContextError> {
    let normalized = normalize_equals(rule);
    let or_split = Regex::new(r"\bor\b").unwrap();
    let and_split = Regex::new(r"\band\b").unwrap();
    let mut groups = Vec::new();
    for or_group in or_split.split(&normalized) {
        if or_group.trim().is_empty() {
            return Err(ContextError::InvalidExpression(rule.to_string()));
        }
        let mut expressions = Vec::new();
        for part in and_split.split(or_group) {
            let part = part.trim();
            if part.is_empty() {
                return Err(ContextError::InvalidExpression(rule.to_string()));
            }
            expressions.push(parse_expression(part)?);
        }
        groups.push(expressions);
    }
    Ok(groups)
}

fn parse_expression(part: &str) -> Result<Expression, ContextError> {
    match part {
        "true" => return Ok(Expression::Literal(true)),
        "false" => return Ok(Expression::Literal(false)),
        _ => {}
    }
    // Longest operators first so that '~<=' wins over '~<'
    let triple = Regex::new(
        r"^([\w-]+)\s*(~<=|~>=|~!=|~=|~<|~>|<=|>=|==|!=|<|>)\s*([^=].*)$",
    )
    .unwrap();
    if let Some(captures) = triple.captures(part) {
        let op = match &captures[2] {
            "==" => Op::Eq,
            "!=" => Op::NotEq,
            "<" => Op::Less,
            "<=" => Op::LessEq,
            ">" => Op::Greater,
            ">=" => Op::GreaterEq,
            "~=" => Op::MinorEq,
            "~!=" => Op::MinorNotEq,
            "~<" => Op::MinorLess,
            "~<=" => Op::MinorLessEq,
            "~>" => Op::MinorGreater,
            "~>=" => Op::MinorGreaterEq,
            _ => unreachable!("operator alternation covers all arms"),
        };
        let values = captures[3]
            .split(',')
            .map(|value| ContextValue::new(value.trim()))
            .collect();
        return Ok(Expression::Binary {
            dimension: captures[1].to_string(),
            op,
            values,
        });
    }
    let double = Regex::new(r"^([\w-]+)\s+is\s+(not\s+)?defined$").unwrap();
    if let Some(captures) = double.captures(part) {
        return Ok(Expression::Defined {
            dimension: captures[1].to_string(),
            negated: captures.get(2).is_some(),
        });
    }
    Err(ContextError::InvalidExpression(part.to_string()))
}

/// Evaluation context: dimension name to the list of its values
#[derive(Debug, Clone)]
pub struct Context {
    dimensions: HashMap<String, Vec<ContextValue>>,
    case_sensitive: bool,
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            dimensions: HashMap::new(),
            case_sensitive: true,
        }
    }

    /// Fold both sides of every comparison to lower case.
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Add a dimension with one or more raw values.
    pub fn with_dimension<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dimensions.insert(
            name.to_string(),
            values
                .into_iter()
                .map(|value| ContextValue::new(value.as_ref()))
                .collect(),
        );
        self
    }

    /// Build a context from a rule consisting only of `==` expressions
    /// joined by `and`, e.g. `distro == fedora-33 and arch == x86_64`.
    pub fn from_rule(rule: &str) -> Result<Self, ContextError> {
        let mut groups = parse_rule(rule)?;
        if groups.len() != 1 {
            return Err(ContextError::InvalidContext(format!(
                "'or' is not allowed when defining a context: '{rule}'"
            )));
        }
        let mut context = Context::new();
        for expression in groups.remove(0) {
            match expression {
                Expression::Binary {
                    dimension,
                    op: Op::Eq,
                    values,
                } => {
                    context.dimensions.insert(dimension, values);
                }
                _ => {
                    return Err(ContextError::InvalidContext(format!(
                        "only '==' expressions can define a context: '{rule}'"
                    )));
                }
            }
        }
        Ok(context)
    }

    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.contains_key(name)
    }

    /// Evaluate a rule against this context.
    pub fn matches(&self, rule: &str) -> Result<Outcome, ContextError> {
        let groups = parse_rule(rule)?;
        let mut outcome = Outcome::False;
        for group in groups {
            let mut group_outcome = Outcome::True;
            for expression in group {
                group_outcome = group_outcome.and(self.evaluate(&expression));
                if group_outcome == Outcome::False {
                    break;
                }
            }
            outcome = outcome.or(group_outcome);
            if outcome == Outcome::True {
                break;
            }
        }
        Ok(outcome)
    }

    fn evaluate(&self, expression: &Expression) -> Outcome {
        match expression {
            Expression::Literal(value) => Outcome::from(*value),
            Expression::Defined { dimension, negated } => {
                Outcome::from(self.has_dimension(dimension) != *negated)
            }
            Expression::Binary {
                dimension,
                op,
                values,
            } => {
                let Some(dimension_values) = self.dimensions.get(dimension) else {
                    return Outcome::CannotDecide;
                };
                // Cross every dimension value with every rule value, the
                // first successful match wins
                let mut decided = false;
                for dimension_value in dimension_values {
                    for rule_value in values {
                        match self.compare(*op, dimension_value, rule_value) {
                            Some(true) => return Outcome::True,
                            Some(false) => decided = true,
                            None => {}
                        }
                    }
                }
                if decided {
                    Outcome::False
                } else {
                    Outcome::CannotDecide
                }
            }
        }
    }

    fn compare(&self, op: Op, left: &ContextValue, right: &ContextValue) -> Option<bool> {
        let cs = self.case_sensitive;
        match op {
            Op::Eq => left.version_cmp(right, false, false, cs).map(|c| c == 0),
            Op::NotEq => left.version_cmp(right, false, false, cs).map(|c| c != 0),
            Op::Less => left.version_cmp(right, false, true, cs).map(|c| c < 0),
            Op::LessEq => left.version_cmp(right, false, true, cs).map(|c| c <= 0),
            Op::Greater => left.version_cmp(right, false, true, cs).map(|c| c > 0),
            Op::GreaterEq => left.version_cmp(right, false, true, cs).map(|c| c >= 0),
            Op::MinorEq => left.version_cmp(right, true, false, cs).map(|c| c == 0),
            Op::MinorNotEq => left.version_cmp(right, true, false, cs).map(|c| c != 0),
            Op::MinorLess => left.version_cmp(right, true, true, cs).map(|c| c < 0),
            Op::MinorLessEq => left.version_cmp(right, true, true, cs).map(|c| c <= 0),
            Op::MinorGreater => left.version_cmp(right, true, true, cs).map(|c| c > 0),
            Op::MinorGreaterEq => left.version_cmp(right, true, true, cs).map(|c| c >= 0),
        }
    }
}
