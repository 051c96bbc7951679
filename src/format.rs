//! Restricted expressions for custom output and conditions
//!
//! The CLI accepts `--value` expressions for custom `--format` output and
//! `--condition` expressions for filtering. Both are evaluated by a small
//! interpreter instead of a general-purpose language: identifiers resolve
//! to `name`, `root`, `data` or a data attribute, values can be indexed
//! with `["key"]` or `.key`, and the only functions are the path helpers
//! `basename` and `dirname`. Conditions additionally support comparison
//! operators; anything else is rejected.

use std::path::Path;

use crate::error::Error;
use crate::value::{Map, Value};

/// Node attributes exposed to expressions
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    pub name: &'a str,
    pub root: Option<&'a str>,
    pub data: &'a Map,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Dot,
    Compare(Compare),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compare {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

fn invalid(expression: &str, message: &str) -> Error {
    Error::General(format!("Invalid expression '{expression}': {message}."))
}

fn tokenize(expression: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expression.chars().collect();
    let mut index = 0;
    while index < chars.len() {
        let c = chars[index];
        match c {
            ' ' | '\t' => index += 1,
            '[' => {
                tokens.push(Token::LBracket);
                index += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                index += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                index += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                index += 1;
            }
            '.' if chars
                .get(index + 1)
                .map(|next| !next.is_ascii_digit())
                .unwrap_or(true) =>
            {
                tokens.push(Token::Dot);
                index += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut literal = String::new();
                index += 1;
                loop {
                    match chars.get(index) {
                        Some(&ch) if ch == quote => {
                            index += 1;
                            break;
                        }
                        Some(&ch) => {
                            literal.push(ch);
                            index += 1;
                        }
                        None => {
                            return Err(invalid(expression, "unterminated string literal"));
                        }
                    }
                }
                tokens.push(Token::Str(literal));
            }
            '=' | '!' | '<' | '>' => {
                let double = chars.get(index + 1) == Some(&'=');
                let op = match (c, double) {
                    ('=', true) => Compare::Eq,
                    ('!', true) => Compare::NotEq,
                    ('<', true) => Compare::LessEq,
                    ('>', true) => Compare::GreaterEq,
                    ('<', false) => Compare::Less,
                    ('>', false) => Compare::Greater,
                    _ => return Err(invalid(expression, "unknown operator")),
                };
                tokens.push(Token::Compare(op));
                index += if double { 2 } else { 1 };
            }
            _ if c.is_ascii_digit()
                || (c == '-'
                    && chars
                        .get(index + 1)
                        .map(|next| next.is_ascii_digit())
                        .unwrap_or(false)) =>
            {
                let start = index;
                index += 1;
                while index < chars.len()
                    && (chars[index].is_ascii_digit() || chars[index] == '.')
                {
                    index += 1;
                }
                let text: String = chars[start..index].iter().collect();
                if let Ok(value) = text.parse::<i64>() {
                    tokens.push(Token::Int(value));
                } else if let Ok(value) = text.parse::<f64>() {
                    tokens.push(Token::Float(value));
                } else {
                    return Err(invalid(expression, "malformed number"));
                }
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = index;
                while index < chars.len()
                    && (chars[index].is_ascii_alphanumeric()
                        || chars[index] == '_'
                        || chars[index] == '-')
                {
                    index += 1;
                }
                tokens.push(Token::Ident(chars[start..index].iter().collect()));
            }
            _ => {
                return Err(invalid(expression, "unexpected character"));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    expression: &'a str,
    node: NodeView<'a>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, token: Token) -> Result<(), Error> {
        if self.next().as_ref() == Some(&token) {
            Ok(())
        } else {
            Err(invalid(self.expression, "unexpected token"))
        }
    }

    fn comparison(&mut self) -> Result<Value, Error> {
        let left = self.term()?;
        let Some(Token::Compare(op)) = self.peek().cloned() else {
            return Ok(left);
        };
        self.next();
        let right = self.term()?;
        Ok(Value::Bool(compare(&left, &right, op, self.expression)?))
    }

    fn term(&mut self) -> Result<Value, Error> {
        let mut value = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::LBracket) => {
                    self.next();
                    let key = match self.next() {
                        Some(Token::Str(key)) => Key::Name(key),
                        Some(Token::Int(index)) => Key::Index(index),
                        _ => return Err(invalid(self.expression, "expected subscript")),
                    };
                    self.expect(Token::RBracket)?;
                    value = subscript(&value, &key);
                }
                Some(Token::Dot) => {
                    self.next();
                    let Some(Token::Ident(key)) = self.next() else {
                        return Err(invalid(self.expression, "expected attribute name"));
                    };
                    value = subscript(&value, &Key::Name(key));
                }
                _ => return Ok(value),
            }
        }
    }

    fn primary(&mut self) -> Result<Value, Error> {
        match self.next() {
            Some(Token::Str(text)) => Ok(Value::String(text)),
            Some(Token::Int(value)) => Ok(Value::Int(value)),
            Some(Token::Float(value)) => Ok(Value::Float(value)),
            Some(Token::Ident(ident)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.next();
                    let argument = self.comparison()?;
                    self.expect(Token::RParen)?;
                    return self.call(&ident, argument);
                }
                Ok(self.resolve(&ident))
            }
            Some(Token::LParen) => {
                let value = self.comparison()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            _ => Err(invalid(self.expression, "expected a value")),
        }
    }

    /// Resolve a bare identifier: the node attributes by their name,
    /// boolean literals, or a data key.
    fn resolve(&self, ident: &str) -> Value {
        match ident {
            "name" => Value::String(self.node.name.to_string()),
            "root" => Value::String(self.node.root.unwrap_or_default().to_string()),
            "data" => Value::Map(self.node.data.clone()),
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            key => self.node.data.get(key).cloned().unwrap_or(Value::Null),
        }
    }

    fn call(&self, function: &str, argument: Value) -> Result<Value, Error> {
        let text = argument.to_display_string();
        match function {
            "basename" => Ok(Value::String(
                Path::new(&text)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )),
            "dirname" => Ok(Value::String(
                Path::new(&text)
                    .parent()
                    .map(|parent| parent.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )),
            other => Err(invalid(
                self.expression,
                &format!("unknown function '{other}'"),
            )),
        }
    }
}

enum Key {
    Name(String),
    Index(i64),
}

fn subscript(value: &Value, key: &Key) -> Value {
    match (value, key) {
        (Value::Map(map), Key::Name(name)) => map.get(name).cloned().unwrap_or(Value::Null),
        (Value::List(items), Key::Index(index)) => {
            let index = if *index < 0 {
                items.len() as i64 + index
            } else {
                *index
            };
            usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn compare(left: &Value, right: &Value, op: Compare, expression: &str) -> Result<bool, Error> {
    use std::cmp::Ordering;
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    };
    match op {
        Compare::Eq => Ok(ordering == Some(Ordering::Equal)),
        Compare::NotEq => Ok(ordering != Some(Ordering::Equal)),
        _ => {
            let Some(ordering) = ordering else {
                return Err(invalid(
                    expression,
                    &format!("cannot order {} and {}", left.kind(), right.kind()),
                ));
            };
            Ok(match op {
                Compare::Less => ordering == Ordering::Less,
                Compare::LessEq => ordering != Ordering::Greater,
                Compare::Greater => ordering == Ordering::Greater,
                Compare::GreaterEq => ordering != Ordering::Less,
                _ => unreachable!("equality handled above"),
            })
        }
    }
}

/// Evaluate an expression against a node.
pub fn evaluate(expression: &str, node: NodeView) -> Result<Value, Error> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        expression,
        node,
    };
    let value = parser.comparison()?;
    if parser.peek().is_some() {
        return Err(invalid(expression, "trailing input"));
    }
    Ok(value)
}

/// Evaluate a condition: the expression result in a boolean context.
pub fn evaluate_condition(expression: &str, node: NodeView) -> Result<bool, Error> {
    Ok(evaluate(expression, node)?.is_truthy())
}

/// Expand a format string with evaluated `--value` expressions.
///
/// Placeholders are `{}` (auto-numbered) or `{N}`; literal braces are
/// escaped by doubling. The sequence `\n` in the format string is
/// interpreted as a newline.
pub fn render(format: &str, values: &[String], node: NodeView) -> Result<String, Error> {
    let format = format.replace("\\n", "\n");
    let evaluated: Vec<String> = values
        .iter()
        .map(|expression| evaluate(expression, node).map(|value| render_value(&value)))
        .collect::<Result<_, _>>()?;

    let mut output = String::with_capacity(format.len());
    let mut auto_index = 0;
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '{' => {
                let mut spec = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => spec.push(ch),
                        None => {
                            return Err(Error::General(format!(
                                "Unbalanced braces in format '{format}'."
                            )));
                        }
                    }
                }
                let index = if spec.is_empty() {
                    let index = auto_index;
                    auto_index += 1;
                    index
                } else {
                    spec.parse::<usize>().map_err(|_| {
                        Error::General(format!("Invalid placeholder '{{{spec}}}'."))
                    })?
                };
                let value = evaluated.get(index).ok_or_else(|| {
                    Error::General(format!(
                        "Placeholder {{{index}}} has no matching --value."
                    ))
                })?;
                output.push_str(value);
            }
            other => output.push(other),
        }
    }
    Ok(output)
}

fn render_value(value: &Value) -> String {
    value.to_display_string()
}
