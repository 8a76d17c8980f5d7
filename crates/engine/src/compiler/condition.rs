// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conditional-node expression evaluator.
//!
//! Expressions arrive with placeholders already replaced by JSON literals,
//! so the grammar is a small JavaScript-like subset over `serde_json::Value`:
//!
//! ```text
//! or      := and ("||" and)*
//! and     := eq ("&&" eq)*
//! eq      := rel (("==" | "===" | "!=" | "!==") rel)*
//! rel     := add (("<" | "<=" | ">" | ">=") add)*
//! add     := unary (("+" | "-") unary)*
//! unary   := ("!" | "-") unary | postfix
//! postfix := primary ("." ident | "[" or "]")*
//! primary := number | string | true | false | null | undefined
//!          | "(" or ")" | "[" list "]" | "{" members "}"
//! ```

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("unterminated string starting at {0}")]
    UnterminatedString(usize),
    #[error("unexpected token '{found}' at {pos}")]
    UnexpectedToken { pos: usize, found: String },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("empty expression")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
}

const OPS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "-", "+", "(", ")", "[", "]",
    "{", "}", ",", ":", ".",
];

fn tokenize(src: &str) -> Result<Vec<(usize, Tok)>, ConditionError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                // a dot not followed by a digit belongs to property access
                if chars[i].1 == '.' && !chars.get(i + 1).is_some_and(|(_, n)| n.is_ascii_digit()) {
                    break;
                }
                i += 1;
            }
            if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j].1, '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].1.is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].1.is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let end = chars.get(i).map_or(src.len(), |(p, _)| *p);
            let text = &src[chars[start].0..end];
            let n = text
                .parse::<f64>()
                .map_err(|_| ConditionError::UnexpectedToken { pos, found: text.to_string() })?;
            out.push((pos, Tok::Num(n)));
        } else if c == '"' || c == '\'' {
            let mut s = String::new();
            i += 1;
            loop {
                let Some(&(_, ch)) = chars.get(i) else {
                    return Err(ConditionError::UnterminatedString(pos));
                };
                i += 1;
                if ch == c {
                    break;
                }
                if ch == '\\' {
                    let Some(&(_, esc)) = chars.get(i) else {
                        return Err(ConditionError::UnterminatedString(pos));
                    };
                    i += 1;
                    s.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                } else {
                    s.push(ch);
                }
            }
            out.push((pos, Tok::Str(s)));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let end = chars.get(i).map_or(src.len(), |(p, _)| *p);
            out.push((pos, Tok::Ident(src[chars[start].0..end].to_string())));
        } else {
            let rest = &src[pos..];
            let op = OPS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or(ConditionError::UnexpectedChar { pos, ch: c })?;
            i += op.chars().count();
            out.push((pos, Tok::Op(*op)));
        }
    }
    Ok(out)
}

struct Parser {
    toks: Vec<(usize, Tok)>,
    at: usize,
}

impl Parser {
    fn peek_op(&self) -> Option<&'static str> {
        match self.toks.get(self.at) {
            Some((_, Tok::Op(op))) => Some(*op),
            _ => None,
        }
    }

    fn eat(&mut self, op: &str) -> bool {
        if self.peek_op() == Some(op) {
            self.at += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, op: &str) -> Result<(), ConditionError> {
        if self.eat(op) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> ConditionError {
        match self.toks.get(self.at) {
            None => ConditionError::UnexpectedEnd,
            Some((pos, tok)) => ConditionError::UnexpectedToken {
                pos: *pos,
                found: match tok {
                    Tok::Num(n) => n.to_string(),
                    Tok::Str(s) => format!("{s:?}"),
                    Tok::Ident(s) => s.clone(),
                    Tok::Op(op) => op.to_string(),
                },
            },
        }
    }

    fn or(&mut self) -> Result<Value, ConditionError> {
        let mut left = self.and()?;
        while self.eat("||") {
            let right = self.and()?;
            left = if is_truthy(&left) { left } else { right };
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Value, ConditionError> {
        let mut left = self.eq()?;
        while self.eat("&&") {
            let right = self.eq()?;
            left = if is_truthy(&left) { right } else { left };
        }
        Ok(left)
    }

    fn eq(&mut self) -> Result<Value, ConditionError> {
        let mut left = self.rel()?;
        loop {
            let op = match self.peek_op() {
                Some(op @ ("==" | "===" | "!=" | "!==")) => op,
                _ => return Ok(left),
            };
            self.at += 1;
            let right = self.rel()?;
            let result = match op {
                "==" => loose_eq(&left, &right),
                "!=" => !loose_eq(&left, &right),
                "===" => strict_eq(&left, &right),
                _ => !strict_eq(&left, &right),
            };
            left = Value::Bool(result);
        }
    }

    fn rel(&mut self) -> Result<Value, ConditionError> {
        let mut left = self.add()?;
        loop {
            let op = match self.peek_op() {
                Some(op @ ("<" | "<=" | ">" | ">=")) => op,
                _ => return Ok(left),
            };
            self.at += 1;
            let right = self.add()?;
            left = Value::Bool(compare(op, &left, &right));
        }
    }

    fn add(&mut self) -> Result<Value, ConditionError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek_op() {
                Some(op @ ("+" | "-")) => op,
                _ => return Ok(left),
            };
            self.at += 1;
            let right = self.unary()?;
            left = if op == "+" && (left.is_string() || right.is_string()) {
                Value::String(format!("{}{}", display(&left), display(&right)))
            } else if op == "+" {
                number(to_number(&left) + to_number(&right))
            } else {
                number(to_number(&left) - to_number(&right))
            };
        }
    }

    fn unary(&mut self) -> Result<Value, ConditionError> {
        if self.eat("!") {
            let v = self.unary()?;
            return Ok(Value::Bool(!is_truthy(&v)));
        }
        if self.eat("-") {
            let v = self.unary()?;
            return Ok(number(-to_number(&v)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Value, ConditionError> {
        let mut value = self.primary()?;
        loop {
            if self.eat(".") {
                let name = match self.toks.get(self.at) {
                    Some((_, Tok::Ident(name))) => name.clone(),
                    _ => return Err(self.unexpected()),
                };
                self.at += 1;
                value = property(&value, &name);
            } else if self.eat("[") {
                let index = self.or()?;
                self.expect("]")?;
                value = match (&value, &index) {
                    (Value::Array(items), Value::Number(n)) => n
                        .as_f64()
                        .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                        .and_then(|f| items.get(f as usize).cloned())
                        .unwrap_or(Value::Null),
                    _ => property(&value, &display(&index)),
                };
            } else {
                return Ok(value);
            }
        }
    }

    fn primary(&mut self) -> Result<Value, ConditionError> {
        let Some((_, tok)) = self.toks.get(self.at).cloned() else {
            return Err(ConditionError::UnexpectedEnd);
        };
        match tok {
            Tok::Num(n) => {
                self.at += 1;
                Ok(number(n))
            }
            Tok::Str(s) => {
                self.at += 1;
                Ok(Value::String(s))
            }
            Tok::Ident(id) => {
                self.at += 1;
                match id.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" | "undefined" => Ok(Value::Null),
                    _ => Err(ConditionError::UnknownIdentifier(id)),
                }
            }
            Tok::Op("(") => {
                self.at += 1;
                let v = self.or()?;
                self.expect(")")?;
                Ok(v)
            }
            Tok::Op("[") => {
                self.at += 1;
                let mut items = Vec::new();
                if !self.eat("]") {
                    loop {
                        items.push(self.or()?);
                        if self.eat("]") {
                            break;
                        }
                        self.expect(",")?;
                    }
                }
                Ok(Value::Array(items))
            }
            Tok::Op("{") => {
                self.at += 1;
                let mut map = Map::new();
                if !self.eat("}") {
                    loop {
                        let key = match self.toks.get(self.at) {
                            Some((_, Tok::Str(k))) | Some((_, Tok::Ident(k))) => k.clone(),
                            _ => return Err(self.unexpected()),
                        };
                        self.at += 1;
                        self.expect(":")?;
                        map.insert(key, self.or()?);
                        if self.eat("}") {
                            break;
                        }
                        self.expect(",")?;
                    }
                }
                Ok(Value::Object(map))
            }
            Tok::Op(_) => Err(self.unexpected()),
        }
    }
}

fn number(n: f64) -> Value {
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

fn property(value: &Value, name: &str) -> Value {
    match (value, name) {
        (Value::String(s), "length") => number(s.chars().count() as f64),
        (Value::Array(items), "length") => number(items.len() as f64),
        (Value::Object(map), key) => map.get(key).cloned().unwrap_or(Value::Null),
        (Value::Array(items), key) => {
            key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()).unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_)) => to_number(a) == to_number(b),
        _ => strict_eq(a, b),
    }
}

fn compare(op: &str, a: &Value, b: &Value) -> bool {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return match op {
            "<" => x < y,
            "<=" => x <= y,
            ">" => x > y,
            _ => x >= y,
        };
    }
    let (x, y) = (to_number(a), to_number(b));
    match op {
        "<" => x < y,
        "<=" => x <= y,
        ">" => x > y,
        _ => x >= y,
    }
}

/// JavaScript truthiness.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Evaluate an expression to a value.
pub fn evaluate(expr: &str) -> Result<Value, ConditionError> {
    let toks = tokenize(expr)?;
    if toks.is_empty() {
        return Err(ConditionError::Empty);
    }
    let mut parser = Parser { toks, at: 0 };
    let value = parser.or()?;
    if parser.at < parser.toks.len() {
        return Err(parser.unexpected());
    }
    Ok(value)
}

/// Evaluate an expression and apply truthiness.
pub fn evaluate_bool(expr: &str) -> Result<bool, ConditionError> {
    evaluate(expr).map(|v| is_truthy(&v))
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
