//! Positioned JSON values for `*.tf.json` files.
//!
//! serde_json validates the document and decodes string escapes; the scanner
//! here only records byte spans so that every value and object key can be
//! mapped back to the source.

use crate::error::{TofulintError, TofulintResult};
use std::ops;

const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub struct JsonValue {
    pub kind: JsonKind,
    pub span: ops::Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsonKind {
    Null,
    Bool(bool),
    /// Numbers keep their source text.
    Number(String),
    String(String),
    Array(Vec<JsonValue>),
    Object(Vec<JsonProperty>),
}

/// One `"name": value` member. Duplicate names are kept in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonProperty {
    pub name: String,
    /// Span of the key including its quotes.
    pub name_span: ops::Range<usize>,
    pub value: JsonValue,
}

impl JsonValue {
    pub fn as_object(&self) -> Option<&[JsonProperty]> {
        match &self.kind {
            JsonKind::Object(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            JsonKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            JsonKind::Null => "null",
            JsonKind::Bool(_) => "bool",
            JsonKind::Number(_) => "number",
            JsonKind::String(_) => "string",
            JsonKind::Array(_) => "array",
            JsonKind::Object(_) => "object",
        }
    }
}

/// Parse a JSON document, keeping byte spans for every value.
pub fn parse(filename: &str, source: &str) -> TofulintResult<JsonValue> {
    if let Err(e) = serde_json::from_str::<serde::de::IgnoredAny>(source) {
        return Err(TofulintError::parse(
            filename,
            e.line(),
            e.column(),
            e.to_string(),
        ));
    }

    let mut scanner = Scanner {
        filename,
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
    };
    scanner.skip_ws();
    let value = scanner.value(0)?;
    scanner.skip_ws();
    if scanner.pos != scanner.bytes.len() {
        return Err(scanner.error("trailing characters after JSON value"));
    }
    Ok(value)
}

struct Scanner<'a> {
    filename: &'a str,
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn error(&self, message: impl Into<String>) -> TofulintError {
        let before = &self.src[..self.pos.min(self.src.len())];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
            + 1;
        TofulintError::parse(self.filename, line, column, message)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> TofulintResult<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn value(&mut self, depth: usize) -> TofulintResult<JsonValue> {
        if depth > MAX_DEPTH {
            return Err(self.error("JSON nesting is too deep"));
        }

        let start = self.pos;
        let kind = match self.peek() {
            Some(b'{') => self.object(depth)?,
            Some(b'[') => self.array(depth)?,
            Some(b'"') => JsonKind::String(self.string()?.0),
            Some(b't') => self.keyword("true", JsonKind::Bool(true))?,
            Some(b'f') => self.keyword("false", JsonKind::Bool(false))?,
            Some(b'n') => self.keyword("null", JsonKind::Null)?,
            Some(b'-' | b'0'..=b'9') => self.number(),
            _ => return Err(self.error("expected JSON value")),
        };

        Ok(JsonValue {
            kind,
            span: start..self.pos,
        })
    }

    fn keyword(&mut self, word: &str, kind: JsonKind) -> TofulintResult<JsonKind> {
        if self.src[self.pos..].starts_with(word) {
            self.pos += word.len();
            Ok(kind)
        } else {
            Err(self.error(format!("expected '{word}'")))
        }
    }

    fn number(&mut self) -> JsonKind {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9')
        ) {
            self.pos += 1;
        }
        JsonKind::Number(self.src[start..self.pos].to_string())
    }

    /// Scan a string literal, returning the decoded text and the span including quotes.
    fn string(&mut self) -> TofulintResult<(String, ops::Range<usize>)> {
        let start = self.pos;
        self.expect(b'"')?;
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => self.pos += 2,
                Some(_) => self.pos += 1,
                None => return Err(self.error("unterminated string")),
            }
        }

        let raw = &self.src[start..self.pos];
        let decoded = serde_json::from_str::<String>(raw)
            .map_err(|e| self.error(format!("invalid string: {e}")))?;
        Ok((decoded, start..self.pos))
    }

    fn array(&mut self, depth: usize) -> TofulintResult<JsonKind> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(JsonKind::Array(items));
        }
        loop {
            self.skip_ws();
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(JsonKind::Array(items));
                }
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn object(&mut self, depth: usize) -> TofulintResult<JsonKind> {
        self.expect(b'{')?;
        let mut props = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(JsonKind::Object(props));
        }
        loop {
            self.skip_ws();
            let (name, name_span) = self.string()?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            let value = self.value(depth + 1)?;
            props.push(JsonProperty {
                name,
                name_span,
                value,
            });
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(JsonKind::Object(props));
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }
}
