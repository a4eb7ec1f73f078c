//! Reader for bracketed aggregate literals.
//!
//! Controller records (targets, tool frames, load data) travel as nested bracket lists
//! such as `[[500,0,600],[1,0,0,0],[0,0,0,0],[9E+09,9E+09,9E+09,9E+09,9E+09,9E+09]]`.
//! [`Literal::parse`] turns that text into a tree so typed records can be rebuilt from it.

use crate::error::{AppResult, ToroError};

/// One node of a parsed aggregate literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `[a,b,...]`
    List(Vec<Literal>),
    /// Any numeric scalar, including exponent forms like `9E+09`.
    Num(f64),
    /// `TRUE` / `FALSE`
    Bool(bool),
    /// `"text"`
    Str(String),
}

impl Literal {
    /// Parses a complete literal. A single trailing `;` is accepted.
    pub fn parse(text: &str) -> AppResult<Self> {
        let trimmed = text.trim();
        let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
        let mut reader = Reader {
            src: body,
            bytes: body.as_bytes(),
            pos: 0,
        };
        let value = reader.value()?;
        reader.skip_ws();
        if reader.pos != reader.bytes.len() {
            return Err(ToroError::invalid_literal(text, "trailing characters"));
        }
        Ok(value)
    }

    /// Returns the elements when this is a list.
    pub fn as_list(&self) -> Option<&[Literal]> {
        match self {
            Literal::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the number when this is numeric.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Literal::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Reads a list of exactly `N` numbers.
    pub fn numbers<const N: usize>(&self) -> Option<[f64; N]> {
        let items = self.as_list()?;
        if items.len() != N {
            return None;
        }
        let mut out = [0.0; N];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = item.as_num()?;
        }
        Some(out)
    }
}

/// Renders a number the way controller literals expect: integral values without a
/// fractional part and no negative zero.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{value}")
    }
}

struct Reader<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn error(&self, reason: &str) -> ToroError {
        ToroError::invalid_literal(self.src, format!("{reason} at offset {}", self.pos))
    }

    fn value(&mut self) -> AppResult<Literal> {
        self.skip_ws();
        match self.bytes.get(self.pos) {
            Some(b'[') => self.list(),
            Some(b'"') => self.string(),
            Some(_) => self.scalar(),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn list(&mut self) -> AppResult<Literal> {
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_ws();
        if self.bytes.get(self.pos) == Some(&b']') {
            self.pos += 1;
            return Ok(Literal::List(items));
        }
        loop {
            items.push(self.value()?);
            self.skip_ws();
            match self.bytes.get(self.pos) {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Literal::List(items));
                }
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn string(&mut self) -> AppResult<Literal> {
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'"' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Err(self.error("unterminated string"));
        }
        let text = self.src[start..self.pos].to_string();
        self.pos += 1;
        Ok(Literal::Str(text))
    }

    fn scalar(&mut self) -> AppResult<Literal> {
        let start = self.pos;
        while self.pos < self.bytes.len() && !matches!(self.bytes[self.pos], b',' | b']' | b'[')
        {
            self.pos += 1;
        }
        let token = self.src[start..self.pos].trim();
        match token {
            "TRUE" => Ok(Literal::Bool(true)),
            "FALSE" => Ok(Literal::Bool(false)),
            _ => token
                .parse::<f64>()
                .map(Literal::Num)
                .map_err(|_| self.error(&format!("bad scalar '{token}'"))),
        }
    }
}
