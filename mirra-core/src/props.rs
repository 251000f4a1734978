//! Parser for the props literal that can follow a component reference:
//!
//! ```text
//! <!-- card.html, {title: "Hello", count: 3, tags: ['a', 'b'], wide: true} -->
//! ```
//!
//! Only flat objects are accepted. Values are strings, numbers, booleans,
//! `null`, or arrays of those. Nothing is ever evaluated.

use std::collections::BTreeMap;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PropsError {
    #[error("unexpected `{found}` at position {position}, expected {expected}")]
    Unexpected {
        found: char,
        position: usize,
        expected: &'static str,
    },
    #[error("unexpected end of props, expected {0}")]
    UnexpectedEnd(&'static str),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<PropValue>),
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => Ok(()),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            PropValue::Number(n) => write!(f, "{n}"),
            PropValue::String(s) => f.write_str(s),
            PropValue::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

pub type Props = BTreeMap<String, PropValue>;

pub fn parse_props(input: &str) -> Result<Props, PropsError> {
    let mut parser = Parser {
        chars: input.char_indices().peekable(),
    };
    let props = parser.object()?;
    parser.skip_whitespace();
    match parser.chars.next() {
        None => Ok(props),
        Some((position, found)) => Err(PropsError::Unexpected {
            found,
            position,
            expected: "end of props",
        }),
    }
}

struct Parser<'a> {
    chars: Peekable<CharIndices<'a>>,
}

impl Parser<'_> {
    fn object(&mut self) -> Result<Props, PropsError> {
        let mut props = Props::new();
        self.skip_whitespace();
        self.expect('{', "`{`")?;

        loop {
            self.skip_whitespace();
            if self.eat('}') {
                return Ok(props);
            }

            let key = self.key()?;
            self.skip_whitespace();
            self.expect(':', "`:`")?;
            self.skip_whitespace();
            let value = self.value(true)?;
            props.insert(key, value);

            self.skip_whitespace();
            if self.eat('}') {
                return Ok(props);
            }
            self.expect(',', "`,` or `}`")?;
        }
    }

    fn key(&mut self) -> Result<String, PropsError> {
        match self.chars.peek().copied() {
            Some((_, quote @ ('"' | '\''))) => {
                self.chars.next();
                self.string(quote)
            }
            Some((_, c)) if is_ident_start(c) => {
                let mut key = String::new();
                while let Some(&(_, c)) = self.chars.peek() {
                    if !is_ident_char(c) {
                        break;
                    }
                    key.push(c);
                    self.chars.next();
                }
                Ok(key)
            }
            Some((position, found)) => Err(PropsError::Unexpected {
                found,
                position,
                expected: "a key",
            }),
            None => Err(PropsError::UnexpectedEnd("a key")),
        }
    }

    fn value(&mut self, allow_array: bool) -> Result<PropValue, PropsError> {
        match self.chars.peek().copied() {
            Some((_, quote @ ('"' | '\''))) => {
                self.chars.next();
                Ok(PropValue::String(self.string(quote)?))
            }
            Some((_, '[')) if allow_array => self.array(),
            Some((_, c)) if c == '-' || c == '.' || c.is_ascii_digit() => self.number(),
            Some((_, c)) if is_ident_start(c) => {
                let (position, _) = *self.chars.peek().ok_or(PropsError::UnexpectedEnd("a value"))?;
                let word = self.word();
                match word.as_str() {
                    "true" => Ok(PropValue::Bool(true)),
                    "false" => Ok(PropValue::Bool(false)),
                    "null" | "undefined" => Ok(PropValue::Null),
                    _ => Err(PropsError::Unexpected {
                        found: c,
                        position,
                        expected: "a string, number, boolean or array",
                    }),
                }
            }
            Some((position, found)) => Err(PropsError::Unexpected {
                found,
                position,
                expected: if allow_array {
                    "a string, number, boolean or array"
                } else {
                    "a string, number or boolean"
                },
            }),
            None => Err(PropsError::UnexpectedEnd("a value")),
        }
    }

    fn array(&mut self) -> Result<PropValue, PropsError> {
        let mut items = Vec::new();
        self.expect('[', "`[`")?;

        loop {
            self.skip_whitespace();
            if self.eat(']') {
                return Ok(PropValue::Array(items));
            }

            items.push(self.value(false)?);

            self.skip_whitespace();
            if self.eat(']') {
                return Ok(PropValue::Array(items));
            }
            self.expect(',', "`,` or `]`")?;
        }
    }

    fn string(&mut self, quote: char) -> Result<String, PropsError> {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                c if c == quote => return Ok(out),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                c => out.push(c),
            }
        }

        Err(PropsError::UnexpectedEnd("closing quote"))
    }

    fn number(&mut self) -> Result<PropValue, PropsError> {
        let mut raw = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')) {
                break;
            }
            raw.push(c);
            self.chars.next();
        }

        raw.parse::<f64>()
            .map(PropValue::Number)
            .map_err(|_| PropsError::InvalidNumber(raw))
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !is_ident_char(c) {
                break;
            }
            word.push(c);
            self.chars.next();
        }
        word
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    fn expect(&mut self, expected: char, name: &'static str) -> Result<(), PropsError> {
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            Some((position, found)) => Err(PropsError::Unexpected {
                found,
                position,
                expected: name,
            }),
            None => Err(PropsError::UnexpectedEnd(name)),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}
