//! Minimal XML property list reader.
//!
//! Covers the subset found in `Info.plist`, `.entitlements` and `PrivacyInfo.xcprivacy`
//! files. Binary plists are not supported and read as `None`.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Number, Value};

lazy_static! {
    /// Comments, processing instructions and the doctype.
    static ref PROLOG: Regex = Regex::new(r"(?s)<!--.*?-->|<\?.*?\?>|<!DOCTYPE[^>]*>").unwrap();
    /// Opening, closing or self-closing element, attributes ignored.
    static ref TAG: Regex = Regex::new(r"<(/?)([A-Za-z]+)[^>]*?(/?)>").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open(String),
    Close(String),
    Empty(String),
    Text(String),
}

fn tokenize(text: &str) -> Vec<Token> {
    let text = PROLOG.replace_all(text, "");
    let mut tokens = Vec::new();
    let mut last = 0;
    for caps in TAG.captures_iter(&text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let between = &text[last..whole.start()];
        if !between.trim().is_empty() {
            tokens.push(Token::Text(between.to_string()));
        }
        last = whole.end();

        let name = caps.get(2).map_or("", |m| m.as_str()).to_string();
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let empty = caps.get(3).is_some_and(|m| !m.as_str().is_empty());
        tokens.push(match (closing, empty) {
            (true, _) => Token::Close(name),
            (false, true) => Token::Empty(name),
            (false, false) => Token::Open(name),
        });
    }
    tokens
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Nesting limit for `dict`/`array`; deeper documents are rejected.
pub(crate) const MAX_PLIST_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// Text content up to the closing `name` tag.
    fn text_until(&mut self, name: &str) -> Option<String> {
        let mut out = String::new();
        loop {
            match self.next()? {
                Token::Text(text) => out.push_str(&text),
                Token::Close(close) if close == name => return Some(unescape(&out)),
                _ => return None,
            }
        }
    }

    /// Consume an element we do not model, up to its matching close tag.
    fn skip_element(&mut self, name: &str) -> Option<()> {
        let mut open = 1usize;
        while open > 0 {
            match self.next()? {
                Token::Open(n) if n == name => open += 1,
                Token::Close(n) if n == name => open -= 1,
                _ => {}
            }
        }
        Some(())
    }

    fn value(&mut self, depth: usize) -> Option<Value> {
        match self.next()? {
            Token::Open(name) => self.open_value(&name, depth),
            Token::Empty(name) => Some(match name.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "dict" => Value::Object(Map::new()),
                "array" => Value::Array(Vec::new()),
                "string" | "data" | "date" => Value::String(String::new()),
                _ => Value::Null,
            }),
            _ => None,
        }
    }

    fn open_value(&mut self, name: &str, depth: usize) -> Option<Value> {
        match name {
            "plist" => {
                let value = self.value(depth)?;
                matches!(self.next(), Some(Token::Close(c)) if c == "plist").then_some(value)
            }
            "dict" | "array" if depth >= MAX_PLIST_DEPTH => None,
            "dict" => {
                let mut map = Map::new();
                loop {
                    match self.next()? {
                        Token::Close(c) if c == "dict" => return Some(Value::Object(map)),
                        Token::Open(k) if k == "key" => {
                            let key = self.text_until("key")?;
                            let value = self.value(depth + 1)?;
                            map.insert(key.trim().to_string(), value);
                        }
                        _ => return None,
                    }
                }
            }
            "array" => {
                let mut items = Vec::new();
                loop {
                    if matches!(self.tokens.get(self.pos), Some(Token::Close(c)) if c == "array") {
                        self.pos += 1;
                        return Some(Value::Array(items));
                    }
                    items.push(self.value(depth + 1)?);
                }
            }
            "string" | "data" | "date" => self.text_until(name).map(Value::String),
            "integer" => Some(integer_value(self.text_until(name)?.trim())),
            "real" => {
                let text = self.text_until(name)?;
                Some(
                    text.trim()
                        .parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map_or_else(|| Value::String(text.trim().to_string()), Value::Number),
                )
            }
            _ => {
                self.skip_element(name)?;
                Some(Value::Null)
            }
        }
    }
}

/// Out-of-range or odd integers keep their text so the surrounding keys survive.
fn integer_value(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        Value::from(n)
    } else if let Ok(n) = text.parse::<u64>() {
        Value::from(n)
    } else {
        Value::String(text.to_string())
    }
}

/// Parse an XML plist document into JSON.
pub(crate) fn parse(text: &str) -> Option<Value> {
    let mut parser = Parser {
        tokens: tokenize(text),
        pos: 0,
    };
    parser.value(0)
}

/// Parse a plist whose root is a dictionary.
pub(crate) fn parse_dict(text: &str) -> Option<Map<String, Value>> {
    match parse(text)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
