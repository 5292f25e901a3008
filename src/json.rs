//! Flat JSON tokenizer.
//!
//! Providers that answer with JSON often only need one scalar out of the
//! document, and they care about the order things appear in, duplicate keys
//! included. Instead of building a `serde_json::Value` (which folds
//! duplicates and may reorder keys) the first JSON value of the input is
//! flattened into a token list in document order:
//!
//! ```text
//! {"code":0,"details":["a"]}
//! => Object(2) String("code") Primitive("0") String("details") Array(1) String("a")
//! ```
//!
//! Every token is a byte span into the input. Its text is the source as
//! sent: string tokens exclude the quotes but keep escapes, primitives are
//! the number, `true`, `false` or `null` lexeme. Anything after the first
//! complete value is ignored.

use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::value::RawValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Object,
    Array,
    String,
    Primitive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the tokenized input
    pub start: usize,
    pub end: usize,
    /// Source text of the span
    pub text: String,
    /// Direct children: key/value pairs for objects, elements for arrays
    pub size: usize,
}

/// Tokenize the first JSON value in `json`.
pub fn tokenize(json: &str) -> Result<Vec<Token>, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(json);
    let root = <&RawValue>::deserialize(&mut de)?;

    let mut tokens = Vec::new();
    push_value(json, root, &mut tokens)?;
    Ok(tokens)
}

/// True if `token` is a string token whose source text equals `literal`.
///
/// Escapes are not decoded, `"co\u0064e"` is not `code`.
pub fn key_eq(token: &Token, literal: &str) -> bool {
    token.kind == TokenKind::String && token.text == literal
}

/// Convert the leading decimal integer of `text`, `atoi` style.
///
/// Leading whitespace and one sign are accepted, conversion stops at the
/// first non-digit, no digits at all gives `0`. Out of range values saturate.
pub fn leading_int(text: &str) -> i64 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));

    if negative {
        -value
    } else {
        value
    }
}

fn push_value<'a>(doc: &'a str, raw: &'a RawValue, tokens: &mut Vec<Token>) -> Result<(), serde_json::Error> {
    let text = raw.get();
    // Raw values borrow from `doc`, the pointer difference is the offset
    let start = text.as_ptr() as usize - doc.as_ptr() as usize;
    let end = start + text.len();

    match text.as_bytes().first() {
        Some(b'{' | b'[') => match serde_json::from_str::<Children<'a>>(text)? {
            Children::Object(members) => {
                tokens.push(Token::span(doc, TokenKind::Object, start, end, members.len()));
                for (key, value) in members {
                    push_value(doc, key, tokens)?;
                    push_value(doc, value, tokens)?;
                }
            }
            Children::Array(elements) => {
                tokens.push(Token::span(doc, TokenKind::Array, start, end, elements.len()));
                for element in elements {
                    push_value(doc, element, tokens)?;
                }
            }
        },
        Some(b'"') => tokens.push(Token::span(doc, TokenKind::String, start + 1, end - 1, 0)),
        _ => tokens.push(Token::span(doc, TokenKind::Primitive, start, end, 0)),
    }

    Ok(())
}

impl Token {
    fn span(doc: &str, kind: TokenKind, start: usize, end: usize, size: usize) -> Self {
        Self {
            kind,
            start,
            end,
            text: doc[start..end].to_string(),
            size,
        }
    }
}

/// Direct children of a container, still in source form.
enum Children<'a> {
    Object(Vec<(&'a RawValue, &'a RawValue)>),
    Array(Vec<&'a RawValue>),
}

impl<'de: 'a, 'a> Deserialize<'de> for Children<'a> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ChildrenVisitor(std::marker::PhantomData))
    }
}

struct ChildrenVisitor<'a>(std::marker::PhantomData<&'a ()>);

impl<'de: 'a, 'a> Visitor<'de> for ChildrenVisitor<'a> {
    type Value = Children<'a>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object or array")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Children<'a>, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut elements = Vec::new();
        while let Some(element) = seq.next_element::<&'de RawValue>()? {
            elements.push(element);
        }
        Ok(Children::Array(elements))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Children<'a>, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut members = Vec::new();
        while let Some(key) = map.next_key::<&'de RawValue>()? {
            let value = map.next_value::<&'de RawValue>()?;
            members.push((key, value));
        }
        Ok(Children::Object(members))
    }
}
