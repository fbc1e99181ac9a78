//! Hand-rolled JSON wire codec
//!
//! The Bayeux wire format predates strict JSON parsers and a number of
//! deployed clients depend on its quirks, so this codec reproduces the
//! historical behavior exactly rather than delegating to a JSON library:
//!
//! - a leading `//` or `/*...*/` comment block is skipped before the
//!   first token (comment-filtered transport framing);
//! - strings run to the next `"` with no escape interpretation; a
//!   backslash is copied through literally;
//! - `true`/`false`/`null` are recognized from their first letter
//!   (case-insensitive) and the remaining characters are skipped without
//!   validation, so malformed literals are silently accepted;
//! - numbers must start with a digit and become an `i64` unless a `.`,
//!   `e` or `E` was seen, in which case an `f64`;
//! - serialization escapes only the quote character.
//!
//! None of these are worth "fixing": the byte-for-byte output is the
//! compatibility contract.

use crate::error::{Error, Result};
use crate::value::BayeuxValue;

/// Parse JSON text into a value tree.
///
/// Blank input yields `Ok(None)`; the transport treats that as an
/// absent payload, not an error.
pub fn parse(text: &str) -> Result<Option<BayeuxValue>> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let mut cur = Cursor::new(text);
    while cur.has_next() {
        match cur.bump()? {
            '/' => {
                let marker = cur.bump()?;
                if marker == '/' || marker == '*' {
                    cur.skip_comment(marker)?;
                } else {
                    return Err(cur.unknown(marker));
                }
                cur.skip_spaces();
            }
            '{' => return Ok(Some(BayeuxValue::Object(cur.parse_object()?))),
            '[' => {
                return match cur.parse_array()? {
                    BayeuxValue::Null => Ok(None),
                    arr => Ok(Some(arr)),
                }
            }
            other => return Err(cur.unknown(other)),
        }
    }
    Ok(None)
}

/// Serialize a value tree to wire text.
pub fn to_json(value: &BayeuxValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Quote a string, escaping only `"`. Backslashes and control
/// characters pass through raw, a wire-compat quirk kept on purpose.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        if ch == '"' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn write_value(out: &mut String, value: &BayeuxValue) {
    match value {
        BayeuxValue::Null => out.push_str("null"),
        BayeuxValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        BayeuxValue::Integer(i) => out.push_str(&i.to_string()),
        BayeuxValue::Float(f) => out.push_str(&format_float(*f)),
        BayeuxValue::String(s) => out.push_str(&quote(s)),
        BayeuxValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        BayeuxValue::Object(entries) => {
            out.push('{');
            for (i, (key, val)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&quote(key));
                out.push(':');
                write_value(out, val);
            }
            out.push('}');
        }
    }
}

/// Whole floats keep a trailing `.0` so a round trip stays a float
/// instead of collapsing into an integer.
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

/// Character cursor over the input text.
struct Cursor<'a> {
    chars: Vec<char>,
    next: usize,
    text: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().collect(),
            next: 0,
            text,
        }
    }

    fn has_next(&self) -> bool {
        self.next < self.chars.len()
    }

    fn bump(&mut self) -> Result<char> {
        if self.has_next() {
            let ch = self.chars[self.next];
            self.next += 1;
            Ok(ch)
        } else {
            Err(Error::UnexpectedEnd { pos: self.next })
        }
    }

    fn back(&mut self) {
        self.next -= 1;
    }

    fn unknown(&self, ch: char) -> Error {
        Error::Parse {
            ch,
            pos: self.next.saturating_sub(1),
            text: self.text.to_string(),
        }
    }

    /// `marker` is the second comment character: `/` for a line
    /// comment, `*` for a block comment.
    fn skip_comment(&mut self, marker: char) -> Result<()> {
        if marker == '/' {
            while self.has_next() {
                if self.bump()? == '\n' {
                    break;
                }
            }
        } else {
            while self.has_next() {
                if self.bump()? == '*' && self.bump()? == '/' {
                    break;
                }
            }
        }
        Ok(())
    }

    // Only spaces, as the original scanner did. Tabs or newlines between
    // tokens were never produced by the deployed clients.
    fn skip_spaces(&mut self) {
        while self.has_next() {
            if self.chars[self.next] != ' ' {
                break;
            }
            self.next += 1;
        }
    }

    fn expect_after_spaces(&mut self, expected: char) -> Result<bool> {
        self.skip_spaces();
        if self.has_next() {
            Ok(self.bump()? == expected)
        } else {
            Ok(false)
        }
    }

    fn parse_object(&mut self) -> Result<Vec<(String, BayeuxValue)>> {
        self.skip_spaces();
        let mut entries: Vec<(String, BayeuxValue)> = Vec::new();
        while self.has_next() {
            match self.bump()? {
                '}' => return Ok(entries),
                '"' => {
                    let key = self.parse_string()?;
                    if self.expect_after_spaces(':')? {
                        let value = self.parse_value()?;
                        // Duplicate keys: later value wins.
                        if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
                            slot.1 = value;
                        } else {
                            entries.push((key, value));
                        }
                    } else {
                        let ch = self.chars[self.next.saturating_sub(1)];
                        return Err(self.unknown(ch));
                    }
                }
                ',' => self.skip_spaces(),
                other => return Err(self.unknown(other)),
            }
        }
        Ok(entries)
    }

    /// Returns `Null` when the input ends before the closing bracket,
    /// which the caller treats as "no value".
    fn parse_array(&mut self) -> Result<BayeuxValue> {
        self.skip_spaces();
        let mut items = Vec::new();
        while self.has_next() {
            match self.bump()? {
                ']' => return Ok(BayeuxValue::Array(items)),
                ',' => self.skip_spaces(),
                _ => {
                    self.back();
                    items.push(self.parse_value()?);
                }
            }
        }
        Ok(BayeuxValue::Null)
    }

    fn parse_value(&mut self) -> Result<BayeuxValue> {
        self.skip_spaces();
        while self.has_next() {
            return match self.bump()? {
                '"' => Ok(BayeuxValue::String(self.parse_string()?)),
                '{' => Ok(BayeuxValue::Object(self.parse_object()?)),
                '[' => self.parse_array(),
                't' | 'T' => {
                    // Skip "rue" unvalidated.
                    self.skip_literal(3)?;
                    Ok(BayeuxValue::Boolean(true))
                }
                'f' | 'F' => {
                    self.skip_literal(4)?;
                    Ok(BayeuxValue::Boolean(false))
                }
                'n' | 'N' => {
                    self.skip_literal(3)?;
                    Ok(BayeuxValue::Null)
                }
                '0'..='9' => self.parse_number(),
                other => Err(self.unknown(other)),
            };
        }
        Ok(BayeuxValue::Null)
    }

    fn skip_literal(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.bump()?;
        }
        Ok(())
    }

    /// Leading spaces after the opening quote are dropped; everything
    /// else up to the next `"` is taken verbatim, backslashes included.
    fn parse_string(&mut self) -> Result<String> {
        self.skip_spaces();
        let mut out = String::new();
        while self.has_next() {
            match self.bump()? {
                '"' => return Ok(out),
                ch => out.push(ch),
            }
        }
        Ok(out)
    }

    fn parse_number(&mut self) -> Result<BayeuxValue> {
        let mut digits = String::new();
        digits.push(self.chars[self.next - 1]);
        let mut is_integer = true;
        while self.has_next() {
            match self.bump()? {
                ch @ '0'..='9' => digits.push(ch),
                ch @ ('.' | 'e' | 'E') => {
                    digits.push(ch);
                    is_integer = false;
                }
                _ => {
                    self.back();
                    return finish_number(&digits, is_integer);
                }
            }
        }
        Ok(BayeuxValue::Null)
    }
}

fn finish_number(digits: &str, is_integer: bool) -> Result<BayeuxValue> {
    if is_integer {
        digits
            .parse::<i64>()
            .map(BayeuxValue::Integer)
            .map_err(|_| Error::InvalidNumber(digits.to_string()))
    } else {
        digits
            .parse::<f64>()
            .map(BayeuxValue::Float)
            .map_err(|_| Error::InvalidNumber(digits.to_string()))
    }
}
