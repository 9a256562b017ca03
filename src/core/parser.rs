//! Compact recipe format: `To_Hex('Space',0)From_Hex('Auto')/disabled`.
//!
//! Operation names use underscores for spaces. Arguments are single- or
//! double-quoted strings, numbers, `true`/`false`/`null`, `[...]` lists and
//! `{...}` objects; an object with exactly `option` and `string` keys is a
//! labeled argument. Inside quotes only `\\` and the quote character are
//! escapes; every other backslash sequence is kept verbatim so binary-string
//! escapes survive to the argument resolver.

use super::error::RecipeError;
use super::recipe::RecipeEntry;
use super::types::RawArgument;
use regex::Regex;
use std::sync::LazyLock;

static COMPACT_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_/\-.+]+\(").expect("valid compact head regex"));

/// Whether `content` starts like a compact recipe.
pub fn looks_compact(content: &str) -> bool {
    COMPACT_HEAD.is_match(content.trim_start())
}

/// Parse a compact recipe into entries.
pub fn parse_compact(content: &str) -> Result<Vec<RecipeEntry>, RecipeError> {
    let mut cursor = Cursor::new(content);
    let mut entries = Vec::new();

    cursor.skip_ws();
    while !cursor.at_end() {
        entries.push(cursor.entry()?);
        cursor.skip_ws();
    }

    Ok(entries)
}

/// Print entries in compact form.
pub fn to_compact(entries: &[RecipeEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.op.replace(' ', "_"));
        out.push('(');
        let args: Vec<String> = entry.args.iter().map(print_arg).collect();
        out.push_str(&args.join(","));
        out.push(')');
        if entry.disabled {
            out.push_str("/disabled");
        }
        if entry.breakpoint {
            out.push_str("/breakpoint");
        }
    }
    out
}

fn print_arg(arg: &RawArgument) -> String {
    match arg {
        RawArgument::Labeled { string, option } => {
            format!("{{'option':{},'string':{}}}", quote(option), quote(string))
        }
        RawArgument::Plain(value) => print_value(value),
    }
}

fn print_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote(s),
        serde_json::Value::Array(items) => {
            let items: Vec<String> = items.iter().map(print_value).collect();
            format!("[{}]", items.join(","))
        }
        serde_json::Value::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}:{}", quote(k), print_value(v)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(content: &str) -> Self {
        Self {
            chars: content.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> RecipeError {
        RecipeError::Parse(format!("compact recipe, offset {}: {}", self.pos, message))
    }

    fn expect(&mut self, wanted: char) -> Result<(), RecipeError> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == wanted => Ok(()),
            Some(c) => Err(self.error(&format!("expected '{}', found '{}'", wanted, c))),
            None => Err(self.error(&format!("expected '{}', found end of input", wanted))),
        }
    }

    fn entry(&mut self) -> Result<RecipeEntry, RecipeError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '(' && !c.is_whitespace()) {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if name.is_empty() {
            return Err(self.error("expected an operation name"));
        }
        self.expect('(')?;

        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
        } else {
            loop {
                args.push(self.argument()?);
                self.skip_ws();
                match self.bump() {
                    Some(',') => continue,
                    Some(')') => break,
                    _ => return Err(self.error("expected ',' or ')' after argument")),
                }
            }
        }

        let mut entry = RecipeEntry::new(&name.replace('_', " "), args);
        while self.peek() == Some('/') {
            self.pos += 1;
            let flag = self.word();
            match flag.as_str() {
                "disabled" => entry.disabled = true,
                "breakpoint" => entry.breakpoint = true,
                other => return Err(self.error(&format!("unknown step flag '/{}'", other))),
            }
        }
        Ok(entry)
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn argument(&mut self) -> Result<RawArgument, RecipeError> {
        let value = self.value()?;
        if let serde_json::Value::Object(map) = &value {
            if map.len() == 2 {
                if let (Some(serde_json::Value::String(string)), Some(serde_json::Value::String(option))) =
                    (map.get("string"), map.get("option"))
                {
                    return Ok(RawArgument::Labeled {
                        string: string.clone(),
                        option: option.clone(),
                    });
                }
            }
        }
        Ok(RawArgument::Plain(value))
    }

    fn value(&mut self) -> Result<serde_json::Value, RecipeError> {
        self.skip_ws();
        match self.peek() {
            Some(q @ ('\'' | '"')) => {
                self.pos += 1;
                self.string(q).map(serde_json::Value::String)
            }
            Some('[') => {
                self.pos += 1;
                let mut items = Vec::new();
                self.skip_ws();
                if self.peek() == Some(']') {
                    self.pos += 1;
                    return Ok(serde_json::Value::Array(items));
                }
                loop {
                    items.push(self.value()?);
                    self.skip_ws();
                    match self.bump() {
                        Some(',') => continue,
                        Some(']') => return Ok(serde_json::Value::Array(items)),
                        _ => return Err(self.error("expected ',' or ']' in list")),
                    }
                }
            }
            Some('{') => {
                self.pos += 1;
                let mut map = serde_json::Map::new();
                self.skip_ws();
                if self.peek() == Some('}') {
                    self.pos += 1;
                    return Ok(serde_json::Value::Object(map));
                }
                loop {
                    let key = match self.value()? {
                        serde_json::Value::String(k) => k,
                        _ => return Err(self.error("object keys must be strings")),
                    };
                    self.expect(':')?;
                    let value = self.value()?;
                    map.insert(key, value);
                    self.skip_ws();
                    match self.bump() {
                        Some(',') => continue,
                        Some('}') => return Ok(serde_json::Value::Object(map)),
                        _ => return Err(self.error("expected ',' or '}' in object")),
                    }
                }
            }
            Some(_) => self.literal(),
            None => Err(self.error("expected an argument, found end of input")),
        }
    }

    fn string(&mut self, quote: char) -> Result<String, RecipeError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('\\') => out.push('\\'),
                    Some(c) if c == quote => out.push(c),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn literal(&mut self) -> Result<serde_json::Value, RecipeError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.'))
        {
            self.pos += 1;
        }
        let token: String = self.chars[start..self.pos].iter().collect();
        match token.as_str() {
            "true" => Ok(serde_json::Value::Bool(true)),
            "false" => Ok(serde_json::Value::Bool(false)),
            "null" => Ok(serde_json::Value::Null),
            "" => Err(self.error("expected an argument")),
            _ => parse_number(&token).ok_or_else(|| {
                self.error(&format!("'{}' is not a number, string or boolean", token))
            }),
        }
    }
}

fn parse_number(token: &str) -> Option<serde_json::Value> {
    if let Ok(i) = token.parse::<i64>() {
        return Some(serde_json::Value::from(i));
    }
    let f = token.parse::<f64>().ok().filter(|f| f.is_finite())?;
    serde_json::Number::from_f64(f).map(serde_json::Value::Number)
}
