//! Type coercion between data kinds.
//!
//! Converters are registered per ordered `(from, to)` pair. A conversion
//! either uses a direct converter or a two-hop route through `Bytes` or
//! `Text`. Every converter is a pure function of the value and the explicit
//! [`ConversionOptions`]; nothing reads ambient settings.

use super::error::TypeConversionError;
use super::types::{DataKind, Part, Value};
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Character encoding used when text meets bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// One byte per char, U+0000..=U+00FF.
    Latin1,
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => write!(f, "utf8"),
            Self::Latin1 => write!(f, "latin1"),
        }
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(format!("unknown text encoding: {}", other)),
        }
    }
}

/// Explicit parameters of every conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOptions {
    pub text_encoding: TextEncoding,
    /// Indentation of JSON serialized to text; 0 means compact.
    pub json_indent: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            text_encoding: TextEncoding::Utf8,
            json_indent: 4,
        }
    }
}

/// Whether a converter preserves information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fidelity {
    Lossless,
    Lossy,
    /// Lossless only when text is Latin1-encoded.
    LosslessWithLatin1,
}

pub type ConvertFn = fn(&Value, &ConversionOptions) -> Result<Value, String>;

#[derive(Clone, Copy)]
struct Converter {
    func: ConvertFn,
    fidelity: Fidelity,
}

/// How a value of one kind reaches another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Identity,
    Direct,
    Via(DataKind),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "as-is"),
            Self::Direct => write!(f, "direct"),
            Self::Via(pivot) => write!(f, "via {}", pivot),
        }
    }
}

const PIVOTS: [DataKind; 2] = [DataKind::Bytes, DataKind::Text];

/// Registered converters keyed by ordered kind pair.
#[derive(Clone, Default)]
pub struct CoercionTable {
    converters: FxHashMap<(DataKind, DataKind), Converter>,
}

impl fmt::Debug for CoercionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pairs: Vec<String> = self
            .converters
            .keys()
            .map(|(from, to)| format!("{}->{}", from, to))
            .collect();
        pairs.sort();
        f.debug_struct("CoercionTable")
            .field("pairs", &pairs)
            .finish()
    }
}

impl CoercionTable {
    /// A table with no converters; only identity routes exist.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard converter set.
    pub fn standard() -> Self {
        use DataKind::*;
        let mut table = Self::empty();
        table.register(Text, Bytes, Fidelity::Lossless, text_to_bytes);
        table.register(Bytes, Text, Fidelity::LosslessWithLatin1, bytes_to_text);
        table.register(Number, Text, Fidelity::Lossless, number_to_text);
        table.register(Text, Number, Fidelity::Lossy, text_to_number);
        table.register(Json, Text, Fidelity::Lossless, json_to_text);
        table.register(Text, Json, Fidelity::Lossy, text_to_json);
        table.register(Text, Html, Fidelity::Lossless, text_to_html);
        table.register(Html, Text, Fidelity::Lossy, html_to_text);
        table.register(Bytes, Parts, Fidelity::Lossless, bytes_to_parts);
        table.register(Parts, Bytes, Fidelity::Lossy, parts_to_bytes);
        table.register(Number, Bytes, Fidelity::Lossless, number_to_bytes);
        table.register(Bytes, Number, Fidelity::Lossy, bytes_to_number);
        table.register(Json, Bytes, Fidelity::Lossless, json_to_bytes);
        table.register(Bytes, Json, Fidelity::Lossy, bytes_to_json);
        table.register(Html, Bytes, Fidelity::Lossless, html_to_bytes);
        table.register(Bytes, Html, Fidelity::LosslessWithLatin1, bytes_to_html);
        table
    }

    /// Register (or replace) the converter for `from -> to`.
    pub fn register(&mut self, from: DataKind, to: DataKind, fidelity: Fidelity, func: ConvertFn) {
        self.converters
            .insert((from, to), Converter { func, fidelity });
    }

    pub fn has_direct(&self, from: DataKind, to: DataKind) -> bool {
        self.converters.contains_key(&(from, to))
    }

    /// Whether the direct converter for `from -> to` preserves information
    /// under `options`.
    pub fn is_lossless(&self, from: DataKind, to: DataKind, options: &ConversionOptions) -> bool {
        match self.converters.get(&(from, to)).map(|c| c.fidelity) {
            Some(Fidelity::Lossless) => true,
            Some(Fidelity::LosslessWithLatin1) => {
                options.text_encoding == TextEncoding::Latin1
            }
            Some(Fidelity::Lossy) | None => false,
        }
    }

    /// Find a route, preferring direct conversion over a pivot.
    pub fn route(&self, from: DataKind, to: DataKind) -> Option<Route> {
        if from == to {
            return Some(Route::Identity);
        }
        if self.has_direct(from, to) {
            return Some(Route::Direct);
        }
        PIVOTS
            .iter()
            .copied()
            .filter(|pivot| *pivot != from && *pivot != to)
            .find(|pivot| self.has_direct(from, *pivot) && self.has_direct(*pivot, to))
            .map(Route::Via)
    }

    /// Convert a value to `to`. Same-kind values are returned unchanged.
    pub fn convert(
        &self,
        value: &Value,
        to: DataKind,
        options: &ConversionOptions,
    ) -> Result<Value, TypeConversionError> {
        let from = value.kind();
        match self.route(from, to) {
            Some(Route::Identity) => Ok(value.clone()),
            Some(Route::Direct) => self.apply(value, to, options),
            Some(Route::Via(pivot)) => {
                let mid = self
                    .apply(value, pivot, options)
                    .map_err(|e| TypeConversionError::new(from, to, e.reason))?;
                self.apply(&mid, to, options)
                    .map_err(|e| TypeConversionError::new(from, to, e.reason))
            }
            None => Err(TypeConversionError::new(
                from,
                to,
                "no conversion registered",
            )),
        }
    }

    fn apply(
        &self,
        value: &Value,
        to: DataKind,
        options: &ConversionOptions,
    ) -> Result<Value, TypeConversionError> {
        let from = value.kind();
        let converter = self
            .converters
            .get(&(from, to))
            .ok_or_else(|| TypeConversionError::new(from, to, "no conversion registered"))?;
        (converter.func)(value, options).map_err(|reason| TypeConversionError::new(from, to, reason))
    }
}

// ============================================================================
// Text and bytes
// ============================================================================

/// Encode text to bytes with an explicit encoding.
pub fn encode_text(text: &str, encoding: TextEncoding) -> Result<Vec<u8>, String> {
    match encoding {
        TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        TextEncoding::Latin1 => text
            .chars()
            .map(|c| {
                u8::try_from(u32::from(c))
                    .map_err(|_| format!("character {:?} is not representable in latin1", c))
            })
            .collect(),
    }
}

/// Decode bytes to text. UTF-8 decoding replaces invalid sequences with
/// U+FFFD.
pub fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

fn text_to_bytes(value: &Value, options: &ConversionOptions) -> Result<Value, String> {
    let text = expect_str(value)?;
    encode_text(text, options.text_encoding).map(Value::Bytes)
}

fn bytes_to_text(value: &Value, options: &ConversionOptions) -> Result<Value, String> {
    let bytes = expect_bytes(value)?;
    Ok(Value::Text(decode_text(bytes, options.text_encoding)))
}

// ============================================================================
// Numbers
// ============================================================================

/// Format a number as text. Rust's float formatting is the shortest
/// representation that parses back to the same value.
pub fn format_number(n: f64) -> String {
    n.to_string()
}

pub fn parse_number(text: &str) -> Result<f64, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("empty input is not a number".to_string());
    }
    trimmed
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", truncate(trimmed, 32)))
}

fn number_to_text(value: &Value, _options: &ConversionOptions) -> Result<Value, String> {
    match value {
        Value::Number(n) => Ok(Value::Text(format_number(*n))),
        other => Err(format!("expected number, got {}", other.kind())),
    }
}

fn text_to_number(value: &Value, _options: &ConversionOptions) -> Result<Value, String> {
    parse_number(expect_str(value)?).map(Value::Number)
}

fn number_to_bytes(value: &Value, options: &ConversionOptions) -> Result<Value, String> {
    number_to_text(value, options).and_then(|text| text_to_bytes(&text, options))
}

fn bytes_to_number(value: &Value, options: &ConversionOptions) -> Result<Value, String> {
    bytes_to_text(value, options).and_then(|text| text_to_number(&text, options))
}

// ============================================================================
// JSON
// ============================================================================

/// Serialize JSON with the configured indentation.
pub fn json_to_string(json: &serde_json::Value, indent: usize) -> Result<String, String> {
    if indent == 0 {
        return serde_json::to_string(json).map_err(|e| e.to_string());
    }
    let indent_str = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent_str.as_bytes());
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    serde::Serialize::serialize(json, &mut serializer).map_err(|e| e.to_string())?;
    String::from_utf8(out).map_err(|e| e.to_string())
}

fn json_to_text(value: &Value, options: &ConversionOptions) -> Result<Value, String> {
    match value {
        Value::Json(json) => json_to_string(json, options.json_indent).map(Value::Text),
        other => Err(format!("expected json, got {}", other.kind())),
    }
}

fn text_to_json(value: &Value, _options: &ConversionOptions) -> Result<Value, String> {
    serde_json::from_str(expect_str(value)?)
        .map(Value::Json)
        .map_err(|e| format!("invalid JSON: {}", e))
}

fn json_to_bytes(value: &Value, options: &ConversionOptions) -> Result<Value, String> {
    json_to_text(value, options).and_then(|text| text_to_bytes(&text, options))
}

fn bytes_to_json(value: &Value, options: &ConversionOptions) -> Result<Value, String> {
    bytes_to_text(value, options).and_then(|text| text_to_json(&text, options))
}

// ============================================================================
// HTML
// ============================================================================

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script.*?</script>|<style.*?</style>|<[^>]*>").expect("valid tag regex")
});

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(amp|lt|gt|quot|#39|#x27);").expect("valid entity regex"));

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape_html`] in one left-to-right pass.
pub fn unescape_html(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| match &caps[1] {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            _ => "'",
        })
        .into_owned()
}

pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}

fn text_to_html(value: &Value, _options: &ConversionOptions) -> Result<Value, String> {
    Ok(Value::Html(escape_html(expect_str(value)?)))
}

fn html_to_text(value: &Value, _options: &ConversionOptions) -> Result<Value, String> {
    match value {
        Value::Html(html) => Ok(Value::Text(unescape_html(&strip_tags(html)))),
        other => Err(format!("expected html, got {}", other.kind())),
    }
}

fn html_to_bytes(value: &Value, options: &ConversionOptions) -> Result<Value, String> {
    match value {
        Value::Html(html) => encode_text(html, options.text_encoding).map(Value::Bytes),
        other => Err(format!("expected html, got {}", other.kind())),
    }
}

fn bytes_to_html(value: &Value, options: &ConversionOptions) -> Result<Value, String> {
    let bytes = expect_bytes(value)?;
    Ok(Value::Html(decode_text(bytes, options.text_encoding)))
}

// ============================================================================
// Parts
// ============================================================================

fn bytes_to_parts(value: &Value, _options: &ConversionOptions) -> Result<Value, String> {
    let bytes = expect_bytes(value)?;
    Ok(Value::Parts(vec![Part::new("input", bytes.to_vec())]))
}

fn parts_to_bytes(value: &Value, _options: &ConversionOptions) -> Result<Value, String> {
    match value {
        Value::Parts(parts) => Ok(Value::Bytes(
            parts.iter().flat_map(|p| p.data.iter().copied()).collect(),
        )),
        other => Err(format!("expected parts, got {}", other.kind())),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn expect_str(value: &Value) -> Result<&str, String> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(format!("expected text, got {}", other.kind())),
    }
}

fn expect_bytes(value: &Value) -> Result<&[u8], String> {
    match value {
        Value::Bytes(b) => Ok(b),
        other => Err(format!("expected bytes, got {}", other.kind())),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let head: String = s.chars().take(max_chars).collect();
    format!("{}...", head)
}

// ============================================================================
// Tests
// ============================================================================
