//! Core types: data kinds, native values, argument schemas, run results
//! and journal events.
//!
//! Every persisted type derives Serialize/Deserialize so recipes and journal
//! lines round-trip through JSON and YAML.

use super::dish::Dish;
use super::error::OperationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Data kinds and values
// ============================================================================

/// The closed set of representations a value can take between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Text,
    Bytes,
    Number,
    Json,
    /// Multi-part binary: an ordered list of named byte buffers.
    Parts,
    /// Markup text.
    Html,
}

impl DataKind {
    pub const ALL: [DataKind; 6] = [
        DataKind::Text,
        DataKind::Bytes,
        DataKind::Number,
        DataKind::Json,
        DataKind::Parts,
        DataKind::Html,
    ];
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Bytes => write!(f, "bytes"),
            Self::Number => write!(f, "number"),
            Self::Json => write!(f, "json"),
            Self::Parts => write!(f, "parts"),
            Self::Html => write!(f, "html"),
        }
    }
}

impl std::str::FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(Self::Text),
            "bytes" | "bytearray" => Ok(Self::Bytes),
            "number" => Ok(Self::Number),
            "json" => Ok(Self::Json),
            "parts" => Ok(Self::Parts),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown data kind: {}", other)),
        }
    }
}

/// One named buffer of a multi-part value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub data: Vec<u8>,
}

impl Part {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// A native value. The variant is the value's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Bytes(Vec<u8>),
    Number(f64),
    Json(serde_json::Value),
    Parts(Vec<Part>),
    Html(String),
}

impl Value {
    pub fn kind(&self) -> DataKind {
        match self {
            Self::Text(_) => DataKind::Text,
            Self::Bytes(_) => DataKind::Bytes,
            Self::Number(_) => DataKind::Number,
            Self::Json(_) => DataKind::Json,
            Self::Parts(_) => DataKind::Parts,
            Self::Html(_) => DataKind::Html,
        }
    }

    /// Approximate in-memory payload size in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Text(s) | Self::Html(s) => s.len(),
            Self::Bytes(b) => b.len(),
            Self::Number(_) => std::mem::size_of::<f64>(),
            Self::Json(v) => v.to_string().len(),
            Self::Parts(parts) => parts.iter().map(|p| p.data.len()).sum(),
        }
    }

    pub fn as_text(&self) -> Result<&str, OperationError> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(kind_mismatch(DataKind::Text, other)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], OperationError> {
        match self {
            Self::Bytes(b) => Ok(b),
            other => Err(kind_mismatch(DataKind::Bytes, other)),
        }
    }

    pub fn as_number(&self) -> Result<f64, OperationError> {
        match self {
            Self::Number(n) => Ok(*n),
            other => Err(kind_mismatch(DataKind::Number, other)),
        }
    }

    pub fn as_json(&self) -> Result<&serde_json::Value, OperationError> {
        match self {
            Self::Json(v) => Ok(v),
            other => Err(kind_mismatch(DataKind::Json, other)),
        }
    }

    pub fn as_parts(&self) -> Result<&[Part], OperationError> {
        match self {
            Self::Parts(p) => Ok(p),
            other => Err(kind_mismatch(DataKind::Parts, other)),
        }
    }

    pub fn as_html(&self) -> Result<&str, OperationError> {
        match self {
            Self::Html(s) => Ok(s),
            other => Err(kind_mismatch(DataKind::Html, other)),
        }
    }
}

/// The engine coerces before every transform, so a mismatch here is a bug
/// in the operation's declared input kind.
fn kind_mismatch(expected: DataKind, got: &Value) -> OperationError {
    OperationError::Fatal(format!("expected {} input, got {}", expected, got.kind()))
}

// ============================================================================
// Argument schema
// ============================================================================

/// Encoding label of a labeled byte-string argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteLabel {
    Hex,
    #[serde(rename = "UTF8")]
    Utf8,
    Latin1,
    Base64,
    Decimal,
}

impl ByteLabel {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "hex" => Some(Self::Hex),
            "utf8" | "utf-8" => Some(Self::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Some(Self::Latin1),
            "base64" => Some(Self::Base64),
            "decimal" => Some(Self::Decimal),
            _ => None,
        }
    }
}

impl fmt::Display for ByteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex => write!(f, "Hex"),
            Self::Utf8 => write!(f, "UTF8"),
            Self::Latin1 => write!(f, "Latin1"),
            Self::Base64 => write!(f, "Base64"),
            Self::Decimal => write!(f, "Decimal"),
        }
    }
}

/// A choice of a dynamically-populated argument. Selecting it replaces the
/// choice list of the target argument with `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulateChoice {
    pub name: String,
    pub values: Vec<String>,
}

impl PopulateChoice {
    pub fn new(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Argument kind, including the per-kind constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgKind {
    Boolean,
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    ShortString,
    LongText,
    /// Value must be one of the active choices.
    Choice(Vec<String>),
    /// Any string; the list is a suggestion.
    EditableChoice(Vec<String>),
    /// Selecting a choice repopulates the argument at `target`.
    Populate {
        choices: Vec<PopulateChoice>,
        target: usize,
    },
    /// Text with `\n`, `\xNN`-style escapes, resolved to bytes.
    BinaryString,
    /// `{string, option}` pair decoded to bytes by its label.
    LabeledBytes(Vec<ByteLabel>),
}

impl ArgKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Number { .. } => "number",
            Self::ShortString => "string",
            Self::LongText => "text",
            Self::Choice(_) => "option",
            Self::EditableChoice(_) => "editable option",
            Self::Populate { .. } => "populate option",
            Self::BinaryString => "binary string",
            Self::LabeledBytes(_) => "labeled bytes",
        }
    }
}

/// One entry of an operation's argument schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    pub name: String,
    pub kind: ArgKind,
    /// Persisted-form default, resolved like any user value.
    pub default: RawArgument,
}

impl ArgumentSpec {
    pub fn boolean(name: &str, default: bool) -> Self {
        Self::with(name, ArgKind::Boolean, serde_json::Value::Bool(default))
    }

    pub fn number(name: &str, default: f64) -> Self {
        Self::with(
            name,
            ArgKind::Number {
                min: None,
                max: None,
            },
            serde_json::json!(default),
        )
    }

    pub fn number_range(name: &str, default: f64, min: f64, max: f64) -> Self {
        Self::with(
            name,
            ArgKind::Number {
                min: Some(min),
                max: Some(max),
            },
            serde_json::json!(default),
        )
    }

    pub fn string(name: &str, default: &str) -> Self {
        Self::with(name, ArgKind::ShortString, default.into())
    }

    pub fn text(name: &str, default: &str) -> Self {
        Self::with(name, ArgKind::LongText, default.into())
    }

    /// Single-choice enum; the first choice is the default.
    pub fn choice(name: &str, choices: &[&str]) -> Self {
        let default = choices.first().copied().unwrap_or_default();
        Self::with(name, ArgKind::Choice(owned(choices)), default.into())
    }

    pub fn editable(name: &str, suggestions: &[&str], default: &str) -> Self {
        Self::with(
            name,
            ArgKind::EditableChoice(owned(suggestions)),
            default.into(),
        )
    }

    pub fn populate(name: &str, choices: Vec<PopulateChoice>, target: usize) -> Self {
        let default = choices.first().map(|c| c.name.clone()).unwrap_or_default();
        Self::with(name, ArgKind::Populate { choices, target }, default.into())
    }

    pub fn binary(name: &str, default: &str) -> Self {
        Self::with(name, ArgKind::BinaryString, default.into())
    }

    pub fn labeled(name: &str, labels: &[ByteLabel], default: &str) -> Self {
        let option = labels.first().copied().unwrap_or(ByteLabel::Utf8);
        Self {
            name: name.to_string(),
            kind: ArgKind::LabeledBytes(labels.to_vec()),
            default: RawArgument::Labeled {
                string: default.to_string(),
                option: option.to_string(),
            },
        }
    }

    fn with(name: &str, kind: ArgKind, default: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: RawArgument::Plain(default),
        }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// An argument as persisted in a recipe: a bare primitive, or a labeled
/// byte-string object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawArgument {
    Labeled { string: String, option: String },
    Plain(serde_json::Value),
}

impl From<&str> for RawArgument {
    fn from(s: &str) -> Self {
        Self::Plain(serde_json::Value::String(s.to_string()))
    }
}

impl From<bool> for RawArgument {
    fn from(b: bool) -> Self {
        Self::Plain(serde_json::Value::Bool(b))
    }
}

impl From<f64> for RawArgument {
    fn from(n: f64) -> Self {
        Self::Plain(serde_json::json!(n))
    }
}

impl From<i64> for RawArgument {
    fn from(n: i64) -> Self {
        Self::Plain(serde_json::json!(n))
    }
}

/// A resolved, typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Bool(bool),
    Number(f64),
    Str(String),
    Bytes(Vec<u8>),
    Labeled {
        text: String,
        label: ByteLabel,
        bytes: Vec<u8>,
    },
}

/// The resolved argument vector handed to a transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedArgs(pub Vec<ArgValue>);

impl ResolvedArgs {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&ArgValue, OperationError> {
        self.0
            .get(index)
            .ok_or_else(|| OperationError::Fatal(format!("missing argument {}", index)))
    }

    pub fn boolean(&self, index: usize) -> Result<bool, OperationError> {
        match self.get(index)? {
            ArgValue::Bool(b) => Ok(*b),
            other => Err(arg_mismatch(index, "boolean", other)),
        }
    }

    pub fn number(&self, index: usize) -> Result<f64, OperationError> {
        match self.get(index)? {
            ArgValue::Number(n) => Ok(*n),
            other => Err(arg_mismatch(index, "number", other)),
        }
    }

    /// Number argument truncated toward zero.
    pub fn integer(&self, index: usize) -> Result<i64, OperationError> {
        Ok(self.number(index)?.trunc() as i64)
    }

    /// Number argument as a count; negative values clamp to zero.
    pub fn count(&self, index: usize) -> Result<usize, OperationError> {
        Ok(self.integer(index)?.max(0) as usize)
    }

    pub fn string(&self, index: usize) -> Result<&str, OperationError> {
        match self.get(index)? {
            ArgValue::Str(s) => Ok(s),
            ArgValue::Labeled { text, .. } => Ok(text),
            other => Err(arg_mismatch(index, "string", other)),
        }
    }

    pub fn bytes(&self, index: usize) -> Result<&[u8], OperationError> {
        match self.get(index)? {
            ArgValue::Bytes(b) => Ok(b),
            ArgValue::Labeled { bytes, .. } => Ok(bytes),
            ArgValue::Str(s) => Ok(s.as_bytes()),
            other => Err(arg_mismatch(index, "bytes", other)),
        }
    }
}

fn arg_mismatch(index: usize, expected: &str, got: &ArgValue) -> OperationError {
    OperationError::Fatal(format!(
        "argument {} is not a {} (got {:?})",
        index, expected, got
    ))
}

// ============================================================================
// Run results
// ============================================================================

/// Batch runs ignore breakpoints; interactive runs halt on them.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Batch,
    Interactive,
}

/// Category of a run-aborting failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Argument,
    TypeConversion,
    OperationFatal,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument => write!(f, "argument error"),
            Self::TypeConversion => write!(f, "type conversion error"),
            Self::OperationFatal => write!(f, "operation error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Diagnostic for a failed run.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub step: usize,
    pub operation: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} ({}): {}: {}",
            self.step, self.operation, self.kind, self.message
        )
    }
}

/// Terminal state of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    Completed(Dish),
    Halted { step: usize, dish: Dish },
    Failed { step: usize, report: ErrorReport },
}

impl RunResult {
    /// The dish a completed or halted run produced.
    pub fn dish(&self) -> Option<&Dish> {
        match self {
            Self::Completed(dish) | Self::Halted { dish, .. } => Some(dish),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// What happened to a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Executed,
    /// The operation rejected its input; its diagnostic became the output.
    SoftFailed,
    Skipped,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executed => write!(f, "OK"),
            Self::SoftFailed => write!(f, "SOFT-FAIL"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Per-step diagnostics of a run.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub index: usize,
    pub operation: String,
    pub status: StepStatus,
    pub duration: Duration,
    pub output_kind: Option<DataKind>,
}

/// Result of a run plus its step records.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub result: RunResult,
    pub steps: Vec<StepRecord>,
    pub total_duration: Duration,
}

impl RunReport {
    pub fn soft_failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::SoftFailed)
            .count()
    }
}

// ============================================================================
// Journal events
// ============================================================================

/// Provenance event for the JSONL run journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        steps: usize,
        input_kind: DataKind,
        input_hash: String,
        bakery_version: String,
    },
    StepCompleted {
        run_id: String,
        step: usize,
        operation: String,
        duration_seconds: f64,
        output_kind: DataKind,
        hash: String,
    },
    StepSoftFailed {
        run_id: String,
        step: usize,
        operation: String,
        message: String,
    },
    StepSkipped {
        run_id: String,
        step: usize,
        operation: String,
    },
    RunCompleted {
        run_id: String,
        output_kind: DataKind,
        output_hash: String,
        soft_failures: usize,
        total_seconds: f64,
    },
    RunHalted {
        run_id: String,
        step: usize,
        output_hash: String,
    },
    RunFailed {
        run_id: String,
        step: usize,
        error: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: RunEvent,
}

// ============================================================================
// Tests
// ============================================================================
