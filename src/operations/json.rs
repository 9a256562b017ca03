//! JSON parsing and pretty-printing. Object keys render in sorted order.

use crate::core::coercion::json_to_string;
use crate::core::error::OperationError;
use crate::core::registry::OperationDescriptor;
use crate::core::types::{ArgumentSpec, DataKind, ResolvedArgs, Value};

const CATEGORY: &str = "JSON";

pub fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new("Parse JSON", CATEGORY, DataKind::Text, DataKind::Json, parse)
            .describe("Parses text into a JSON document."),
        OperationDescriptor::new(
            "JSON Beautify",
            CATEGORY,
            DataKind::Json,
            DataKind::Text,
            beautify,
        )
        .describe("Indents a JSON document.")
        .arg(ArgumentSpec::number_range("Indent", 4.0, 1.0, 16.0)),
        OperationDescriptor::new("JSON Minify", CATEGORY, DataKind::Json, DataKind::Text, minify)
            .describe("Renders a JSON document on one line without whitespace."),
    ]
}

pub fn parse(input: &Value, _args: &ResolvedArgs) -> Result<Value, OperationError> {
    serde_json::from_str(input.as_text()?)
        .map(Value::Json)
        .map_err(|e| OperationError::invalid_input(format!("Invalid JSON: {}", e)))
}

pub fn beautify(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let json = input.as_json()?;
    let indent = args.count(0)?.max(1);
    json_to_string(json, indent)
        .map(Value::Text)
        .map_err(OperationError::fatal)
}

pub fn minify(input: &Value, _args: &ResolvedArgs) -> Result<Value, OperationError> {
    json_to_string(input.as_json()?, 0)
        .map(Value::Text)
        .map_err(OperationError::fatal)
}
