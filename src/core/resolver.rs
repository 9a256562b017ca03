//! Argument resolution: raw persisted arguments to typed argument vectors.
//!
//! Resolution is pure. Populate-option effects are computed first, so an
//! argument whose choice list is repopulated validates against the active
//! list no matter where the populating argument sits in the schema.

use super::coercion::{encode_text, TextEncoding};
use super::error::ArgumentError;
use super::types::{ArgKind, ArgValue, ArgumentSpec, ByteLabel, RawArgument, ResolvedArgs};
use base64::Engine as _;

/// Resolve a raw argument list against a schema. Missing trailing
/// arguments take their defaults; surplus arguments are an error.
pub fn resolve_args(
    schema: &[ArgumentSpec],
    raw: &[RawArgument],
) -> Result<ResolvedArgs, ArgumentError> {
    if raw.len() > schema.len() {
        return Err(ArgumentError::Arity {
            expected: schema.len(),
            got: raw.len(),
        });
    }

    let overlays = populate_overlays(schema, raw)?;

    schema
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let active = overlays[index].as_deref();
            match raw.get(index) {
                Some(value) => resolve_arg(index, spec, value, active),
                None => resolve_default(index, spec, active),
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(ResolvedArgs)
}

/// The schema as a presentation layer should show it for `raw`: choice
/// lists targeted by populate options are replaced by the selected values.
pub fn active_schema(
    schema: &[ArgumentSpec],
    raw: &[RawArgument],
) -> Result<Vec<ArgumentSpec>, ArgumentError> {
    let overlays = populate_overlays(schema, raw)?;
    Ok(schema
        .iter()
        .zip(overlays)
        .map(|(spec, overlay)| {
            let mut spec = spec.clone();
            if let Some(values) = overlay {
                match &mut spec.kind {
                    ArgKind::Choice(list) | ArgKind::EditableChoice(list) => *list = values,
                    _ => {}
                }
            }
            spec
        })
        .collect())
}

/// Check that a schema is well formed: every default resolves and every
/// populate option points at a choice argument.
pub fn validate_schema(schema: &[ArgumentSpec]) -> Result<(), String> {
    for (index, spec) in schema.iter().enumerate() {
        match &spec.kind {
            ArgKind::Populate { choices, target } => {
                if choices.is_empty() {
                    return Err(format!("argument {} has no populate choices", index));
                }
                if *target == index || *target >= schema.len() {
                    return Err(format!(
                        "argument {} populates invalid target {}",
                        index, target
                    ));
                }
                if !matches!(
                    schema[*target].kind,
                    ArgKind::Choice(_) | ArgKind::EditableChoice(_)
                ) {
                    return Err(format!(
                        "argument {} populates non-choice argument {}",
                        index, target
                    ));
                }
            }
            ArgKind::Choice(list) if list.is_empty() => {
                return Err(format!("argument {} has no choices", index));
            }
            ArgKind::LabeledBytes(labels) if labels.is_empty() => {
                return Err(format!("argument {} allows no labels", index));
            }
            _ => {}
        }
    }
    resolve_args(schema, &[])
        .map(|_| ())
        .map_err(|e| format!("default does not resolve: {}", e))
}

fn populate_overlays(
    schema: &[ArgumentSpec],
    raw: &[RawArgument],
) -> Result<Vec<Option<Vec<String>>>, ArgumentError> {
    let mut overlays: Vec<Option<Vec<String>>> = vec![None; schema.len()];
    for (index, spec) in schema.iter().enumerate() {
        let ArgKind::Populate { choices, target } = &spec.kind else {
            continue;
        };
        let value = raw.get(index).unwrap_or(&spec.default);
        if let ArgValue::Str(selected) = resolve_arg(index, spec, value, None)? {
            if let Some(choice) = choices.iter().find(|c| c.name == selected) {
                if let Some(slot) = overlays.get_mut(*target) {
                    *slot = Some(choice.values.clone());
                }
            }
        }
    }
    Ok(overlays)
}

fn resolve_default(
    index: usize,
    spec: &ArgumentSpec,
    active: Option<&[String]>,
) -> Result<ArgValue, ArgumentError> {
    // A repopulated list replaces the static default unless it contains it.
    if let (ArgKind::Choice(_) | ArgKind::EditableChoice(_), Some(list)) = (&spec.kind, active) {
        let default_in_list = matches!(
            &spec.default,
            RawArgument::Plain(serde_json::Value::String(s)) if list.contains(s)
        );
        if !default_in_list {
            if let Some(first) = list.first() {
                return Ok(ArgValue::Str(first.clone()));
            }
        }
    }
    resolve_arg(index, spec, &spec.default, active)
}

/// Resolve one raw argument against its spec. `active` overrides the
/// choice list of choice kinds.
pub fn resolve_arg(
    index: usize,
    spec: &ArgumentSpec,
    raw: &RawArgument,
    active: Option<&[String]>,
) -> Result<ArgValue, ArgumentError> {
    let owned;
    let plain = match raw {
        RawArgument::Labeled { string, option } => {
            if let ArgKind::LabeledBytes(labels) = &spec.kind {
                return resolve_labeled(index, spec, labels, string, Some(option));
            }
            // Older recipes store plain arguments in labeled form.
            owned = serde_json::Value::String(string.clone());
            &owned
        }
        RawArgument::Plain(value) => value,
    };

    match &spec.kind {
        ArgKind::Boolean => resolve_bool(index, spec, plain).map(ArgValue::Bool),
        ArgKind::Number { min, max } => {
            resolve_number(index, spec, plain, *min, *max).map(ArgValue::Number)
        }
        ArgKind::ShortString | ArgKind::LongText | ArgKind::EditableChoice(_) => {
            resolve_string(index, spec, plain).map(ArgValue::Str)
        }
        ArgKind::Choice(list) => {
            let value = resolve_string(index, spec, plain)?;
            let list = active.unwrap_or(list);
            if !list.contains(&value) {
                return Err(ArgumentError::NotAChoice {
                    index,
                    name: spec.name.clone(),
                    value,
                    choices: list.to_vec(),
                });
            }
            Ok(ArgValue::Str(value))
        }
        ArgKind::Populate { choices, .. } => {
            let value = resolve_string(index, spec, plain)?;
            if !choices.iter().any(|c| c.name == value) {
                return Err(ArgumentError::NotAChoice {
                    index,
                    name: spec.name.clone(),
                    value,
                    choices: choices.iter().map(|c| c.name.clone()).collect(),
                });
            }
            Ok(ArgValue::Str(value))
        }
        ArgKind::BinaryString => {
            let text = resolve_string(index, spec, plain)?;
            unescape_binary(&text)
                .map(ArgValue::Bytes)
                .map_err(|reason| ArgumentError::Malformed {
                    index,
                    name: spec.name.clone(),
                    reason,
                })
        }
        ArgKind::LabeledBytes(labels) => {
            let text = resolve_string(index, spec, plain)?;
            resolve_labeled(index, spec, labels, &text, None)
        }
    }
}

fn resolve_bool(
    index: usize,
    spec: &ArgumentSpec,
    value: &serde_json::Value,
) -> Result<bool, ArgumentError> {
    match value {
        serde_json::Value::Bool(b) => Ok(*b),
        serde_json::Value::Null => Ok(false),
        serde_json::Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            Ok(!(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")))
        }
        other => Err(type_error(index, spec, "boolean", other)),
    }
}

fn resolve_number(
    index: usize,
    spec: &ArgumentSpec,
    value: &serde_json::Value,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<f64, ArgumentError> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64().ok_or_else(|| ArgumentError::NotANumber {
            index,
            name: spec.name.clone(),
            value: n.to_string(),
        })?,
        serde_json::Value::String(s) => {
            s.trim()
                .parse::<f64>()
                .map_err(|_| ArgumentError::NotANumber {
                    index,
                    name: spec.name.clone(),
                    value: s.clone(),
                })?
        }
        other => return Err(type_error(index, spec, "number", other)),
    };

    if !n.is_finite() {
        return Err(ArgumentError::NotANumber {
            index,
            name: spec.name.clone(),
            value: n.to_string(),
        });
    }

    let below = min.is_some_and(|lo| n < lo);
    let above = max.is_some_and(|hi| n > hi);
    if below || above {
        return Err(ArgumentError::OutOfRange {
            index,
            name: spec.name.clone(),
            value: n,
            min,
            max,
        });
    }

    Ok(n)
}

fn resolve_string(
    index: usize,
    spec: &ArgumentSpec,
    value: &serde_json::Value,
) -> Result<String, ArgumentError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(type_error(index, spec, "string", other)),
    }
}

fn resolve_labeled(
    index: usize,
    spec: &ArgumentSpec,
    labels: &[ByteLabel],
    text: &str,
    option: Option<&str>,
) -> Result<ArgValue, ArgumentError> {
    let label = match option {
        Some(option) => ByteLabel::from_label(option)
            .filter(|label| labels.contains(label))
            .ok_or_else(|| ArgumentError::UnknownLabel {
                index,
                name: spec.name.clone(),
                label: option.to_string(),
            })?,
        None => labels.first().copied().unwrap_or(ByteLabel::Utf8),
    };

    let bytes = decode_labeled(text, label).map_err(|reason| ArgumentError::Malformed {
        index,
        name: spec.name.clone(),
        reason,
    })?;

    Ok(ArgValue::Labeled {
        text: text.to_string(),
        label,
        bytes,
    })
}

fn type_error(
    index: usize,
    spec: &ArgumentSpec,
    expected: &'static str,
    got: &serde_json::Value,
) -> ArgumentError {
    ArgumentError::Type {
        index,
        name: spec.name.clone(),
        expected,
        got: json_type_name(got).to_string(),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ============================================================================
// Re-serialization
// ============================================================================

impl ArgValue {
    /// The persisted form of a resolved value; resolving it again against
    /// the same spec yields an equal value.
    pub fn to_raw(&self) -> RawArgument {
        match self {
            Self::Bool(b) => RawArgument::Plain(serde_json::Value::Bool(*b)),
            Self::Number(n) => RawArgument::Plain(serde_json::json!(n)),
            Self::Str(s) => RawArgument::Plain(serde_json::Value::String(s.clone())),
            Self::Bytes(bytes) => RawArgument::Plain(serde_json::Value::String(escape_binary(bytes))),
            Self::Labeled { text, label, .. } => RawArgument::Labeled {
                string: text.clone(),
                option: label.to_string(),
            },
        }
    }
}

// ============================================================================
// Binary strings
// ============================================================================

/// Unescape a binary string in one left-to-right pass. Recognized escapes:
/// `\n` `\r` `\t` `\0` `\\` `\'` `\"` `\xNN`. Any other escape keeps its
/// backslash; a trailing lone backslash is literal. Produced characters are
/// never rescanned, so `\\n` is a backslash followed by `n`.
pub fn unescape_binary(text: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.char_indices();
    let mut buf = [0u8; 4];

    while let Some((pos, c)) = chars.next() {
        if c != '\\' {
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            None => out.push(b'\\'),
            Some((_, 'n')) => out.push(b'\n'),
            Some((_, 'r')) => out.push(b'\r'),
            Some((_, 't')) => out.push(b'\t'),
            Some((_, '0')) => out.push(0),
            Some((_, '\\')) => out.push(b'\\'),
            Some((_, '\'')) => out.push(b'\''),
            Some((_, '"')) => out.push(b'"'),
            Some((_, 'x')) => {
                let hi = chars.next().and_then(|(_, h)| h.to_digit(16));
                let lo = chars.next().and_then(|(_, l)| l.to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push((hi * 16 + lo) as u8),
                    _ => return Err(format!("invalid \\x escape at position {}", pos)),
                }
            }
            Some((_, other)) => {
                out.push(b'\\');
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    Ok(out)
}

/// Escape bytes so that [`unescape_binary`] restores them exactly.
pub fn escape_binary(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(char::from(b)),
            other => out.push_str(&format!("\\x{:02x}", other)),
        }
    }
    out
}

// ============================================================================
// Labeled byte strings
// ============================================================================

/// Decode a labeled byte-string argument.
pub fn decode_labeled(text: &str, label: ByteLabel) -> Result<Vec<u8>, String> {
    match label {
        ByteLabel::Utf8 => Ok(text.as_bytes().to_vec()),
        ByteLabel::Latin1 => encode_text(text, TextEncoding::Latin1),
        ByteLabel::Hex => decode_hex_loose(text),
        ByteLabel::Base64 => {
            let trimmed: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(&trimmed)
                .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(&trimmed))
                .map_err(|e| format!("invalid base64: {}", e))
        }
        ByteLabel::Decimal => text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<u8>()
                    .map_err(|_| format!("'{}' is not a byte value", t))
            })
            .collect(),
    }
}

/// Hex with optional whitespace, comma or colon separators and `0x`
/// prefixes.
fn decode_hex_loose(text: &str) -> Result<Vec<u8>, String> {
    let digits: String = text
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .map(|t| {
            t.strip_prefix("0x")
                .or_else(|| t.strip_prefix("0X"))
                .unwrap_or(t)
        })
        .collect();
    if digits.len() % 2 != 0 {
        return Err("hex string has an odd number of digits".to_string());
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| format!("invalid hex digits '{}'", String::from_utf8_lossy(pair)))
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PopulateChoice;
    use proptest::prelude::*;

    fn raw(value: serde_json::Value) -> RawArgument {
        RawArgument::Plain(value)
    }

    #[test]
    fn test_binary_escaped_backslash_then_n() {
        // The four characters a, backslash, backslash, n, b.
        let spec = ArgumentSpec::binary("Delimiter", "");
        let value = resolve_arg(0, &spec, &RawArgument::from("a\\\\nb"), None).unwrap();
        assert_eq!(value, ArgValue::Bytes(vec![b'a', b'\\', b'n', b'b']));
    }

    #[test]
    fn test_binary_escapes() {
        assert_eq!(unescape_binary("\\n\\r\\t").unwrap(), b"\n\r\t");
        assert_eq!(unescape_binary("\\x41\\x7e").unwrap(), b"A~");
        assert_eq!(unescape_binary("it\\'s").unwrap(), b"it's");
        assert_eq!(unescape_binary("\\q").unwrap(), b"\\q");
        assert_eq!(unescape_binary("end\\").unwrap(), b"end\\");
        assert_eq!(unescape_binary("é").unwrap(), "é".as_bytes());
    }

    #[test]
    fn test_binary_produced_chars_not_rescanned() {
        // \x5c is a backslash; the following n stays a letter.
        assert_eq!(unescape_binary("\\x5cn").unwrap(), b"\\n");
    }

    #[test]
    fn test_binary_bad_hex_escape() {
        let spec = ArgumentSpec::binary("Key", "");
        let err = resolve_arg(3, &spec, &RawArgument::from("\\xZZ"), None).unwrap_err();
        assert!(matches!(err, ArgumentError::Malformed { index: 3, .. }));
    }

    #[test]
    fn test_boolean_truthiness() {
        let spec = ArgumentSpec::boolean("Flag", false);
        let cases = [
            (serde_json::json!(true), true),
            (serde_json::json!(false), false),
            (serde_json::json!(1), true),
            (serde_json::json!(0), false),
            (serde_json::json!("yes"), true),
            (serde_json::json!("false"), false),
            (serde_json::json!(""), false),
            (serde_json::Value::Null, false),
        ];
        for (input, expected) in cases {
            let value = resolve_arg(0, &spec, &raw(input.clone()), None).unwrap();
            assert_eq!(value, ArgValue::Bool(expected), "input {}", input);
        }
        assert!(resolve_arg(0, &spec, &raw(serde_json::json!([1])), None).is_err());
    }

    #[test]
    fn test_number_parses_strings() {
        let spec = ArgumentSpec::number("Shift", 0.0);
        let value = resolve_arg(0, &spec, &RawArgument::from(" 12.5 "), None).unwrap();
        assert_eq!(value, ArgValue::Number(12.5));
    }

    #[test]
    fn test_number_rejects_garbage_and_nan() {
        let spec = ArgumentSpec::number("Shift", 0.0);
        let err = resolve_arg(1, &spec, &RawArgument::from("twelve"), None).unwrap_err();
        assert!(matches!(err, ArgumentError::NotANumber { index: 1, .. }));
        let err = resolve_arg(1, &spec, &RawArgument::from("NaN"), None).unwrap_err();
        assert!(matches!(err, ArgumentError::NotANumber { .. }));
        let err = resolve_arg(1, &spec, &RawArgument::from(true), None).unwrap_err();
        assert!(matches!(err, ArgumentError::Type { .. }));
    }

    #[test]
    fn test_number_out_of_range_rejected() {
        let spec = ArgumentSpec::number_range("Width", 8.0, 1.0, 64.0);
        let err = resolve_arg(0, &spec, &RawArgument::from(65i64), None).unwrap_err();
        assert!(matches!(
            err,
            ArgumentError::OutOfRange {
                value,
                min: Some(_),
                max: Some(_),
                ..
            } if value == 65.0
        ));
        assert!(resolve_arg(0, &spec, &RawArgument::from(64i64), None).is_ok());
        assert!(resolve_arg(0, &spec, &RawArgument::from(0i64), None).is_err());
    }

    #[test]
    fn test_strings_stringify_primitives() {
        let spec = ArgumentSpec::string("Label", "");
        assert_eq!(
            resolve_arg(0, &spec, &RawArgument::from(3i64), None).unwrap(),
            ArgValue::Str("3".into())
        );
        assert_eq!(
            resolve_arg(0, &spec, &RawArgument::from(false), None).unwrap(),
            ArgValue::Str("false".into())
        );
        assert!(resolve_arg(0, &spec, &raw(serde_json::Value::Null), None).is_err());
    }

    #[test]
    fn test_choice_must_match() {
        let spec = ArgumentSpec::choice("Delimiter", &["Space", "Comma"]);
        assert!(resolve_arg(0, &spec, &RawArgument::from("Comma"), None).is_ok());
        let err = resolve_arg(0, &spec, &RawArgument::from("Tab"), None).unwrap_err();
        assert!(matches!(err, ArgumentError::NotAChoice { .. }));
    }

    #[test]
    fn test_editable_choice_accepts_anything() {
        let spec = ArgumentSpec::editable("Regex", &["[a-z]+", "\\d+"], "[a-z]+");
        let value = resolve_arg(0, &spec, &RawArgument::from("x{2}"), None).unwrap();
        assert_eq!(value, ArgValue::Str("x{2}".into()));
    }

    #[test]
    fn test_labeled_object_form() {
        let spec = ArgumentSpec::labeled("Key", &[ByteLabel::Hex, ByteLabel::Utf8], "");
        let value = resolve_arg(
            0,
            &spec,
            &RawArgument::Labeled {
                string: "de ad".into(),
                option: "Hex".into(),
            },
            None,
        )
        .unwrap();
        assert_eq!(
            value,
            ArgValue::Labeled {
                text: "de ad".into(),
                label: ByteLabel::Hex,
                bytes: vec![0xde, 0xad],
            }
        );
    }

    #[test]
    fn test_labeled_bare_string_uses_first_label() {
        let spec = ArgumentSpec::labeled("Key", &[ByteLabel::Utf8, ByteLabel::Hex], "");
        let value = resolve_arg(0, &spec, &RawArgument::from("ab"), None).unwrap();
        assert!(matches!(
            value,
            ArgValue::Labeled { label: ByteLabel::Utf8, ref bytes, .. } if bytes == b"ab"
        ));
    }

    #[test]
    fn test_labeled_rejects_disallowed_label() {
        let spec = ArgumentSpec::labeled("Key", &[ByteLabel::Hex], "");
        let err = resolve_arg(
            0,
            &spec,
            &RawArgument::Labeled {
                string: "x".into(),
                option: "Base64".into(),
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ArgumentError::UnknownLabel { .. }));
    }

    #[test]
    fn test_labeled_form_accepted_for_plain_kinds() {
        let spec = ArgumentSpec::string("Find", "");
        let value = resolve_arg(
            0,
            &spec,
            &RawArgument::Labeled {
                string: "needle".into(),
                option: "Simple string".into(),
            },
            None,
        )
        .unwrap();
        assert_eq!(value, ArgValue::Str("needle".into()));
    }

    #[test]
    fn test_decode_labeled_variants() {
        assert_eq!(decode_labeled("0x01,0x02", ByteLabel::Hex).unwrap(), vec![1, 2]);
        assert_eq!(decode_labeled("aGk=", ByteLabel::Base64).unwrap(), b"hi");
        assert_eq!(decode_labeled("aGk", ByteLabel::Base64).unwrap(), b"hi");
        assert_eq!(decode_labeled("72, 105", ByteLabel::Decimal).unwrap(), b"Hi");
        assert_eq!(decode_labeled("\u{e9}", ByteLabel::Latin1).unwrap(), vec![0xe9]);
        assert!(decode_labeled("abc", ByteLabel::Hex).is_err());
        assert!(decode_labeled("256", ByteLabel::Decimal).is_err());
    }

    #[test]
    fn test_resolve_args_fills_defaults() {
        let schema = vec![
            ArgumentSpec::choice("Delimiter", &["Space", "None"]),
            ArgumentSpec::number("Bytes per line", 0.0),
        ];
        let args = resolve_args(&schema, &[RawArgument::from("None")]).unwrap();
        assert_eq!(
            args,
            ResolvedArgs(vec![ArgValue::Str("None".into()), ArgValue::Number(0.0)])
        );
    }

    #[test]
    fn test_resolve_args_rejects_surplus() {
        let schema = vec![ArgumentSpec::boolean("Flag", false)];
        let err = resolve_args(&schema, &[true.into(), false.into()]).unwrap_err();
        assert_eq!(
            err,
            ArgumentError::Arity {
                expected: 1,
                got: 2
            }
        );
    }

    fn populate_schema() -> Vec<ArgumentSpec> {
        vec![
            ArgumentSpec::choice("Alphabet", &["A-Z", "0-9"]),
            ArgumentSpec::populate(
                "Preset",
                vec![
                    PopulateChoice::new("Letters", &["A-Z", "a-z"]),
                    PopulateChoice::new("Digits", &["0-9"]),
                ],
                0,
            ),
        ]
    }

    #[test]
    fn test_populate_replaces_target_choices() {
        let schema = populate_schema();
        // "a-z" is only valid once "Letters" repopulates the target.
        let args = resolve_args(&schema, &["a-z".into(), "Letters".into()]).unwrap();
        assert_eq!(args.string(0).unwrap(), "a-z");

        let err = resolve_args(&schema, &["a-z".into(), "Digits".into()]).unwrap_err();
        assert!(matches!(err, ArgumentError::NotAChoice { index: 0, .. }));
    }

    #[test]
    fn test_populate_default_target_follows_active_list() {
        let schema = populate_schema();
        let args = resolve_args(&schema, &[]).unwrap();
        assert_eq!(args.string(0).unwrap(), "A-Z");
        assert_eq!(args.string(1).unwrap(), "Letters");

        let schema = populate_schema();
        let args = resolve_args(&schema, &[RawArgument::Plain(serde_json::Value::Null)]);
        assert!(args.is_err());
    }

    #[test]
    fn test_active_schema_presents_populated_list() {
        let schema = populate_schema();
        let active = active_schema(&schema, &["0-9".into(), "Digits".into()]).unwrap();
        assert_eq!(active[0].kind, ArgKind::Choice(vec!["0-9".into()]));
        // The schema itself is untouched.
        assert_eq!(
            schema[0].kind,
            ArgKind::Choice(vec!["A-Z".into(), "0-9".into()])
        );
    }

    #[test]
    fn test_populate_fills_editable_default() {
        let schema = vec![
            ArgumentSpec::populate(
                "Built in",
                vec![
                    PopulateChoice::new("User defined", &[""]),
                    PopulateChoice::new("Digits", &[r"\d+"]),
                ],
                1,
            ),
            ArgumentSpec::editable("Pattern", &[], ""),
        ];
        let args = resolve_args(&schema, &["Digits".into()]).unwrap();
        assert_eq!(args.string(1).unwrap(), r"\d+");

        // An explicit value is kept even when it is not in the preset list.
        let args = resolve_args(&schema, &["Digits".into(), "[a-f]+".into()]).unwrap();
        assert_eq!(args.string(1).unwrap(), "[a-f]+");

        let args = resolve_args(&schema, &[]).unwrap();
        assert_eq!(args.string(1).unwrap(), "");
    }

    #[test]
    fn test_validate_schema() {
        assert!(validate_schema(&populate_schema()).is_ok());

        let bad_target = vec![ArgumentSpec::populate(
            "Preset",
            vec![PopulateChoice::new("x", &["y"])],
            0,
        )];
        assert!(validate_schema(&bad_target).is_err());

        let bad_default = vec![ArgumentSpec::number_range("Width", 100.0, 0.0, 10.0)];
        assert!(validate_schema(&bad_default)
            .unwrap_err()
            .contains("default does not resolve"));
    }

    fn assert_round_trip(spec: &ArgumentSpec, raw: &RawArgument) {
        let first = resolve_arg(0, spec, raw, None).unwrap();
        let again = resolve_arg(0, spec, &first.to_raw(), None).unwrap();
        assert_eq!(first, again);
    }

    proptest! {
        #[test]
        fn prop_binary_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let spec = ArgumentSpec::binary("Delimiter", "");
            let resolved = resolve_arg(0, &spec, &RawArgument::from(escape_binary(&bytes).as_str()), None).unwrap();
            prop_assert_eq!(&resolved, &ArgValue::Bytes(bytes));
            assert_round_trip(&spec, &resolved.to_raw());
        }

        #[test]
        fn prop_binary_text_round_trip(text in "[ -~\\\\]{0,32}") {
            let spec = ArgumentSpec::binary("Delimiter", "");
            if resolve_arg(0, &spec, &RawArgument::from(text.as_str()), None).is_ok() {
                assert_round_trip(&spec, &RawArgument::from(text.as_str()));
            }
        }

        #[test]
        fn prop_number_round_trip(n in -1.0e9f64..1.0e9) {
            let spec = ArgumentSpec::number_range("N", 0.0, -1.0e9, 1.0e9);
            assert_round_trip(&spec, &RawArgument::from(n));
        }

        #[test]
        fn prop_bool_round_trip(b in any::<bool>()) {
            assert_round_trip(&ArgumentSpec::boolean("B", false), &RawArgument::from(b));
        }

        #[test]
        fn prop_string_round_trip(s in ".*") {
            assert_round_trip(&ArgumentSpec::string("S", ""), &RawArgument::from(s.as_str()));
            assert_round_trip(&ArgumentSpec::text("T", ""), &RawArgument::from(s.as_str()));
            assert_round_trip(&ArgumentSpec::editable("E", &[], ""), &RawArgument::from(s.as_str()));
        }

        #[test]
        fn prop_choice_round_trip(i in 0usize..3) {
            let choices = ["Space", "Comma", "None"];
            assert_round_trip(&ArgumentSpec::choice("C", &choices), &RawArgument::from(choices[i]));
        }

        #[test]
        fn prop_labeled_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..32)) {
            let spec = ArgumentSpec::labeled("Key", &[ByteLabel::Hex, ByteLabel::Base64], "");
            let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            let raw = RawArgument::Labeled { string: hex, option: "Hex".into() };
            assert_round_trip(&spec, &raw);
        }
    }
}
