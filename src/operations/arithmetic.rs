//! Arithmetic operations on numbers, and number parsing and formatting.

use crate::core::coercion::{format_number, parse_number};
use crate::core::error::OperationError;
use crate::core::registry::OperationDescriptor;
use crate::core::types::{ArgumentSpec, DataKind, ResolvedArgs, Value};

const CATEGORY: &str = "Arithmetic";

const SEPARATORS: [&str; 4] = ["None", "Comma", "Space", "Underscore"];

pub fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "Parse Number",
            CATEGORY,
            DataKind::Text,
            DataKind::Number,
            parse,
        )
        .describe("Reads a decimal number from text.")
        .arg(ArgumentSpec::choice("Thousands separator", &SEPARATORS)),
        OperationDescriptor::new(
            "Format Number",
            CATEGORY,
            DataKind::Number,
            DataKind::Text,
            format,
        )
        .describe("Renders a number with fixed decimals and digit grouping.")
        .arg(ArgumentSpec::number_range("Decimal places", -1.0, -1.0, 20.0))
        .arg(ArgumentSpec::choice("Thousands separator", &SEPARATORS)),
        OperationDescriptor::new("Add", CATEGORY, DataKind::Number, DataKind::Number, add)
            .describe("Adds a constant.")
            .arg(ArgumentSpec::number("Value", 0.0)),
        OperationDescriptor::new(
            "Multiply",
            CATEGORY,
            DataKind::Number,
            DataKind::Number,
            multiply,
        )
        .describe("Multiplies by a constant.")
        .arg(ArgumentSpec::number("Factor", 1.0)),
    ]
}

fn separator(name: &str) -> Option<char> {
    match name {
        "Comma" => Some(','),
        "Space" => Some(' '),
        "Underscore" => Some('_'),
        _ => None,
    }
}

fn finite(n: f64) -> Result<Value, OperationError> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(OperationError::invalid_input(format!(
            "Result {} is not a finite number",
            n
        )))
    }
}

pub fn parse(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let cleaned: String = match separator(args.string(0)?) {
        Some(sep) => text.chars().filter(|c| *c != sep).collect(),
        None => text.to_string(),
    };
    let n = parse_number(&cleaned).map_err(OperationError::invalid_input)?;
    finite(n)
}

pub fn format(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let n = input.as_number()?;
    let places = args.integer(0)?;
    let rendered = if places < 0 {
        format_number(n)
    } else {
        format!("{:.*}", places as usize, n)
    };
    let out = match separator(args.string(1)?) {
        Some(sep) => group_digits(&rendered, sep),
        None => rendered,
    };
    Ok(Value::Text(out))
}

/// Insert `sep` between groups of three integer digits.
fn group_digits(rendered: &str, sep: char) -> String {
    let (sign, rest) = match rendered.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rendered),
    };
    let (int_part, frac_part) = match rest.find('.') {
        Some(dot) => rest.split_at(dot),
        None => (rest, ""),
    };
    if !int_part.chars().all(|c| c.is_ascii_digit()) {
        return rendered.to_string();
    }

    let mut grouped = String::with_capacity(rendered.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(sep);
        }
        grouped.push(c);
    }
    format!("{}{}{}", sign, grouped, frac_part)
}

pub fn add(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    finite(input.as_number()? + args.number(0)?)
}

pub fn multiply(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    finite(input.as_number()? * args.number(0)?)
}
