//! Data format operations: hex, base64, binary, decimal and string escapes.

use crate::core::error::OperationError;
use crate::core::registry::OperationDescriptor;
use crate::core::types::{ArgumentSpec, DataKind, ResolvedArgs, Value};
use base64::alphabet;
use base64::engine::{general_purpose, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

const CATEGORY: &str = "Data format";

const DELIMITERS: [&str; 10] = [
    "Space",
    "Percent",
    "Comma",
    "Semi-colon",
    "Colon",
    "Line feed",
    "CRLF",
    "0x",
    "\\x",
    "None",
];

const BASE64_ALPHABETS: [&str; 3] = ["A-Za-z0-9+/=", "A-Za-z0-9-_", "A-Za-z0-9-_="];

const INDIFFERENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_DECODE: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, INDIFFERENT);
const URL_SAFE_DECODE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, INDIFFERENT);

pub fn operations() -> Vec<OperationDescriptor> {
    let with_auto: Vec<&str> = std::iter::once("Auto").chain(DELIMITERS).collect();
    let simple_delims = [
        "Space",
        "Comma",
        "Semi-colon",
        "Colon",
        "Line feed",
        "CRLF",
        "None",
    ];
    let simple_with_auto: Vec<&str> = std::iter::once("Auto").chain(simple_delims).collect();

    vec![
        OperationDescriptor::new("To Hex", CATEGORY, DataKind::Bytes, DataKind::Text, to_hex)
            .describe("Converts bytes to hexadecimal byte pairs.")
            .arg(ArgumentSpec::choice("Delimiter", &DELIMITERS))
            .arg(ArgumentSpec::number_range("Bytes per line", 0.0, 0.0, 65536.0)),
        OperationDescriptor::new("From Hex", CATEGORY, DataKind::Text, DataKind::Bytes, from_hex)
            .describe("Converts hexadecimal byte pairs back to bytes.")
            .arg(ArgumentSpec::choice("Delimiter", &with_auto)),
        OperationDescriptor::new(
            "To Base64",
            CATEGORY,
            DataKind::Bytes,
            DataKind::Text,
            to_base64,
        )
        .describe("Encodes bytes as Base64.")
        .arg(ArgumentSpec::choice("Alphabet", &BASE64_ALPHABETS)),
        OperationDescriptor::new(
            "From Base64",
            CATEGORY,
            DataKind::Text,
            DataKind::Bytes,
            from_base64,
        )
        .describe("Decodes Base64 text. Padding is optional.")
        .arg(ArgumentSpec::choice("Alphabet", &BASE64_ALPHABETS))
        .arg(ArgumentSpec::boolean("Remove non-alphabet chars", true)),
        OperationDescriptor::new(
            "To Binary",
            CATEGORY,
            DataKind::Bytes,
            DataKind::Text,
            to_binary,
        )
        .describe("Renders each byte as eight binary digits.")
        .arg(ArgumentSpec::choice("Delimiter", &simple_delims)),
        OperationDescriptor::new(
            "From Binary",
            CATEGORY,
            DataKind::Text,
            DataKind::Bytes,
            from_binary,
        )
        .describe("Reads groups of eight binary digits as bytes.")
        .arg(ArgumentSpec::choice("Delimiter", &simple_with_auto)),
        OperationDescriptor::new(
            "To Decimal",
            CATEGORY,
            DataKind::Bytes,
            DataKind::Text,
            to_decimal,
        )
        .describe("Renders each byte as a decimal number.")
        .arg(ArgumentSpec::choice("Delimiter", &simple_delims))
        .arg(ArgumentSpec::boolean("Support signed values", false)),
        OperationDescriptor::new(
            "From Decimal",
            CATEGORY,
            DataKind::Text,
            DataKind::Bytes,
            from_decimal,
        )
        .describe("Reads decimal byte values.")
        .arg(ArgumentSpec::choice("Delimiter", &simple_with_auto))
        .arg(ArgumentSpec::boolean("Support signed values", false)),
        OperationDescriptor::new(
            "Escape String",
            CATEGORY,
            DataKind::Text,
            DataKind::Text,
            escape_string,
        )
        .describe("Escapes special characters with backslash sequences.")
        .arg(ArgumentSpec::choice(
            "Escape level",
            &["Special chars", "Everything", "Minimal"],
        ))
        .arg(ArgumentSpec::choice(
            "Escape quote",
            &["Single", "Double", "Backtick"],
        ))
        .arg(ArgumentSpec::boolean("Uppercase hex", false)),
        OperationDescriptor::new(
            "Unescape String",
            CATEGORY,
            DataKind::Text,
            DataKind::Text,
            unescape_string,
        )
        .describe("Replaces backslash escape sequences with the characters they stand for."),
    ]
}

fn delimiter(name: &str) -> &'static str {
    match name {
        "Space" => " ",
        "Percent" => "%",
        "Comma" => ",",
        "Semi-colon" => ";",
        "Colon" => ":",
        "Line feed" => "\n",
        "CRLF" => "\r\n",
        "0x" => "0x",
        "\\x" => "\\x",
        _ => "",
    }
}

/// Join rendered bytes, `per_line` to a line when non-zero.
fn join_bytes(items: Vec<String>, sep: &str, prefix: &str, per_line: usize) -> String {
    let line = |chunk: &[String]| -> String {
        chunk
            .iter()
            .map(|item| format!("{}{}", prefix, item))
            .collect::<Vec<_>>()
            .join(sep)
    };
    if per_line == 0 {
        return line(&items);
    }
    items
        .chunks(per_line)
        .map(line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lowercase hex with no separators.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn to_hex(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let bytes = input.as_bytes()?;
    let name = args.string(0)?;
    let per_line = args.count(1)?;
    let pairs: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    let out = match name {
        // Prefix styles mark every byte rather than separating them.
        "0x" | "\\x" => join_bytes(pairs, "", delimiter(name), per_line),
        _ => join_bytes(pairs, delimiter(name), "", per_line),
    };
    Ok(Value::Text(out))
}

pub fn from_hex(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let name = args.string(0)?;

    let tokens: Vec<String> = match name {
        "Auto" => {
            let digits: String = text
                .replace("0x", "")
                .replace("0X", "")
                .replace("\\x", "")
                .chars()
                .filter(|c| !c.is_whitespace() && !matches!(c, ',' | ';' | ':' | '%'))
                .collect();
            pairs(&digits)?
        }
        "None" => pairs(&text.chars().filter(|c| !c.is_whitespace()).collect::<String>())?,
        _ => text
            .split(delimiter(name))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect(),
    };

    tokens
        .iter()
        .map(|token| {
            if token.is_empty() || token.len() > 2 || !token.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid_hex(token));
            }
            u8::from_str_radix(token, 16).map_err(|_| invalid_hex(token))
        })
        .collect::<Result<Vec<u8>, _>>()
        .map(Value::Bytes)
}

fn pairs(digits: &str) -> Result<Vec<String>, OperationError> {
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(OperationError::invalid_input(format!(
            "Invalid hex character '{}'",
            bad
        )));
    }
    if digits.len() % 2 != 0 {
        return Err(OperationError::invalid_input(
            "Invalid hex: odd number of digits",
        ));
    }
    Ok(digits
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect())
}

fn invalid_hex(token: &str) -> OperationError {
    OperationError::invalid_input(format!("Invalid hex byte '{}'", token))
}

pub fn to_base64(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let bytes = input.as_bytes()?;
    let out = match args.string(0)? {
        "A-Za-z0-9-_" => general_purpose::URL_SAFE_NO_PAD.encode(bytes),
        "A-Za-z0-9-_=" => general_purpose::URL_SAFE.encode(bytes),
        _ => general_purpose::STANDARD.encode(bytes),
    };
    Ok(Value::Text(out))
}

pub fn from_base64(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let url_safe = args.string(0)?.contains('_');
    let remove_other = args.boolean(1)?;

    let symbols: &[char] = if url_safe { &['-', '_'] } else { &['+', '/'] };
    let cleaned: String = if remove_other {
        text.chars()
            .filter(|c| c.is_ascii_alphanumeric() || symbols.contains(c) || *c == '=')
            .collect()
    } else {
        text.trim().to_string()
    };

    let engine = if url_safe {
        &URL_SAFE_DECODE
    } else {
        &STANDARD_DECODE
    };
    engine
        .decode(cleaned.as_bytes())
        .map(Value::Bytes)
        .map_err(|e| OperationError::invalid_input(format!("Invalid Base64: {}", e)))
}

pub fn to_binary(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let bytes = input.as_bytes()?;
    let items: Vec<String> = bytes.iter().map(|b| format!("{:08b}", b)).collect();
    Ok(Value::Text(items.join(delimiter(args.string(0)?))))
}

pub fn from_binary(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let name = args.string(0)?;
    let digits: String = match name {
        "Auto" => text
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, ',' | ';' | ':'))
            .collect(),
        _ => text
            .split(delimiter(name))
            .collect::<String>()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect(),
    };

    if let Some(bad) = digits.chars().find(|c| *c != '0' && *c != '1') {
        return Err(OperationError::invalid_input(format!(
            "Invalid binary digit '{}'",
            bad
        )));
    }
    if digits.len() % 8 != 0 {
        return Err(OperationError::invalid_input(format!(
            "Binary input has {} digits, not a multiple of 8",
            digits.len()
        )));
    }

    digits
        .as_bytes()
        .chunks(8)
        .map(|chunk| {
            let s = std::str::from_utf8(chunk).unwrap_or_default();
            u8::from_str_radix(s, 2)
                .map_err(|_| OperationError::invalid_input(format!("Invalid binary '{}'", s)))
        })
        .collect::<Result<Vec<u8>, _>>()
        .map(Value::Bytes)
}

pub fn to_decimal(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let bytes = input.as_bytes()?;
    let signed = args.boolean(1)?;
    let items: Vec<String> = bytes
        .iter()
        .map(|&b| {
            if signed {
                (b as i8).to_string()
            } else {
                b.to_string()
            }
        })
        .collect();
    Ok(Value::Text(items.join(delimiter(args.string(0)?))))
}

pub fn from_decimal(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let name = args.string(0)?;
    let signed = args.boolean(1)?;

    let tokens: Vec<&str> = match name {
        "Auto" => text
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':'))
            .filter(|t| !t.is_empty())
            .collect(),
        "None" => text.split_whitespace().collect(),
        _ => text
            .split(delimiter(name))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect(),
    };

    tokens
        .iter()
        .map(|token| {
            let n: i64 = token.parse().map_err(|_| {
                OperationError::invalid_input(format!("'{}' is not a decimal number", token))
            })?;
            match n {
                0..=255 => Ok(n as u8),
                -128..=-1 if signed => Ok(n as i8 as u8),
                _ => Err(OperationError::invalid_input(format!(
                    "{} is not a byte value",
                    n
                ))),
            }
        })
        .collect::<Result<Vec<u8>, _>>()
        .map(Value::Bytes)
}

pub fn escape_string(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let level = args.string(0)?;
    let quote = match args.string(1)? {
        "Double" => '"',
        "Backtick" => '`',
        _ => '\'',
    };
    let upper = args.boolean(2)?;
    let hex = |n: u32, width: usize| {
        if upper {
            format!("{:0width$X}", n, width = width)
        } else {
            format!("{:0width$x}", n, width = width)
        }
    };

    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let code = c as u32;
        if level == "Everything" {
            if code < 0x100 {
                out.push_str(&format!("\\x{}", hex(code, 2)));
            } else {
                out.push_str(&format!("\\u{{{}}}", hex(code, 4)));
            }
            continue;
        }
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if level == "Special chars" && (code < 0x20 || code == 0x7f) => {
                out.push_str(&format!("\\x{}", hex(code, 2)));
            }
            c if level == "Special chars" && !c.is_ascii() => {
                out.push_str(&format!("\\u{{{}}}", hex(code, 4)));
            }
            c => out.push(c),
        }
    }
    Ok(Value::Text(out))
}

pub fn unescape_string(input: &Value, _args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(e) = chars.next() else {
            out.push('\\');
            break;
        };
        match e {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            'x' => {
                let digits: String = chars.by_ref().take(2).collect();
                out.push(code_point(&digits, 2)?);
            }
            'u' if chars.peek() == Some(&'{') => {
                chars.next();
                let digits: String = chars.by_ref().take_while(|c| *c != '}').collect();
                out.push(code_point(&digits, 0)?);
            }
            'u' => {
                let digits: String = chars.by_ref().take(4).collect();
                out.push(code_point(&digits, 4)?);
            }
            // Any other escaped character stands for itself.
            other => out.push(other),
        }
    }
    Ok(Value::Text(out))
}

fn code_point(digits: &str, exact_len: usize) -> Result<char, OperationError> {
    let bad = || OperationError::invalid_input(format!("Invalid escape sequence '{}'", digits));
    if digits.is_empty() || (exact_len > 0 && digits.len() != exact_len) {
        return Err(bad());
    }
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(bad)
}
