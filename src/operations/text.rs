//! Text operations: case, reversal, search and replace, regex, HTML.

use crate::core::coercion::{escape_html as escape_entities, strip_tags};
use crate::core::error::OperationError;
use crate::core::registry::OperationDescriptor;
use crate::core::resolver::unescape_binary;
use crate::core::types::{ArgumentSpec, DataKind, PopulateChoice, ResolvedArgs, Value};
use regex::{NoExpand, Regex, RegexBuilder};

const CATEGORY: &str = "Text";

const SEARCH_MODES: [&str; 3] = ["Regex", "Simple string", "Extended (\\n, \\t, \\x...)"];

pub fn operations() -> Vec<OperationDescriptor> {
    let builtin_regexes = vec![
        PopulateChoice::new("User defined", &[]),
        PopulateChoice::new(
            "IPv4 address",
            &[r"(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)"],
        ),
        PopulateChoice::new("Email address", &[r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+"]),
        PopulateChoice::new("URL", &[r"[a-zA-Z][a-zA-Z0-9+.-]*://[^\s/$.?#][^\s]*"]),
        PopulateChoice::new("Hex byte", &[r"\b[0-9a-fA-F]{2}\b"]),
    ];

    vec![
        OperationDescriptor::new("To Upper case", CATEGORY, DataKind::Text, DataKind::Text, |v, _| {
            Ok(Value::Text(v.as_text()?.to_uppercase()))
        })
        .describe("Converts every letter to upper case."),
        OperationDescriptor::new("To Lower case", CATEGORY, DataKind::Text, DataKind::Text, |v, _| {
            Ok(Value::Text(v.as_text()?.to_lowercase()))
        })
        .describe("Converts every letter to lower case."),
        OperationDescriptor::new("Reverse", CATEGORY, DataKind::Text, DataKind::Text, reverse)
            .describe("Reverses the order of characters or lines.")
            .arg(ArgumentSpec::choice("By", &["Character", "Line"])),
        OperationDescriptor::new(
            "Find / Replace",
            CATEGORY,
            DataKind::Text,
            DataKind::Text,
            find_replace,
        )
        .describe("Replaces occurrences of a string or regular expression.")
        .arg(ArgumentSpec::string("Find", ""))
        .arg(ArgumentSpec::choice("Mode", &SEARCH_MODES))
        .arg(ArgumentSpec::string("Replace", ""))
        .arg(ArgumentSpec::boolean("Global match", true))
        .arg(ArgumentSpec::boolean("Case insensitive", false))
        .arg(ArgumentSpec::boolean("Multiline matching", true)),
        OperationDescriptor::new(
            "Regular expression",
            CATEGORY,
            DataKind::Text,
            DataKind::Text,
            regular_expression,
        )
        .describe("Lists the matches of a regular expression, one per line.")
        .arg(ArgumentSpec::populate("Built in regexes", builtin_regexes, 1))
        .arg(ArgumentSpec::editable("Regex", &[], ""))
        .arg(ArgumentSpec::boolean("Case insensitive", false))
        .arg(ArgumentSpec::choice(
            "Output format",
            &["List matches", "List capture groups"],
        )),
        OperationDescriptor::new(
            "Count occurrences",
            CATEGORY,
            DataKind::Text,
            DataKind::Number,
            count_occurrences,
        )
        .describe("Counts non-overlapping occurrences of a string or regular expression.")
        .arg(ArgumentSpec::string("Search string", ""))
        .arg(ArgumentSpec::choice("Mode", &SEARCH_MODES)),
        OperationDescriptor::new("Length", CATEGORY, DataKind::Text, DataKind::Number, length)
            .describe("Length of the input.")
            .arg(ArgumentSpec::choice("Unit", &["Characters", "Bytes", "Lines"])),
        OperationDescriptor::new(
            "Strip HTML tags",
            CATEGORY,
            DataKind::Html,
            DataKind::Text,
            strip_html_tags,
        )
        .describe("Removes tags, scripts and styles from markup.")
        .arg(ArgumentSpec::boolean("Remove indentation", true))
        .arg(ArgumentSpec::boolean("Remove excess line breaks", true)),
        OperationDescriptor::new("Escape HTML", CATEGORY, DataKind::Text, DataKind::Html, escape_html)
            .describe("Replaces HTML-significant characters with entities.")
            .arg(ArgumentSpec::boolean("Escape all characters", false)),
    ]
}

pub fn reverse(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let out = match args.string(0)? {
        "Line" => text.split('\n').rev().collect::<Vec<_>>().join("\n"),
        _ => text.chars().rev().collect(),
    };
    Ok(Value::Text(out))
}

/// Build the search regex for a mode.
fn search_regex(
    pattern: &str,
    mode: &str,
    case_insensitive: bool,
    multiline: bool,
) -> Result<Regex, OperationError> {
    let source = match mode {
        "Regex" => pattern.to_string(),
        "Simple string" => regex::escape(pattern),
        _ => {
            let bytes = unescape_binary(pattern).map_err(OperationError::invalid_input)?;
            regex::escape(&String::from_utf8_lossy(&bytes))
        }
    };
    RegexBuilder::new(&source)
        .case_insensitive(case_insensitive)
        .multi_line(multiline)
        .build()
        .map_err(|e| OperationError::invalid_input(format!("Invalid regular expression: {}", e)))
}

pub fn find_replace(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let find = args.string(0)?;
    let mode = args.string(1)?;
    let replace = args.string(2)?;
    let global = args.boolean(3)?;

    if find.is_empty() {
        return Ok(Value::Text(text.to_string()));
    }

    let re = search_regex(find, mode, args.boolean(4)?, args.boolean(5)?)?;
    let limit = if global { 0 } else { 1 };
    let out = if mode == "Regex" {
        re.replacen(text, limit, replace)
    } else {
        re.replacen(text, limit, NoExpand(replace))
    };
    Ok(Value::Text(out.into_owned()))
}

pub fn regular_expression(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let pattern = args.string(1)?;
    if pattern.is_empty() {
        return Err(OperationError::invalid_input("No regular expression given"));
    }
    let re = search_regex(pattern, "Regex", args.boolean(2)?, true)?;

    let lines: Vec<String> = match args.string(3)? {
        "List capture groups" => re
            .captures_iter(text)
            .map(|caps| {
                caps.iter()
                    .skip(1)
                    .map(|group| group.map(|m| m.as_str()).unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect(),
        _ => re.find_iter(text).map(|m| m.as_str().to_string()).collect(),
    };
    Ok(Value::Text(lines.join("\n")))
}

pub fn count_occurrences(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let search = args.string(0)?;
    if search.is_empty() {
        return Ok(Value::Number(0.0));
    }
    let re = search_regex(search, args.string(1)?, false, true)?;
    Ok(Value::Number(re.find_iter(text).count() as f64))
}

pub fn length(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let n = match args.string(0)? {
        "Bytes" => text.len(),
        "Lines" if text.is_empty() => 0,
        "Lines" => text.lines().count(),
        _ => text.chars().count(),
    };
    Ok(Value::Number(n as f64))
}

pub fn strip_html_tags(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let mut text = strip_tags(input.as_html()?);
    if args.boolean(0)? {
        text = text
            .lines()
            .map(str::trim_start)
            .collect::<Vec<_>>()
            .join("\n");
    }
    if args.boolean(1)? {
        let mut collapsed = String::with_capacity(text.len());
        let mut blank_run = 0;
        for line in text.lines() {
            if line.trim().is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            if !collapsed.is_empty() {
                collapsed.push('\n');
            }
            collapsed.push_str(line);
        }
        text = collapsed.trim().to_string();
    }
    Ok(Value::Text(text))
}

pub fn escape_html(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let text = input.as_text()?;
    let out = if args.boolean(0)? {
        text.chars().map(|c| format!("&#{};", c as u32)).collect()
    } else {
        escape_entities(text)
    };
    Ok(Value::Html(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::resolve_args;
    use crate::core::types::{ArgValue, RawArgument};

    fn text(v: Value) -> String {
        match v {
            Value::Text(t) => t,
            other => panic!("expected text, got {:?}", other),
        }
    }

    fn op_args(name: &str, raw: &[RawArgument]) -> ResolvedArgs {
        let op = operations()
            .into_iter()
            .find(|op| op.name == name)
            .unwrap();
        resolve_args(&op.args, raw).unwrap()
    }

    #[test]
    fn test_reverse() {
        let by_char = op_args("Reverse", &[]);
        assert_eq!(text(reverse(&Value::Text("abé".into()), &by_char).unwrap()), "éba");
        let by_line = op_args("Reverse", &["Line".into()]);
        assert_eq!(
            text(reverse(&Value::Text("1\n2\n3".into()), &by_line).unwrap()),
            "3\n2\n1"
        );
    }

    #[test]
    fn test_find_replace_modes() {
        let input = Value::Text("a.b.c".into());
        let simple = op_args("Find / Replace", &[".".into(), "Simple string".into(), "-".into()]);
        assert_eq!(text(find_replace(&input, &simple).unwrap()), "a-b-c");

        let regex = op_args("Find / Replace", &["(\\w)\\.".into(), "Regex".into(), "$1!".into()]);
        assert_eq!(text(find_replace(&input, &regex).unwrap()), "a!b!c");

        let first_only = op_args(
            "Find / Replace",
            &[".".into(), "Simple string".into(), "$".into(), false.into()],
        );
        assert_eq!(text(find_replace(&input, &first_only).unwrap()), "a$b.c");

        let extended = op_args(
            "Find / Replace",
            &["\\n".into(), "Extended (\\n, \\t, \\x...)".into(), " ".into()],
        );
        assert_eq!(
            text(find_replace(&Value::Text("x\ny".into()), &extended).unwrap()),
            "x y"
        );
    }

    #[test]
    fn test_find_replace_bad_regex_is_recoverable() {
        let args = op_args("Find / Replace", &["(".into(), "Regex".into()]);
        let err = find_replace(&Value::Text("x".into()), &args).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_regular_expression_builtin_populates_pattern() {
        let args = op_args("Regular expression", &["IPv4 address".into()]);
        let out = regular_expression(
            &Value::Text("hosts 10.0.0.1 and 192.168.1.254, not 999.1.1.1x".into()),
            &args,
        )
        .unwrap();
        assert_eq!(text(out), "10.0.0.1\n192.168.1.254\n99.1.1.1");
    }

    #[test]
    fn test_regular_expression_capture_groups() {
        let args = op_args(
            "Regular expression",
            &[
                "User defined".into(),
                "(\\w+)=(\\d+)".into(),
                false.into(),
                "List capture groups".into(),
            ],
        );
        let out = regular_expression(&Value::Text("a=1 b=22".into()), &args).unwrap();
        assert_eq!(text(out), "a\t1\nb\t22");
    }

    #[test]
    fn test_regular_expression_empty_pattern() {
        let args = op_args("Regular expression", &[]);
        assert!(regular_expression(&Value::Text("x".into()), &args)
            .unwrap_err()
            .is_recoverable());
    }

    #[test]
    fn test_count_and_length() {
        let count = op_args("Count occurrences", &["ab".into(), "Simple string".into()]);
        assert_eq!(
            count_occurrences(&Value::Text("abcabab".into()), &count).unwrap(),
            Value::Number(3.0)
        );
        let bytes = op_args("Length", &["Bytes".into()]);
        assert_eq!(length(&Value::Text("é".into()), &bytes).unwrap(), Value::Number(2.0));
        let chars = op_args("Length", &[]);
        assert_eq!(length(&Value::Text("é".into()), &chars).unwrap(), Value::Number(1.0));
        let lines = op_args("Length", &["Lines".into()]);
        assert_eq!(length(&Value::Text("a\nb\n".into()), &lines).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_strip_html_tags() {
        let args = op_args("Strip HTML tags", &[]);
        let html = Value::Html(
            "<html>\n  <style>p{}</style>\n  <p>Hello</p>\n\n\n  <p>world</p>\n</html>".into(),
        );
        assert_eq!(text(strip_html_tags(&html, &args).unwrap()), "Hello\n\nworld");
    }

    #[test]
    fn test_escape_html() {
        let args = ResolvedArgs(vec![ArgValue::Bool(false)]);
        assert_eq!(
            escape_html(&Value::Text("<a href=\"x\">".into()), &args).unwrap(),
            Value::Html("&lt;a href=&quot;x&quot;&gt;".into())
        );
        let all = ResolvedArgs(vec![ArgValue::Bool(true)]);
        assert_eq!(
            escape_html(&Value::Text("Hi".into()), &all).unwrap(),
            Value::Html("&#72;&#105;".into())
        );
    }
}
