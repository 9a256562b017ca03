//! Recipe model, persisted recipe entries and loading from disk.
//!
//! A persisted recipe is a JSON or YAML array of
//! `{op, args, disabled?, breakpoint?}` entries, or the compact
//! `Op_Name('arg',true)` form handled by [`super::parser`]. Entries bind to
//! registry descriptors when a [`Recipe`] is built.

use super::error::{ArgumentError, RecipeError};
use super::parser;
use super::registry::{OperationDescriptor, OperationRegistry};
use super::resolver;
use super::types::{RawArgument, ResolvedArgs};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One step as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecipeEntry {
    pub op: String,
    #[serde(default)]
    pub args: Vec<RawArgument>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub breakpoint: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl RecipeEntry {
    pub fn new(op: &str, args: Vec<RawArgument>) -> Self {
        Self {
            op: op.to_string(),
            args,
            disabled: false,
            breakpoint: false,
        }
    }
}

/// A step bound to its operation. Arguments stay raw until the engine
/// reaches the step.
#[derive(Debug, Clone)]
pub struct RecipeStep {
    pub op: Arc<OperationDescriptor>,
    pub args: Vec<RawArgument>,
    pub disabled: bool,
    pub breakpoint: bool,
}

impl RecipeStep {
    pub fn new(op: Arc<OperationDescriptor>, args: Vec<RawArgument>) -> Self {
        Self {
            op,
            args,
            disabled: false,
            breakpoint: false,
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn breakpoint(mut self, breakpoint: bool) -> Self {
        self.breakpoint = breakpoint;
        self
    }

    pub fn name(&self) -> &str {
        &self.op.name
    }

    /// Resolve this step's raw arguments against its operation's schema.
    pub fn resolve(&self) -> Result<ResolvedArgs, ArgumentError> {
        resolver::resolve_args(&self.op.args, &self.args)
    }
}

/// An ordered, strictly sequential pipeline of steps.
#[derive(Debug, Clone, Default)]
pub struct Recipe {
    pub steps: Vec<RecipeStep>,
}

impl Recipe {
    pub fn new(steps: Vec<RecipeStep>) -> Self {
        Self { steps }
    }

    /// Append a step, builder style.
    pub fn then(mut self, step: RecipeStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Bind persisted entries to registry operations.
    pub fn from_entries(
        entries: &[RecipeEntry],
        registry: &OperationRegistry,
    ) -> Result<Self, RecipeError> {
        let steps = entries
            .iter()
            .enumerate()
            .map(|(step, entry)| {
                let op = registry
                    .lookup(&entry.op)
                    .ok_or_else(|| RecipeError::UnknownOperation {
                        step,
                        name: entry.op.clone(),
                    })?;
                Ok(RecipeStep::new(op, entry.args.clone())
                    .disabled(entry.disabled)
                    .breakpoint(entry.breakpoint))
            })
            .collect::<Result<Vec<_>, RecipeError>>()?;
        Ok(Self { steps })
    }

    pub fn to_entries(&self) -> Vec<RecipeEntry> {
        self.steps
            .iter()
            .map(|step| RecipeEntry {
                op: step.op.name.clone(),
                args: step.args.clone(),
                disabled: step.disabled,
                breakpoint: step.breakpoint,
            })
            .collect()
    }
}

/// Persisted recipe encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeFormat {
    Json,
    Yaml,
    Compact,
}

impl std::str::FromStr for RecipeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "compact" | "chef" => Ok(Self::Compact),
            other => Err(format!("unknown recipe format: {}", other)),
        }
    }
}

impl RecipeFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "chef" => Some(Self::Compact),
            _ => None,
        }
    }

    /// Guess the format from content.
    pub fn sniff(content: &str) -> Self {
        let trimmed = content.trim_start();
        if trimmed.starts_with('[') {
            Self::Json
        } else if parser::looks_compact(trimmed) {
            Self::Compact
        } else {
            Self::Yaml
        }
    }
}

/// Load recipe entries from a file, choosing the format by extension and
/// falling back to content sniffing.
pub fn load_recipe(path: &Path) -> Result<Vec<RecipeEntry>, RecipeError> {
    let content = std::fs::read_to_string(path).map_err(|e| RecipeError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let format = RecipeFormat::from_path(path).unwrap_or_else(|| RecipeFormat::sniff(&content));
    parse_recipe_as(&content, format)
}

/// Parse recipe entries, sniffing the format.
pub fn parse_recipe(content: &str) -> Result<Vec<RecipeEntry>, RecipeError> {
    parse_recipe_as(content, RecipeFormat::sniff(content))
}

pub fn parse_recipe_as(content: &str, format: RecipeFormat) -> Result<Vec<RecipeEntry>, RecipeError> {
    match format {
        RecipeFormat::Json => serde_json::from_str(content)
            .map_err(|e| RecipeError::Parse(format!("JSON: {}", e))),
        RecipeFormat::Yaml => serde_yaml_ng::from_str(content)
            .map_err(|e| RecipeError::Parse(format!("YAML: {}", e))),
        RecipeFormat::Compact => parser::parse_compact(content),
    }
}

/// Serialize recipe entries in `format`.
pub fn render_recipe(entries: &[RecipeEntry], format: RecipeFormat) -> Result<String, String> {
    match format {
        RecipeFormat::Json => {
            serde_json::to_string_pretty(entries).map_err(|e| format!("JSON serialize error: {}", e))
        }
        RecipeFormat::Yaml => {
            serde_yaml_ng::to_string(entries).map_err(|e| format!("YAML serialize error: {}", e))
        }
        RecipeFormat::Compact => Ok(parser::to_compact(entries)),
    }
}

/// JSON Schema of the persisted recipe format.
pub fn recipe_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(Vec<RecipeEntry>);
    serde_json::to_value(schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_json_entries() {
        let entries = parse_recipe(
            r#"[{"op": "To Hex", "args": ["Space", 0]},
                {"op": "From Hex", "args": [{"string": "x", "option": "Hex"}], "disabled": true}]"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].op, "To Hex");
        assert!(entries[1].disabled);
        assert!(!entries[1].breakpoint);
        assert!(matches!(entries[1].args[0], RawArgument::Labeled { .. }));
    }

    #[test]
    fn test_parse_yaml_entries() {
        let yaml = r#"
- op: To Base64
  args: ["A-Za-z0-9+/="]
- op: Reverse
  breakpoint: true
"#;
        let entries = parse_recipe(yaml).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].args.is_empty());
        assert!(entries[1].breakpoint);
    }

    #[test]
    fn test_parse_compact_entries() {
        let entries = parse_recipe("To_Hex('Space',0)Reverse()/disabled").unwrap();
        assert_eq!(entries[0].op, "To Hex");
        assert_eq!(entries[1].op, "Reverse");
        assert!(entries[1].disabled);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_recipe("[{\"op\": 3}]"),
            Err(RecipeError::Parse(_))
        ));
    }

    #[test]
    fn test_false_flags_not_serialized() {
        let json = serde_json::to_string(&RecipeEntry::new("Reverse", vec![])).unwrap();
        assert_eq!(json, r#"{"op":"Reverse","args":[]}"#);
    }

    #[test]
    fn test_from_entries_binds_operations() {
        let registry = OperationRegistry::with_builtins();
        let mut entry = RecipeEntry::new("to_hex", vec!["Space".into()]);
        entry.breakpoint = true;
        let recipe = Recipe::from_entries(&[entry], &registry).unwrap();
        assert_eq!(recipe.len(), 1);
        assert_eq!(recipe.steps[0].name(), "To Hex");
        assert!(recipe.steps[0].breakpoint);
        assert_eq!(recipe.to_entries()[0].op, "To Hex");
    }

    #[test]
    fn test_from_entries_unknown_operation() {
        let registry = OperationRegistry::with_builtins();
        let entries = vec![
            RecipeEntry::new("Reverse", vec![]),
            RecipeEntry::new("Frobnicate", vec![]),
        ];
        let err = Recipe::from_entries(&entries, &registry).unwrap_err();
        assert_eq!(
            err,
            RecipeError::UnknownOperation {
                step: 1,
                name: "Frobnicate".into()
            }
        );
    }

    #[test]
    fn test_load_recipe_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "- op: Reverse").unwrap();
        let entries = load_recipe(&path).unwrap();
        assert_eq!(entries[0].op, "Reverse");
    }

    #[test]
    fn test_load_recipe_missing_file() {
        let err = load_recipe(Path::new("/nonexistent/recipe.json")).unwrap_err();
        assert!(matches!(err, RecipeError::Io { .. }));
    }

    #[test]
    fn test_render_round_trip_all_formats() {
        let entries = vec![
            RecipeEntry::new("To Hex", vec!["Space".into(), 16i64.into()]),
            RecipeEntry {
                op: "XOR".into(),
                args: vec![RawArgument::Labeled {
                    string: "ff".into(),
                    option: "Hex".into(),
                }],
                disabled: true,
                breakpoint: true,
            },
        ];
        for format in [RecipeFormat::Json, RecipeFormat::Yaml, RecipeFormat::Compact] {
            let text = render_recipe(&entries, format).unwrap();
            let back = parse_recipe_as(&text, format).unwrap();
            assert_eq!(back, entries, "format {:?}", format);
        }
    }

    #[test]
    fn test_sniff() {
        assert_eq!(RecipeFormat::sniff("  [ ]"), RecipeFormat::Json);
        assert_eq!(RecipeFormat::sniff("From_Base64('A-Za-z0-9+/=',true)"), RecipeFormat::Compact);
        assert_eq!(RecipeFormat::sniff("- op: Reverse"), RecipeFormat::Yaml);
    }

    #[test]
    fn test_recipe_schema_describes_entries() {
        let schema = recipe_schema();
        let text = schema.to_string();
        assert!(text.contains("RecipeEntry"));
        assert!(text.contains("breakpoint"));
    }
}
