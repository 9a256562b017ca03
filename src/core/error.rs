//! Error taxonomy for argument resolution, coercion, operations and recipes.

use super::types::DataKind;
use thiserror::Error;

/// A raw argument could not be resolved against its schema entry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    #[error("expected at most {expected} argument(s), got {got}")]
    Arity { expected: usize, got: usize },

    #[error("argument {index} ({name}): expected {expected}, got {got}")]
    Type {
        index: usize,
        name: String,
        expected: &'static str,
        got: String,
    },

    #[error("argument {index} ({name}): '{value}' is not a number")]
    NotANumber {
        index: usize,
        name: String,
        value: String,
    },

    #[error("argument {index} ({name}): {value} is outside {}", fmt_range(.min, .max))]
    OutOfRange {
        index: usize,
        name: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },

    #[error("argument {index} ({name}): '{value}' must be one of: {}", .choices.join(", "))]
    NotAChoice {
        index: usize,
        name: String,
        value: String,
        choices: Vec<String>,
    },

    #[error("argument {index} ({name}): unknown label '{label}'")]
    UnknownLabel {
        index: usize,
        name: String,
        label: String,
    },

    #[error("argument {index} ({name}): {reason}")]
    Malformed {
        index: usize,
        name: String,
        reason: String,
    },
}

impl ArgumentError {
    /// Schema index of the offending argument, if the error concerns one.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Arity { .. } => None,
            Self::Type { index, .. }
            | Self::NotANumber { index, .. }
            | Self::OutOfRange { index, .. }
            | Self::NotAChoice { index, .. }
            | Self::UnknownLabel { index, .. }
            | Self::Malformed { index, .. } => Some(*index),
        }
    }
}

fn fmt_range(min: &Option<f64>, max: &Option<f64>) -> String {
    match (*min, *max) {
        (Some(lo), Some(hi)) => format!("[{}, {}]", lo, hi),
        (Some(lo), None) => format!(">= {}", lo),
        (None, Some(hi)) => format!("<= {}", hi),
        (None, None) => "its range".to_string(),
    }
}

/// No valid conversion between two data kinds for a given value.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot convert {from} to {to}: {reason}")]
pub struct TypeConversionError {
    pub from: DataKind,
    pub to: DataKind,
    pub reason: String,
}

impl TypeConversionError {
    pub fn new(from: DataKind, to: DataKind, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
        }
    }
}

/// Failure signalled by an operation's transform.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    /// The input is invalid for the algorithm; the message is shown to the
    /// user in place of the step's output.
    #[error("{0}")]
    Recoverable(String),

    /// An internal failure; aborts the run.
    #[error("internal error: {0}")]
    Fatal(String),
}

impl OperationError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::Recoverable(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }
}

/// Registration rejected by the operation registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("operation '{0}' is already registered")]
    Duplicate(String),

    #[error("operation '{op}' has an invalid argument schema: {reason}")]
    InvalidSchema { op: String, reason: String },
}

/// A recipe could not be loaded or built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecipeError {
    #[error("cannot read recipe {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("recipe parse error: {0}")]
    Parse(String),

    #[error("step {step}: unknown operation '{name}'")]
    UnknownOperation { step: usize, name: String },

    #[error("step {step} ({op}): {source}")]
    Argument {
        step: usize,
        op: String,
        #[source]
        source: ArgumentError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = ArgumentError::OutOfRange {
            index: 1,
            name: "Width".into(),
            value: 300.0,
            min: Some(0.0),
            max: Some(255.0),
        };
        assert_eq!(
            err.to_string(),
            "argument 1 (Width): 300 is outside [0, 255]"
        );
        assert_eq!(err.index(), Some(1));
    }

    #[test]
    fn test_not_a_choice_lists_choices() {
        let err = ArgumentError::NotAChoice {
            index: 0,
            name: "Delimiter".into(),
            value: "Tab".into(),
            choices: vec!["Space".into(), "Comma".into()],
        };
        assert!(err.to_string().ends_with("must be one of: Space, Comma"));
    }

    #[test]
    fn test_conversion_error_names_kinds() {
        let err = TypeConversionError::new(DataKind::Bytes, DataKind::Json, "invalid JSON");
        assert_eq!(err.to_string(), "cannot convert bytes to json: invalid JSON");
    }

    #[test]
    fn test_operation_error_kinds() {
        assert!(OperationError::invalid_input("bad hex").is_recoverable());
        assert!(!OperationError::fatal("oops").is_recoverable());
        assert_eq!(
            OperationError::fatal("oops").to_string(),
            "internal error: oops"
        );
    }

    #[test]
    fn test_recipe_error_wraps_argument_error() {
        let err = RecipeError::Argument {
            step: 2,
            op: "To Hex".into(),
            source: ArgumentError::Arity {
                expected: 2,
                got: 3,
            },
        };
        assert_eq!(
            err.to_string(),
            "step 2 (To Hex): expected at most 2 argument(s), got 3"
        );
    }
}
