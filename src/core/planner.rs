//! Pre-run planning: walk the recipe statically, resolve every enabled
//! step's arguments and find the coercion route into each step.
//!
//! The plan assumes every step succeeds. A fail-soft step yields text at
//! run time, so the route after it may differ from the planned one.

use super::coercion::{CoercionTable, Route};
use super::recipe::Recipe;
use super::types::DataKind;
use std::fmt;

/// A problem found before running, tied to its step.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub step: usize,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {}: {}", self.step, self.message)
    }
}

/// What the engine will do at a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Run(Route),
    Skip,
    /// No route from the incoming kind into the step's input kind.
    Unroutable,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run(route) => write!(f, "run ({})", route),
            Self::Skip => write!(f, "skip"),
            Self::Unroutable => write!(f, "unroutable"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub index: usize,
    pub operation: String,
    /// Kind arriving at the step.
    pub incoming: DataKind,
    pub input: DataKind,
    pub output: DataKind,
    pub action: PlanAction,
    pub breakpoint: bool,
}

#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub input_kind: DataKind,
    pub output_kind: DataKind,
    pub steps: Vec<PlannedStep>,
    pub errors: Vec<ValidationError>,
    pub to_run: usize,
    pub skipped: usize,
}

impl ExecutionPlan {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Build the plan for running `recipe` on an input of `input_kind`.
pub fn plan(recipe: &Recipe, input_kind: DataKind, table: &CoercionTable) -> ExecutionPlan {
    let mut steps = Vec::with_capacity(recipe.len());
    let mut errors = Vec::new();
    let mut current = input_kind;
    let mut to_run = 0;
    let mut skipped = 0;

    for (index, step) in recipe.steps.iter().enumerate() {
        let op = &step.op;
        let incoming = current;

        let action = if step.disabled {
            skipped += 1;
            PlanAction::Skip
        } else {
            to_run += 1;
            if let Err(e) = step.resolve() {
                errors.push(ValidationError {
                    step: index,
                    message: format!("{}: {}", op.name, e),
                });
            }
            match table.route(current, op.input) {
                Some(route) => PlanAction::Run(route),
                None => {
                    errors.push(ValidationError {
                        step: index,
                        message: format!(
                            "{}: no conversion from {} to {}",
                            op.name, current, op.input
                        ),
                    });
                    PlanAction::Unroutable
                }
            }
        };

        if action != PlanAction::Skip {
            current = op.output;
        }

        steps.push(PlannedStep {
            index,
            operation: op.name.clone(),
            incoming,
            input: op.input,
            output: op.output,
            action,
            breakpoint: step.breakpoint,
        });
    }

    ExecutionPlan {
        input_kind,
        output_kind: current,
        steps,
        errors,
        to_run,
        skipped,
    }
}

/// Validation errors only. Empty means the recipe is runnable.
pub fn validate_recipe(
    recipe: &Recipe,
    input_kind: DataKind,
    table: &CoercionTable,
) -> Vec<ValidationError> {
    plan(recipe, input_kind, table).errors
}

/// Validation errors for a run resumed at `start_at`, where the input of
/// kind `input_kind` arrives at that step. Step indices stay absolute.
pub fn validate_from(
    recipe: &Recipe,
    start_at: usize,
    input_kind: DataKind,
    table: &CoercionTable,
) -> Vec<ValidationError> {
    let tail = Recipe::new(recipe.steps.iter().skip(start_at).cloned().collect());
    plan(&tail, input_kind, table)
        .errors
        .into_iter()
        .map(|e| ValidationError {
            step: e.step + start_at,
            message: e.message,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::recipe::{RecipeEntry, RecipeStep};
    use crate::core::registry::{OperationDescriptor, OperationRegistry};
    use std::sync::Arc;

    fn recipe(entries: Vec<RecipeEntry>) -> Recipe {
        Recipe::from_entries(&entries, &OperationRegistry::with_builtins()).unwrap()
    }

    #[test]
    fn test_plan_routes() {
        let r = recipe(vec![
            RecipeEntry::new("To Hex", vec![]),
            RecipeEntry::new("Length", vec![]),
            RecipeEntry::new("Add", vec![1i64.into()]),
        ]);
        let plan = plan(&r, DataKind::Text, &CoercionTable::standard());
        assert!(plan.is_valid());
        assert_eq!(plan.steps[0].action, PlanAction::Run(Route::Direct));
        assert_eq!(plan.steps[1].action, PlanAction::Run(Route::Identity));
        assert_eq!(plan.output_kind, DataKind::Number);
        assert_eq!(plan.to_run, 3);
    }

    #[test]
    fn test_plan_skips_disabled_without_changing_kind() {
        let mut entries = vec![
            RecipeEntry::new("Length", vec![]),
            RecipeEntry::new("To Hex", vec![]),
        ];
        entries[1].disabled = true;
        let plan = plan(&recipe(entries), DataKind::Text, &CoercionTable::standard());
        assert_eq!(plan.steps[1].action, PlanAction::Skip);
        assert_eq!(plan.output_kind, DataKind::Number);
        assert_eq!(plan.skipped, 1);
    }

    #[test]
    fn test_plan_reports_argument_errors_with_step() {
        let r = recipe(vec![
            RecipeEntry::new("Reverse", vec![]),
            RecipeEntry::new("To Hex", vec!["Tab".into()]),
        ]);
        let errors = validate_recipe(&r, DataKind::Text, &CoercionTable::standard());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].step, 1);
        assert!(errors[0].to_string().starts_with("step 1: To Hex"));
    }

    #[test]
    fn test_plan_disabled_step_args_not_checked() {
        let mut entries = vec![RecipeEntry::new("To Hex", vec!["Tab".into()])];
        entries[0].disabled = true;
        assert!(validate_recipe(&recipe(entries), DataKind::Text, &CoercionTable::standard()).is_empty());
    }

    #[test]
    fn test_validate_from_ignores_earlier_steps() {
        let r = recipe(vec![
            RecipeEntry::new("To Hex", vec!["Tab".into()]),
            RecipeEntry::new("Reverse", vec![]),
            RecipeEntry::new("To Hex", vec!["Tab".into()]),
        ]);
        let table = CoercionTable::standard();
        assert_eq!(validate_from(&r, 0, DataKind::Text, &table).len(), 2);

        let errors = validate_from(&r, 1, DataKind::Text, &table);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].step, 2);
        assert!(validate_from(&r, 3, DataKind::Text, &table).is_empty());
    }

    #[test]
    fn test_plan_unroutable() {
        let op = OperationDescriptor::new("Sum", "Test", DataKind::Number, DataKind::Number, |v, _| {
            Ok(v.clone())
        });
        let r = Recipe::default().then(RecipeStep::new(Arc::new(op), vec![]));
        let plan = plan(&r, DataKind::Parts, &CoercionTable::empty());
        assert_eq!(plan.steps[0].action, PlanAction::Unroutable);
        assert!(plan.errors[0].message.contains("no conversion from parts to number"));
    }
}
