//! Execution engine: run a recipe against an input dish.
//!
//! Per enabled step: resolve arguments, coerce the dish into the step's
//! input kind, invoke the transform and adopt its output. Recoverable
//! operation errors become the step's text output and the run continues.
//! Argument, conversion and fatal operation errors stop the run at the
//! failing step.

use super::coercion::{CoercionTable, ConversionOptions};
use super::dish::Dish;
use super::error::OperationError;
use super::recipe::{Recipe, RecipeStep};
use super::types::{
    ErrorKind, ErrorReport, RunEvent, RunMode, RunReport, RunResult, StepRecord, StepStatus,
};
use crate::journal::eventlog::{self, Journal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared cancellation flag, checked between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run settings.
#[derive(Debug, Clone, Default)]
pub struct RunOptions<'a> {
    pub mode: RunMode,
    /// First step to execute. Resuming after `Halted { step, dish }` means
    /// running again from `step + 1` with the halted dish as input.
    pub start_at: usize,
    pub cancel: Option<CancelToken>,
    pub journal: Option<&'a Journal>,
}

/// The engine holds the conversion table and options; runs share nothing
/// else, so one engine can drive many runs concurrently.
#[derive(Debug, Clone)]
pub struct Engine {
    table: CoercionTable,
    conversion: ConversionOptions,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(CoercionTable::standard(), ConversionOptions::default())
    }
}

struct StepFailure {
    kind: ErrorKind,
    message: String,
}

enum StepOutcome {
    Executed(Dish),
    SoftFailed(Dish, String),
}

impl Engine {
    pub fn new(table: CoercionTable, conversion: ConversionOptions) -> Self {
        Self { table, conversion }
    }

    pub fn table(&self) -> &CoercionTable {
        &self.table
    }

    pub fn conversion(&self) -> &ConversionOptions {
        &self.conversion
    }

    /// Run `recipe` on `input`.
    pub fn run(&self, recipe: &Recipe, input: Dish, mode: RunMode) -> RunResult {
        let options = RunOptions {
            mode,
            ..RunOptions::default()
        };
        self.execute(recipe, input, &options).result
    }

    /// Run `recipe` on `input`, returning the result with per-step records.
    pub fn execute(&self, recipe: &Recipe, input: Dish, options: &RunOptions) -> RunReport {
        let run_id = eventlog::generate_run_id();
        let start = Instant::now();
        let mut records = Vec::with_capacity(recipe.len());

        log::info!(
            "run {}: {} step(s) from step {}, input {} ({} bytes)",
            run_id,
            recipe.len(),
            options.start_at,
            input.kind(),
            input.size()
        );
        record_event(
            options.journal,
            RunEvent::RunStarted {
                run_id: run_id.clone(),
                steps: recipe.len(),
                input_kind: input.kind(),
                input_hash: input.fingerprint(),
                bakery_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        );

        let mut current = input;

        for (index, step) in recipe.steps.iter().enumerate().skip(options.start_at) {
            let name = step.name().to_string();

            if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                let failure = StepFailure {
                    kind: ErrorKind::Cancelled,
                    message: "run cancelled".to_string(),
                };
                return self.fail(run_id, index, name, failure, records, start, options);
            }

            if step.disabled {
                log::debug!("step {} ({}): disabled, skipped", index, name);
                records.push(StepRecord {
                    index,
                    operation: name.clone(),
                    status: StepStatus::Skipped,
                    duration: std::time::Duration::ZERO,
                    output_kind: None,
                });
                record_event(
                    options.journal,
                    RunEvent::StepSkipped {
                        run_id: run_id.clone(),
                        step: index,
                        operation: name,
                    },
                );
                continue;
            }

            let step_start = Instant::now();
            match self.run_step(step, current) {
                Ok(StepOutcome::Executed(dish)) => {
                    let duration = step_start.elapsed();
                    log::debug!(
                        "step {} ({}): {} in {:.3}s",
                        index,
                        name,
                        dish.kind(),
                        duration.as_secs_f64()
                    );
                    record_event(
                        options.journal,
                        RunEvent::StepCompleted {
                            run_id: run_id.clone(),
                            step: index,
                            operation: name.clone(),
                            duration_seconds: duration.as_secs_f64(),
                            output_kind: dish.kind(),
                            hash: dish.fingerprint(),
                        },
                    );
                    records.push(StepRecord {
                        index,
                        operation: name,
                        status: StepStatus::Executed,
                        duration,
                        output_kind: Some(dish.kind()),
                    });
                    current = dish;
                }
                Ok(StepOutcome::SoftFailed(dish, message)) => {
                    log::warn!("step {} ({}): {}", index, name, message);
                    record_event(
                        options.journal,
                        RunEvent::StepSoftFailed {
                            run_id: run_id.clone(),
                            step: index,
                            operation: name.clone(),
                            message,
                        },
                    );
                    records.push(StepRecord {
                        index,
                        operation: name,
                        status: StepStatus::SoftFailed,
                        duration: step_start.elapsed(),
                        output_kind: Some(dish.kind()),
                    });
                    current = dish;
                }
                Err(failure) => {
                    records.push(StepRecord {
                        index,
                        operation: name.clone(),
                        status: StepStatus::Failed,
                        duration: step_start.elapsed(),
                        output_kind: None,
                    });
                    return self.fail(run_id, index, name, failure, records, start, options);
                }
            }

            if step.breakpoint && options.mode == RunMode::Interactive {
                log::info!("run {}: halted at breakpoint, step {}", run_id, index);
                record_event(
                    options.journal,
                    RunEvent::RunHalted {
                        run_id: run_id.clone(),
                        step: index,
                        output_hash: current.fingerprint(),
                    },
                );
                return RunReport {
                    run_id,
                    result: RunResult::Halted {
                        step: index,
                        dish: current,
                    },
                    steps: records,
                    total_duration: start.elapsed(),
                };
            }
        }

        let total_duration = start.elapsed();
        let report = RunReport {
            run_id: run_id.clone(),
            result: RunResult::Completed(current),
            steps: records,
            total_duration,
        };
        if let RunResult::Completed(dish) = &report.result {
            log::info!(
                "run {}: completed, {} ({} bytes), {} soft failure(s), {:.3}s",
                run_id,
                dish.kind(),
                dish.size(),
                report.soft_failures(),
                total_duration.as_secs_f64()
            );
            record_event(
                options.journal,
                RunEvent::RunCompleted {
                    run_id,
                    output_kind: dish.kind(),
                    output_hash: dish.fingerprint(),
                    soft_failures: report.soft_failures(),
                    total_seconds: total_duration.as_secs_f64(),
                },
            );
        }
        report
    }

    fn run_step(&self, step: &RecipeStep, dish: Dish) -> Result<StepOutcome, StepFailure> {
        let op = &step.op;

        let args = step.resolve().map_err(|e| StepFailure {
            kind: ErrorKind::Argument,
            message: e.to_string(),
        })?;

        let input = dish
            .into_kind(op.input, &self.table, &self.conversion)
            .map_err(|e| StepFailure {
                kind: ErrorKind::TypeConversion,
                message: e.to_string(),
            })?;

        match op.transform(input.value(), &args) {
            Ok(value) if value.kind() == op.output => Ok(StepOutcome::Executed(Dish::new(value))),
            Ok(value) => Err(StepFailure {
                kind: ErrorKind::OperationFatal,
                message: format!(
                    "operation returned {} but declares {} output",
                    value.kind(),
                    op.output
                ),
            }),
            Err(OperationError::Recoverable(message)) => Ok(StepOutcome::SoftFailed(
                Dish::from_text(message.clone()),
                message,
            )),
            Err(OperationError::Fatal(message)) => Err(StepFailure {
                kind: ErrorKind::OperationFatal,
                message,
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fail(
        &self,
        run_id: String,
        step: usize,
        operation: String,
        failure: StepFailure,
        steps: Vec<StepRecord>,
        start: Instant,
        options: &RunOptions,
    ) -> RunReport {
        let report = ErrorReport {
            step,
            operation,
            kind: failure.kind,
            message: failure.message,
        };
        log::error!("run {}: {}", run_id, report);
        record_event(
            options.journal,
            RunEvent::RunFailed {
                run_id: run_id.clone(),
                step,
                error: report.to_string(),
            },
        );
        RunReport {
            run_id,
            result: RunResult::Failed { step, report },
            steps,
            total_duration: start.elapsed(),
        }
    }
}

/// Journal write failures never fail the run.
fn record_event(journal: Option<&Journal>, event: RunEvent) {
    if let Some(journal) = journal {
        if let Err(e) = journal.append(event) {
            log::warn!("journal {}: {}", journal.path().display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::recipe::RecipeEntry;
    use crate::core::registry::{OperationDescriptor, OperationRegistry};
    use crate::core::types::{ArgumentSpec, DataKind, Value};
    use proptest::prelude::*;

    fn builtin(entries: Vec<RecipeEntry>) -> Recipe {
        Recipe::from_entries(&entries, &OperationRegistry::with_builtins()).unwrap()
    }

    fn step(op: OperationDescriptor) -> RecipeStep {
        RecipeStep::new(Arc::new(op), vec![])
    }

    fn text_to_number() -> OperationDescriptor {
        OperationDescriptor::new("Count", "Test", DataKind::Text, DataKind::Number, |v, _| {
            Ok(Value::Number(v.as_text()?.chars().count() as f64))
        })
    }

    fn number_to_text() -> OperationDescriptor {
        OperationDescriptor::new("Show", "Test", DataKind::Number, DataKind::Text, |v, _| {
            Ok(Value::Text(format!("n={}", v.as_number()?)))
        })
    }

    fn always(error: OperationError) -> OperationDescriptor {
        OperationDescriptor::new("Fails", "Test", DataKind::Text, DataKind::Text, move |_, _| {
            Err(error.clone())
        })
    }

    fn upper() -> OperationDescriptor {
        OperationDescriptor::new("Upper", "Test", DataKind::Text, DataKind::Text, |v, _| {
            Ok(Value::Text(v.as_text()?.to_uppercase()))
        })
    }

    fn completed_text(result: &RunResult) -> String {
        match result {
            RunResult::Completed(dish) => match dish.value() {
                Value::Text(s) => s.clone(),
                other => panic!("expected text, got {:?}", other),
            },
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn test_to_hex_with_space_delimiter() {
        let recipe = builtin(vec![RecipeEntry::new("To Hex", vec!["Space".into()])]);
        let input = Dish::new(Value::Bytes(vec![72, 101, 108, 108, 111]));
        let report = Engine::default().execute(&recipe, input, &RunOptions::default());
        assert_eq!(completed_text(&report.result), "48 65 6c 6c 6f");
        assert_eq!(report.steps.len(), 1);

        let coerced = Engine::default().run(&recipe, Dish::from_text("Hello"), RunMode::Batch);
        assert_eq!(completed_text(&coerced), "48 65 6c 6c 6f");
    }

    #[test]
    fn test_from_hex_invalid_input_completes_with_diagnostic() {
        let recipe = builtin(vec![RecipeEntry::new("From Hex", vec!["Auto".into()])]);
        let result = Engine::default().run(&recipe, Dish::from_text("zz"), RunMode::Batch);
        let text = completed_text(&result);
        assert!(!text.is_empty());
        assert!(text.to_lowercase().contains("hex"));
    }

    #[test]
    fn test_text_number_text_chain() {
        let recipe = Recipe::default()
            .then(step(text_to_number()))
            .then(step(number_to_text()));
        let result = Engine::default().run(&recipe, Dish::from_text("abc"), RunMode::Batch);
        assert_eq!(completed_text(&result), "n=3");
    }

    #[test]
    fn test_disabled_step_between_is_identical() {
        let plain = Recipe::default()
            .then(step(text_to_number()))
            .then(step(number_to_text()));
        let with_disabled = Recipe::default()
            .then(step(text_to_number()))
            .then(step(upper()).disabled(true))
            .then(step(number_to_text()));
        let engine = Engine::default();
        let a = engine.run(&plain, Dish::from_text("abcd"), RunMode::Batch);
        let b = engine.run(&with_disabled, Dish::from_text("abcd"), RunMode::Batch);
        assert_eq!(a, b);
    }

    #[test]
    fn test_disabled_step_is_never_resolved() {
        // Invalid arguments on a disabled step must not fail the run.
        let op = upper().arg(ArgumentSpec::boolean("Flag", false));
        let bad = RecipeStep::new(Arc::new(op), vec![true.into(), true.into()]).disabled(true);
        let recipe = Recipe::default().then(bad);
        let report = Engine::default().execute(&recipe, Dish::from_text("x"), &RunOptions::default());
        assert!(report.result.is_completed());
        assert_eq!(report.steps[0].status, StepStatus::Skipped);
    }

    #[test]
    fn test_fail_soft_continues() {
        let recipe = Recipe::default()
            .then(step(always(OperationError::invalid_input("bad input"))))
            .then(step(upper()));
        let report = Engine::default().execute(&recipe, Dish::from_text("x"), &RunOptions::default());
        assert_eq!(completed_text(&report.result), "BAD INPUT");
        assert_eq!(report.steps[0].status, StepStatus::SoftFailed);
        assert_eq!(report.steps[1].status, StepStatus::Executed);
        assert_eq!(report.soft_failures(), 1);
    }

    #[test]
    fn test_fatal_operation_error_fails_run() {
        let recipe = Recipe::default()
            .then(step(upper()))
            .then(step(always(OperationError::fatal("boom"))))
            .then(step(upper()));
        let result = Engine::default().run(&recipe, Dish::from_text("x"), RunMode::Batch);
        match result {
            RunResult::Failed { step, report } => {
                assert_eq!(step, 1);
                assert_eq!(report.kind, ErrorKind::OperationFatal);
                assert_eq!(report.operation, "Fails");
                assert_eq!(report.message, "boom");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_argument_error_fails_at_step() {
        let recipe = builtin(vec![
            RecipeEntry::new("Reverse", vec![]),
            RecipeEntry::new("To Hex", vec!["Tab".into()]),
        ]);
        let result = Engine::default().run(&recipe, Dish::from_text("x"), RunMode::Batch);
        assert!(matches!(
            result,
            RunResult::Failed { step: 1, ref report } if report.kind == ErrorKind::Argument
        ));
    }

    #[test]
    fn test_conversion_error_fails_run() {
        let recipe = Recipe::default().then(step(number_to_text()));
        let result = Engine::default().run(&recipe, Dish::from_text("not a number"), RunMode::Batch);
        assert!(matches!(
            result,
            RunResult::Failed { step: 0, ref report } if report.kind == ErrorKind::TypeConversion
        ));
    }

    #[test]
    fn test_wrong_output_kind_is_fatal() {
        let liar = OperationDescriptor::new("Liar", "Test", DataKind::Text, DataKind::Json, |v, _| {
            Ok(v.clone())
        });
        let recipe = Recipe::default().then(step(liar));
        let result = Engine::default().run(&recipe, Dish::from_text("{}"), RunMode::Batch);
        match result {
            RunResult::Failed { report, .. } => {
                assert_eq!(report.kind, ErrorKind::OperationFatal);
                assert!(report.message.contains("declares json"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_breakpoint_halts_interactive_only() {
        let recipe = Recipe::default()
            .then(step(text_to_number()).breakpoint(true))
            .then(step(number_to_text()));
        let engine = Engine::default();

        let batch = engine.run(&recipe, Dish::from_text("ab"), RunMode::Batch);
        assert_eq!(completed_text(&batch), "n=2");

        let halted = engine.run(&recipe, Dish::from_text("ab"), RunMode::Interactive);
        let RunResult::Halted { step, dish } = halted else {
            panic!("expected halt");
        };
        assert_eq!(step, 0);
        assert_eq!(dish.value(), &Value::Number(2.0));

        let resumed = engine.execute(
            &recipe,
            dish,
            &RunOptions {
                mode: RunMode::Interactive,
                start_at: step + 1,
                ..RunOptions::default()
            },
        );
        assert_eq!(completed_text(&resumed.result), "n=2");
        assert_eq!(resumed.steps.len(), 1);
    }

    #[test]
    fn test_cancelled_before_first_step() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let recipe = Recipe::default().then(step(upper()));
        let report = Engine::default().execute(
            &recipe,
            Dish::from_text("x"),
            &RunOptions {
                cancel: Some(cancel),
                ..RunOptions::default()
            },
        );
        assert!(matches!(
            report.result,
            RunResult::Failed { step: 0, ref report } if report.kind == ErrorKind::Cancelled
        ));
    }

    #[test]
    fn test_empty_recipe_returns_input() {
        let result = Engine::default().run(&Recipe::default(), Dish::from_bytes(vec![1, 2]), RunMode::Batch);
        assert_eq!(result, RunResult::Completed(Dish::from_bytes(vec![1, 2])));
    }

    #[test]
    fn test_journal_records_run() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path(), "test");
        let recipe = Recipe::default()
            .then(step(upper()))
            .then(step(upper()).disabled(true))
            .then(step(always(OperationError::invalid_input("nope"))));
        let report = Engine::default().execute(
            &recipe,
            Dish::from_text("x"),
            &RunOptions {
                journal: Some(&journal),
                ..RunOptions::default()
            },
        );
        assert!(report.result.is_completed());

        let events = journal.read_events().unwrap();
        let names: Vec<String> = events
            .iter()
            .map(|e| {
                serde_json::to_value(&e.event).unwrap()["event"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "run_started",
                "step_completed",
                "step_skipped",
                "step_soft_failed",
                "run_completed"
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_deterministic_runs_agree(input in ".{0,64}") {
            let recipe = builtin(vec![
                RecipeEntry::new("To Base64", vec![]),
                RecipeEntry::new("To Hex", vec!["Colon".into()]),
                RecipeEntry::new("SHA2", vec!["256".into()]),
            ]);
            let engine = Engine::default();
            let a = engine.run(&recipe, Dish::from_text(input.clone()), RunMode::Batch);
            let b = engine.run(&recipe, Dish::from_text(input), RunMode::Batch);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_disabled_step_is_noop(input in ".{0,32}", position in 0usize..3) {
            let mut entries = vec![
                RecipeEntry::new("To Upper case", vec![]),
                RecipeEntry::new("Reverse", vec![]),
                RecipeEntry::new("To Hex", vec![]),
            ];
            let baseline = builtin(entries.clone());
            let mut disabled = RecipeEntry::new("To Base64", vec![]);
            disabled.disabled = true;
            entries.insert(position, disabled);
            let engine = Engine::default();
            let a = engine.run(&baseline, Dish::from_text(input.clone()), RunMode::Batch);
            let b = engine.run(&builtin(entries), Dish::from_text(input), RunMode::Batch);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_fail_soft_output_is_diagnostic_text(input in "[g-z]{1,16}") {
            // Letters outside [0-9a-f] are never valid hex.
            let recipe = builtin(vec![
                RecipeEntry::new("From Hex", vec!["Auto".into()]),
                RecipeEntry::new("To Upper case", vec![]),
            ]);
            let report = Engine::default().execute(&recipe, Dish::from_text(input), &RunOptions::default());
            prop_assert!(report.result.is_completed());
            prop_assert_eq!(report.steps[0].status, StepStatus::SoftFailed);
            prop_assert_eq!(report.steps[1].status, StepStatus::Executed);
        }
    }
}
