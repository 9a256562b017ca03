//! CLI subcommands: bake, validate, plan, ops, convert, schema, history,
//! init, completions.

use crate::core::batch::{self, BatchInput};
use crate::core::coercion::{CoercionTable, TextEncoding};
use crate::core::config::{BakeryConfig, CONFIG_FILE};
use crate::core::dish::Dish;
use crate::core::executor::{Engine, RunOptions};
use crate::core::planner::{self, PlanAction};
use crate::core::recipe::{self, Recipe, RecipeEntry, RecipeFormat};
use crate::core::registry::OperationRegistry;
use crate::core::types::{DataKind, RunEvent, RunMode, RunReport, RunResult};
use crate::journal::eventlog::Journal;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "bakery",
    version,
    about = "Typed recipe engine: chain encode, hash, compress and parse operations"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a bakery project (bakery.toml and a sample recipe)
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Run a recipe over one or more inputs
    Bake(BakeArgs),

    /// Check that a recipe binds to known operations and type-checks
    Validate {
        /// Recipe file (.json, .yaml, .chef)
        #[arg(short, long)]
        recipe: PathBuf,

        /// Kind of the input the recipe will receive
        #[arg(long, default_value = "bytes")]
        input_kind: DataKind,
    },

    /// Show the per-step plan: kinds, conversions, skipped steps
    Plan {
        /// Recipe file (.json, .yaml, .chef)
        #[arg(short, long)]
        recipe: PathBuf,

        /// Kind of the input the recipe will receive
        #[arg(long, default_value = "bytes")]
        input_kind: DataKind,
    },

    /// List available operations
    Ops {
        /// Only operations in this category
        #[arg(short, long)]
        category: Option<String>,

        /// Show the argument schema of one operation
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Convert a recipe between JSON, YAML and compact formats
    Convert {
        /// Recipe file (.json, .yaml, .chef)
        recipe: PathBuf,

        /// Target format: json, yaml, compact
        #[arg(long, default_value = "json")]
        to: RecipeFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the JSON Schema of the persisted recipe format
    Schema,

    /// Show journaled runs of a recipe
    History {
        /// Recipe file whose journal to read
        #[arg(short, long)]
        recipe: PathBuf,

        /// Journal directory (default: from bakery.toml)
        #[arg(long)]
        journal_dir: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug)]
pub struct BakeArgs {
    /// Recipe file (.json, .yaml, .chef)
    #[arg(short, long)]
    pub recipe: PathBuf,

    /// Input files or glob patterns (default: stdin)
    pub inputs: Vec<String>,

    /// Output file, or directory when baking several inputs
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run mode: batch ignores breakpoints, interactive halts on them
    #[arg(long, value_enum, ignore_case = true)]
    pub mode: Option<RunMode>,

    /// Read the input as this kind instead of raw bytes
    #[arg(long, default_value = "bytes")]
    pub input_kind: DataKind,

    /// Text encoding for text/bytes conversions (utf8, latin1)
    #[arg(long)]
    pub encoding: Option<TextEncoding>,

    /// Indentation of JSON rendered as text (0 = compact)
    #[arg(long)]
    pub json_indent: Option<usize>,

    /// Resume from this step (after a breakpoint halt)
    #[arg(long, default_value_t = 0)]
    pub start_at: usize,

    /// Append provenance events to the run journal
    #[arg(long)]
    pub journal: bool,

    /// Print per-step timings to stderr
    #[arg(long)]
    pub timings: bool,

    /// Config file (default: ./bakery.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Bake(args) => cmd_bake(&args),
        Commands::Validate { recipe, input_kind } => cmd_validate(&recipe, input_kind),
        Commands::Plan { recipe, input_kind } => cmd_plan(&recipe, input_kind),
        Commands::Ops { category, name } => cmd_ops(category.as_deref(), name.as_deref()),
        Commands::Convert { recipe, to, output } => cmd_convert(&recipe, to, output.as_deref()),
        Commands::Schema => cmd_schema(),
        Commands::History {
            recipe,
            journal_dir,
        } => cmd_history(&recipe, journal_dir.as_deref()),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "bakery", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join(CONFIG_FILE);
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }
    std::fs::create_dir_all(path).map_err(|e| format!("cannot create {}: {}", path.display(), e))?;

    let config = BakeryConfig::default().to_toml()?;
    std::fs::write(&config_path, config)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    let recipe_path = path.join("recipe.json");
    if !recipe_path.exists() {
        let sample = vec![
            RecipeEntry::new("To Base64", vec!["A-Za-z0-9+/=".into()]),
            RecipeEntry::new("SHA2", vec!["256".into()]),
        ];
        let content = recipe::render_recipe(&sample, RecipeFormat::Json)?;
        std::fs::write(&recipe_path, content)
            .map_err(|e| format!("cannot write {}: {}", recipe_path.display(), e))?;
    }

    println!("Initialized bakery project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}", recipe_path.display());
    Ok(())
}

/// Load a recipe file and bind it against the built-in registry.
fn load_bound_recipe(file: &Path, registry: &OperationRegistry) -> Result<Recipe, String> {
    let entries = recipe::load_recipe(file).map_err(|e| e.to_string())?;
    Recipe::from_entries(&entries, registry).map_err(|e| e.to_string())
}

fn load_config(path: Option<&Path>) -> Result<BakeryConfig, String> {
    match path {
        Some(p) => BakeryConfig::load(p),
        None => BakeryConfig::discover(Path::new(".")),
    }
}

/// Apply command-line overrides on top of the loaded config.
fn effective_config(args: &BakeArgs) -> Result<BakeryConfig, String> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(encoding) = args.encoding {
        config.text_encoding = encoding;
    }
    if let Some(indent) = args.json_indent {
        config.json_indent = indent;
    }
    if args.journal {
        config.journal.enabled = true;
    }
    Ok(config)
}

/// Expand glob patterns into a sorted, de-duplicated file list. A pattern
/// with no glob metacharacters names a file directly.
fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    for pattern in patterns {
        let paths =
            glob::glob(pattern).map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?;
        let mut matched = false;
        for entry in paths {
            let path = entry.map_err(|e| format!("cannot read {}: {}", pattern, e))?;
            if path.is_file() {
                files.push(path);
                matched = true;
            }
        }
        if !matched {
            return Err(format!("no input matches '{}'", pattern));
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn read_stdin() -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .map_err(|e| format!("cannot read stdin: {}", e))?;
    Ok(buf)
}

fn input_dish(bytes: Vec<u8>, kind: DataKind, engine: &Engine) -> Result<Dish, String> {
    Dish::from_bytes(bytes)
        .into_kind(kind, engine.table(), engine.conversion())
        .map_err(|e| format!("cannot read input as {}: {}", kind, e))
}

fn cmd_bake(args: &BakeArgs) -> Result<(), String> {
    let config = effective_config(args)?;
    let registry = OperationRegistry::with_builtins();
    let recipe = load_bound_recipe(&args.recipe, &registry)?;
    let engine = Engine::new(CoercionTable::standard(), config.conversion());
    let errors = planner::validate_from(&recipe, args.start_at, args.input_kind, engine.table());
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        return Err(format!("recipe cannot run: {}", messages.join("; ")));
    }

    let journal = config.journal.enabled.then(|| {
        Journal::new(&config.journal.dir, &journal_name(&args.recipe))
    });
    let options = RunOptions {
        mode: config.mode,
        start_at: args.start_at,
        cancel: None,
        journal: journal.as_ref(),
    };

    let files = expand_inputs(&args.inputs)?;
    if files.len() <= 1 {
        let (name, bytes) = match files.first() {
            Some(path) => (path.display().to_string(), read_file(path)?),
            None => ("<stdin>".to_string(), read_stdin()?),
        };
        let dish = input_dish(bytes, args.input_kind, &engine)?;
        let report = engine.execute(&recipe, dish, &options);
        if args.timings {
            print_timings(&name, &report);
        }
        let out = finish(&name, report, &engine)?;
        return write_output(args.output.as_deref(), &out);
    }

    let inputs = files
        .iter()
        .map(|path| {
            let bytes = read_file(path)?;
            Ok(BatchInput {
                name: path.display().to_string(),
                dish: input_dish(bytes, args.input_kind, &engine)?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    let mut failed = 0;
    let results = batch::bake_all(&engine, &recipe, inputs, &options);
    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
    }
    for ((name, report), path) in results.into_iter().zip(&files) {
        if args.timings {
            print_timings(&name, &report);
        }
        let out = match finish(&name, report, &engine) {
            Ok(out) => out,
            Err(e) => {
                eprintln!("  ERROR: {}", e);
                failed += 1;
                continue;
            }
        };
        match &args.output {
            Some(dir) => {
                let file_name = path.file_name().map(PathBuf::from).unwrap_or_default();
                write_output(Some(dir.join(file_name).as_path()), &out)?;
            }
            None => {
                println!("==> {} <==", name);
                write_output(None, &out)?;
                println!();
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} input(s) failed", failed, files.len()));
    }
    Ok(())
}

fn journal_name(recipe: &Path) -> String {
    recipe
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recipe".to_string())
}

fn read_file(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))
}

/// Turn a run report into output bytes, or an error for failed runs.
fn finish(name: &str, report: RunReport, engine: &Engine) -> Result<Vec<u8>, String> {
    let soft = report.soft_failures();
    let dish = match report.result {
        RunResult::Completed(dish) => dish,
        RunResult::Halted { step, dish } => {
            eprintln!(
                "{}: halted after step {}; resume with --start-at {}",
                name,
                step,
                step + 1
            );
            dish
        }
        RunResult::Failed { report, .. } => return Err(format!("{}: {}", name, report)),
    };
    if soft > 0 {
        eprintln!("{}: {} step(s) reported invalid input", name, soft);
    }
    dish.to_bytes(engine.table(), engine.conversion())
        .map_err(|e| format!("{}: cannot render output: {}", name, e))
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<(), String> {
    match path {
        Some(p) => std::fs::write(p, bytes).map_err(|e| format!("cannot write {}: {}", p.display(), e)),
        None => std::io::stdout()
            .write_all(bytes)
            .map_err(|e| format!("write error: {}", e)),
    }
}

fn print_timings(name: &str, report: &RunReport) {
    eprintln!("{} (run {}):", name, report.run_id);
    for record in &report.steps {
        let kind = record
            .output_kind
            .map(|k| k.to_string())
            .unwrap_or_else(|| "-".to_string());
        eprintln!(
            "  {:>3} {:<24} {:<9} {:<7} {:.3}ms",
            record.index,
            record.operation,
            record.status.to_string(),
            kind,
            record.duration.as_secs_f64() * 1000.0
        );
    }
    eprintln!("  total {:.3}ms", report.total_duration.as_secs_f64() * 1000.0);
}

fn cmd_validate(file: &Path, input_kind: DataKind) -> Result<(), String> {
    let registry = OperationRegistry::with_builtins();
    let recipe = load_bound_recipe(file, &registry)?;
    let engine = Engine::default();
    let errors = planner::validate_recipe(&recipe, input_kind, engine.table());

    if errors.is_empty() {
        let enabled = recipe.steps.iter().filter(|s| !s.disabled).count();
        println!(
            "OK: {} ({} steps, {} enabled)",
            file.display(),
            recipe.len(),
            enabled
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

fn cmd_plan(file: &Path, input_kind: DataKind) -> Result<(), String> {
    let registry = OperationRegistry::with_builtins();
    let recipe = load_bound_recipe(file, &registry)?;
    let engine = Engine::default();
    let plan = planner::plan(&recipe, input_kind, engine.table());

    println!(
        "Planning: {} ({} steps, input {})",
        file.display(),
        plan.steps.len(),
        plan.input_kind
    );
    println!();
    for step in &plan.steps {
        let symbol = match step.action {
            PlanAction::Run(_) => "+",
            PlanAction::Skip => "-",
            PlanAction::Unroutable => "!",
        };
        let pause = if step.breakpoint { " [breakpoint]" } else { "" };
        println!(
            "  {} {:>3} {:<24} {} -> {}  {}{}",
            symbol, step.index, step.operation, step.incoming, step.output, step.action, pause
        );
    }
    for e in &plan.errors {
        eprintln!("  ERROR: {}", e);
    }

    println!();
    println!(
        "Plan: {} to run, {} skipped, output {}.",
        plan.to_run, plan.skipped, plan.output_kind
    );
    if plan.is_valid() {
        Ok(())
    } else {
        Err(format!("{} validation error(s)", plan.errors.len()))
    }
}

fn cmd_ops(category: Option<&str>, name: Option<&str>) -> Result<(), String> {
    let registry = OperationRegistry::with_builtins();

    if let Some(name) = name {
        let op = registry
            .lookup(name)
            .ok_or_else(|| format!("unknown operation: {}", name))?;
        println!("{} [{}]", op.name, op.category);
        println!("  {}", op.description);
        println!("  {} -> {}", op.input, op.output);
        if !op.deterministic {
            println!("  non-deterministic");
        }
        for (i, spec) in op.args.iter().enumerate() {
            let default = serde_json::to_string(&spec.default).unwrap_or_default();
            println!("  {}: {} ({}, default {})", i, spec.name, spec.kind.label(), default);
        }
        return Ok(());
    }

    let categories = match category {
        Some(c) => {
            if registry.list_by_category(c).is_empty() {
                return Err(format!("unknown category: {}", c));
            }
            vec![c.to_string()]
        }
        None => registry.categories(),
    };
    for cat in &categories {
        println!("{}:", cat);
        for op in registry.list_by_category(cat) {
            println!("  {:<24} {} -> {}", op.name, op.input, op.output);
        }
    }
    Ok(())
}

fn cmd_convert(file: &Path, to: RecipeFormat, output: Option<&Path>) -> Result<(), String> {
    let entries = recipe::load_recipe(file).map_err(|e| e.to_string())?;
    let mut rendered = recipe::render_recipe(&entries, to)?;
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    write_output(output, rendered.as_bytes())
}

fn cmd_schema() -> Result<(), String> {
    let schema = serde_json::to_string_pretty(&recipe::recipe_schema())
        .map_err(|e| format!("JSON serialize error: {}", e))?;
    println!("{}", schema);
    Ok(())
}

fn cmd_history(file: &Path, journal_dir: Option<&Path>) -> Result<(), String> {
    let dir = match journal_dir {
        Some(d) => d.to_path_buf(),
        None => load_config(None)?.journal.dir,
    };
    let journal = Journal::new(&dir, &journal_name(file));
    let events = journal.read_events()?;
    if events.is_empty() {
        println!("No runs journaled at {}.", journal.path().display());
        return Ok(());
    }

    for te in &events {
        let line = match &te.event {
            RunEvent::RunStarted {
                run_id,
                steps,
                input_kind,
                ..
            } => format!("{} started ({} steps, input {})", run_id, steps, input_kind),
            RunEvent::StepCompleted {
                step,
                operation,
                output_kind,
                ..
            } => format!("  step {} {} -> {}", step, operation, output_kind),
            RunEvent::StepSoftFailed {
                step,
                operation,
                message,
                ..
            } => format!("  step {} {} SOFT-FAIL: {}", step, operation, message),
            RunEvent::StepSkipped {
                step, operation, ..
            } => format!("  step {} {} skipped", step, operation),
            RunEvent::RunCompleted {
                run_id,
                output_kind,
                output_hash,
                soft_failures,
                total_seconds,
            } => format!(
                "{} completed: {} {} ({} soft failure(s), {:.3}s)",
                run_id, output_kind, output_hash, soft_failures, total_seconds
            ),
            RunEvent::RunHalted { run_id, step, .. } => {
                format!("{} halted after step {}", run_id, step)
            }
            RunEvent::RunFailed {
                run_id,
                step,
                error,
            } => format!("{} FAILED at step {}: {}", run_id, step, error),
        };
        println!("[{}] {}", te.ts, line);
    }
    Ok(())
}
