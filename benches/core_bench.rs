//! Benchmarks for bakery core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use bakery::core::coercion::{CoercionTable, ConversionOptions};
use bakery::core::dish::Dish;
use bakery::core::executor::Engine;
use bakery::core::recipe::{self, Recipe};
use bakery::core::registry::OperationRegistry;
use bakery::core::resolver;
use bakery::core::types::{DataKind, RawArgument, RunMode, Value};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const RECIPE: &str = r#"[
  {"op": "To Base64", "args": ["A-Za-z0-9+/="]},
  {"op": "From Base64", "args": ["A-Za-z0-9+/=", true]},
  {"op": "To Hex", "args": ["Space", 0]},
  {"op": "From Hex", "args": ["Auto"]},
  {"op": "SHA2", "args": ["256"]}
]"#;

fn bench_engine_run(c: &mut Criterion) {
    let registry = OperationRegistry::with_builtins();
    let entries = recipe::parse_recipe(RECIPE).unwrap();
    let recipe = Recipe::from_entries(&entries, &registry).unwrap();
    let engine = Engine::default();

    let mut group = c.benchmark_group("engine_run");
    for size in [64, 1024, 16384] {
        let input = vec![0xABu8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| {
                let result = engine.run(
                    black_box(&recipe),
                    Dish::from_bytes(input.clone()),
                    RunMode::Batch,
                );
                black_box(result);
            });
        });
    }
    group.finish();
}

fn bench_coercion(c: &mut Criterion) {
    let table = CoercionTable::standard();
    let options = ConversionOptions::default();
    let json = Value::Json(serde_json::json!({
        "name": "bench",
        "items": (0..64).collect::<Vec<_>>(),
        "nested": {"a": 1, "b": [true, false, null]}
    }));
    let bytes = Value::Bytes("héllo wörld ".repeat(256).into_bytes());

    c.bench_function("coerce_json_to_bytes", |b| {
        b.iter(|| black_box(table.convert(black_box(&json), DataKind::Bytes, &options).unwrap()));
    });
    c.bench_function("coerce_bytes_to_text", |b| {
        b.iter(|| black_box(table.convert(black_box(&bytes), DataKind::Text, &options).unwrap()));
    });
}

fn bench_resolve_args(c: &mut Criterion) {
    let registry = OperationRegistry::with_builtins();
    let op = registry.lookup("Regular expression").unwrap();
    let raw: Vec<RawArgument> = vec!["Email address".into()];

    c.bench_function("resolve_regex_args", |b| {
        b.iter(|| black_box(resolver::resolve_args(&op.args, black_box(&raw)).unwrap()));
    });
}

fn bench_recipe_parse(c: &mut Criterion) {
    let compact = "To_Base64('A-Za-z0-9+/=')From_Base64('A-Za-z0-9+/=',true)\
                   To_Hex('Space',0)From_Hex('Auto')SHA2('256')";

    c.bench_function("parse_recipe_json", |b| {
        b.iter(|| black_box(recipe::parse_recipe(black_box(RECIPE)).unwrap()));
    });
    c.bench_function("parse_recipe_compact", |b| {
        b.iter(|| black_box(recipe::parse_recipe(black_box(compact)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_engine_run,
    bench_coercion,
    bench_resolve_args,
    bench_recipe_parse
);
criterion_main!(benches);
