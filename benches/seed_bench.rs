//! Benchmarks for ordering and row synthesis.
//!
//! Tests:
//! - Topological sort over random acyclic schema sets of growing size
//! - Full populate pass (synthesis + reference resolution) per shape
//! - Script rendering of a populated store

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fixture_seeder::config::SeedYamlConfig;
use fixture_seeder::db::{Dialect, NoLookup, SqlScriptWriter};
use fixture_seeder::schema::JsonSchemaValues;
use fixture_seeder::seeder::{self, Plan, SeedOptions};
use schema_gen::{Generator, Shape};
use std::hint::black_box;
use std::io;

fn plan_for(shape: Shape) -> Plan {
    let docs = Generator::new(42, shape).generate();
    Plan::load(&JsonSchemaValues::new(docs), &[]).expect("generated sets are acyclic")
}

/// Benchmark insertion-order computation with varying table counts
fn bench_topo_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("topo_sort");

    for tables in [10, 100, 1_000, 5_000] {
        let shape = Shape {
            tables,
            ..Shape::medium()
        };
        let plan = plan_for(shape);
        group.throughput(Throughput::Elements(tables as u64));
        group.bench_with_input(
            BenchmarkId::new("tables", tables),
            &plan,
            |b, plan| b.iter(|| black_box(plan.graph.topo_sort().map(|o| o.len()))),
        );
    }

    group.finish();
}

/// Benchmark generating and verifying a fixture store
fn bench_synthesize(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesize");
    group.sample_size(20);

    let config = SeedYamlConfig::default();
    for (name, shape) in [("small", Shape::small()), ("medium", Shape::medium())] {
        let plan = plan_for(shape);
        for rows in [10, 100] {
            let options = SeedOptions {
                rows,
                seed: Some(7),
                ..SeedOptions::default()
            };
            group.throughput(Throughput::Elements((rows * shape.tables) as u64));
            group.bench_with_input(
                BenchmarkId::new(name, format!("{}_rows", rows)),
                &options,
                |b, options| {
                    b.iter(|| {
                        let synthesis =
                            seeder::synthesize(&plan, options, &config, &mut NoLookup).unwrap();
                        black_box(synthesis.store.total_rows())
                    })
                },
            );
        }
    }

    group.finish();
}

/// Benchmark rendering a store to INSERT statements
fn bench_script_writer(c: &mut Criterion) {
    let mut group = c.benchmark_group("script_writer");

    let config = SeedYamlConfig::default();
    let plan = plan_for(Shape::medium());
    let options = SeedOptions {
        rows: 100,
        seed: Some(7),
        ..SeedOptions::default()
    };
    let synthesis = seeder::synthesize(&plan, &options, &config, &mut NoLookup).unwrap();
    group.throughput(Throughput::Elements(synthesis.store.total_rows() as u64));

    for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite] {
        group.bench_with_input(
            BenchmarkId::new("dialect", dialect),
            &dialect,
            |b, &dialect| {
                b.iter(|| {
                    let mut script = SqlScriptWriter::new(io::sink(), dialect);
                    let report = seeder::write(&plan, &synthesis, &options, &mut script).unwrap();
                    black_box(report.flush.inserted())
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_topo_sort, bench_synthesize, bench_script_writer);
criterion_main!(benches);
