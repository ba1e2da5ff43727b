//! Array join benchmarks.
//!
//! Measures `array_join(array, ',')` over a page of 100,000 positions, each an
//! array of 10 random bigints. Throughput is reported per joined element.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata::{
    AggregatedMemoryContext, BlockBuilder, DataType, DriverYieldSignal, ExpressionCompiler, Page,
    PageProcessor, ProcessorConfig, RowExpression, Value,
};

const POSITIONS: usize = 100_000;
const ARRAY_SIZE: usize = 10;

fn create_array_page(positions: usize, array_size: usize) -> Page {
    let mut rng = StdRng::seed_from_u64(0);
    let mut builder = BlockBuilder::new(&DataType::array(DataType::Bigint), positions);
    for _ in 0..positions {
        builder.begin_entry().unwrap();
        for _ in 0..array_size {
            builder.write_long(rng.gen()).unwrap();
        }
        builder.close_entry().unwrap();
    }
    Page::new(vec![builder.build().unwrap()]).unwrap()
}

fn create_processor(config: ProcessorConfig) -> PageProcessor {
    let join = RowExpression::call(
        "array_join",
        DataType::Varchar,
        vec![
            RowExpression::field(0, DataType::array(DataType::Bigint)),
            RowExpression::constant(Value::Varchar(",".into()), DataType::Varchar),
        ],
    );
    ExpressionCompiler::default()
        .compile_page_processor(None, &[join], config)
        .unwrap()
}

fn run_to_completion(processor: &PageProcessor, memory: &AggregatedMemoryContext, page: Page) -> usize {
    processor
        .process(DriverYieldSignal::new(), memory.new_local("bench"), page)
        .map(|step| step.unwrap().map_or(0, |page| page.position_count()))
        .sum()
}

/// Benchmark the full page through the processor.
fn bench_array_join(c: &mut Criterion) {
    let page = create_array_page(POSITIONS, ARRAY_SIZE);
    let processor = create_processor(ProcessorConfig::default());
    let memory = AggregatedMemoryContext::new_root("bench");

    let mut group = c.benchmark_group("array_join");
    group.sample_size(10);
    group.throughput(Throughput::Elements((POSITIONS * ARRAY_SIZE) as u64));
    group.bench_function("bigint_100k_x10", |b| {
        b.iter(|| black_box(run_to_completion(&processor, &memory, page.clone())));
    });
    group.finish();
}

/// Benchmark the cost of yield polling at different granularities.
fn bench_yield_interval(c: &mut Criterion) {
    let page = create_array_page(POSITIONS / 10, ARRAY_SIZE);
    let memory = AggregatedMemoryContext::new_root("bench");

    let mut group = c.benchmark_group("array_join_yield_interval");
    group.sample_size(10);
    group.throughput(Throughput::Elements((POSITIONS / 10 * ARRAY_SIZE) as u64));
    for interval in &[1usize, 16, 256, 4096] {
        let processor = create_processor(ProcessorConfig::new().with_yield_check_interval(*interval));
        group.bench_with_input(BenchmarkId::from_parameter(interval), interval, |b, _| {
            b.iter(|| black_box(run_to_completion(&processor, &memory, page.clone())));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_array_join, bench_yield_interval);
criterion_main!(benches);
