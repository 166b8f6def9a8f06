//! Benchmarks for flat index search and end-to-end recommendation.
//!
//! Uses 500 synthetic courses by default. Set `BENCH_FULL_SCALE=1` to run
//! against 10,000 courses:
//!
//! ```bash
//! BENCH_FULL_SCALE=1 cargo bench -p coursematch-vector
//! ```

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use coursematch_core::corpus::CorpusStore;
use coursematch_core::types::{CourseRecord, IndexEntry, Metric};
use coursematch_vector::embedding::{EmbeddingProvider, MockEmbedding};
use coursematch_vector::index::{FlatIndex, VectorIndex};
use coursematch_vector::{Recommender, TextEmbedder};

const MODEL: &str = "bench-model";
const CI_COURSE_COUNT: usize = 500;
const FULL_SCALE_COURSE_COUNT: usize = 10_000;

const TOPICS: [&str; 6] = [
    "machine learning regression classification gradient boosting",
    "sql joins window functions query planning indexes",
    "neural networks backpropagation convolution transformers",
    "python pandas numpy data cleaning visualization",
    "product analytics retention funnels ab testing metrics",
    "statistics hypothesis testing confidence intervals bayes",
];

fn course_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_COURSE_COUNT
    } else {
        CI_COURSE_COUNT
    }
}

/// Each description is unique so the mock provider gives distinct vectors.
fn course_text(i: usize) -> String {
    format!("{} module {} cohort {}", TOPICS[i % TOPICS.len()], i, i / 7)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

fn build_index(count: usize, metric: Metric, rt: &tokio::runtime::Runtime) -> FlatIndex {
    let provider = MockEmbedding::new();
    let entries = (0..count)
        .map(|i| {
            let vector = rt
                .block_on(provider.embed(&course_text(i), MODEL))
                .expect("embed failed");
            IndexEntry::new(format!("course-{}", i), vector)
        })
        .collect();
    FlatIndex::build(entries, metric).expect("index build failed")
}

fn bench_index_search(c: &mut Criterion) {
    let count = course_count();
    let rt = runtime();
    let query = rt
        .block_on(MockEmbedding::new().embed("learn sql window functions", MODEL))
        .expect("query embed failed");

    let mut group = c.benchmark_group("flat_index");
    group.measurement_time(Duration::from_secs(5));

    for metric in [Metric::SquaredEuclidean, Metric::Cosine] {
        let index = build_index(count, metric, &rt);
        group.bench_function(format!("{}_top1_{}courses", metric, count), |b| {
            b.iter(|| index.search(&query, 1).expect("search failed"))
        });
        group.bench_function(format!("{}_top10_{}courses", metric, count), |b| {
            b.iter(|| index.search(&query, 10).expect("search failed"))
        });
    }

    group.finish();
}

fn bench_recommend(c: &mut Criterion) {
    let count = course_count();
    let rt = runtime();

    let records = (0..count)
        .map(|i| CourseRecord::new(format!("course-{}", i), format!("Course {}", i), course_text(i)))
        .collect();
    let corpus = CorpusStore::new(records).expect("corpus");
    let recommender = Recommender::new(TextEmbedder::new(MockEmbedding::new()));
    rt.block_on(recommender.build(corpus, MODEL))
        .expect("build failed");

    let mut group = c.benchmark_group("recommender");
    group.measurement_time(Duration::from_secs(5));
    group.bench_function(format!("recommend_{}courses", count), |b| {
        b.iter(|| {
            rt.block_on(recommender.recommend("I want to analyze product funnels"))
                .expect("recommend failed")
        })
    });
    group.finish();
}

criterion_group!(benches, bench_index_search, bench_recommend);
criterion_main!(benches);
