//! Tree-ensemble batch throughput
//!
//! Measures `Runner::run_batch` for both predict modes at several batch sizes.
//! Run with: `cargo bench -p modelrun-runner`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use modelrun_kernel::{Options, ResourceQuota, Tag};
use modelrun_runner::xgboost::{ARTIFACT_FILE, MODULE, XgboostAdapter};
use modelrun_runner::{Input, PredictMode, Runner, RunnerBuilder};
use modelrun_store::{LocalModelStore, ModelContext, ModelStore, NewModel};
use serde_json::{Value, json};
use std::path::Path;

const FEATURES: u32 = 8;
const TREES: u32 = 100;
const DEPTH: u32 = 4;

/// Complete binary tree of the given depth; node `i` has children `2i+1`, `2i+2`.
fn tree(seed: u32) -> Value {
    let internal = (1u32 << DEPTH) - 1;
    let nodes = (1u32 << (DEPTH + 1)) - 1;
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut split = Vec::new();
    let mut cond = Vec::new();
    for n in 0..nodes {
        if n < internal {
            left.push(json!(2 * n + 1));
            right.push(json!(2 * n + 2));
            split.push(json!((seed + n) % FEATURES));
            cond.push(json!(((seed * 7 + n * 3) % 10) as f32 / 10.0));
        } else {
            left.push(json!(-1));
            right.push(json!(-1));
            split.push(json!(0));
            cond.push(json!(((seed + n) % 5) as f32 / 50.0 - 0.05));
        }
    }
    json!({
        "left_children": left,
        "right_children": right,
        "split_indices": split,
        "split_conditions": cond,
        "default_left": vec![1; nodes as usize],
    })
}

fn model_json() -> Vec<u8> {
    let trees: Vec<Value> = (0..TREES).map(tree).collect();
    serde_json::to_vec(&json!({
        "learner": {
            "gradient_booster": {
                "name": "gbtree",
                "model": {"trees": trees, "tree_info": vec![0; TREES as usize]}
            },
            "learner_model_param": {"base_score": "5E-1", "num_class": "0", "num_feature": FEATURES.to_string()},
            "objective": {"name": "binary:logistic"}
        },
        "version": [1, 7, 6]
    }))
    .unwrap()
}

fn runner(store: &LocalModelStore, mode: PredictMode) -> Runner<XgboostAdapter> {
    let runner = RunnerBuilder::new(Tag::parse("bench").unwrap())
        .resource_quota(ResourceQuota::cpu(4.0).unwrap())
        .predict_mode(mode)
        .build(store, XgboostAdapter::new())
        .unwrap();
    runner.setup().unwrap();
    runner
}

fn rows(n: usize) -> Vec<Vec<f32>> {
    (0..n)
        .map(|i| {
            (0..FEATURES)
                .map(|f| ((i as u32 * 31 + f * 17) % 100) as f32 / 100.0)
                .collect()
        })
        .collect()
}

fn bench_run_batch(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let store = LocalModelStore::new(dir.path()).unwrap();
    let bytes = model_json();
    let model = NewModel::new(
        Tag::parse("bench:v1").unwrap(),
        MODULE,
        ModelContext::new("xgboost", "1.7"),
    );
    store
        .persist(model, &mut |d: &Path| std::fs::write(d.join(ARTIFACT_FILE), &bytes))
        .unwrap();

    let mut group = c.benchmark_group("run_batch");
    for mode in [PredictMode::Standard, PredictMode::InPlace] {
        let runner = runner(&store, mode);
        for size in [1usize, 64, 1024] {
            let batch = rows(size);
            group.throughput(Throughput::Elements(size as u64));
            group.bench_with_input(BenchmarkId::new(mode.to_string(), size), &batch, |b, batch| {
                b.iter(|| {
                    let out = runner.run_batch(Input::Matrix(black_box(batch.clone()))).unwrap();
                    black_box(out);
                });
            });
        }
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let store = LocalModelStore::new(dir.path()).unwrap();
    let bytes = model_json();
    let model = NewModel::new(
        Tag::parse("bench:v1").unwrap(),
        MODULE,
        ModelContext::new("xgboost", "1.7"),
    )
    .with_options(Options::new().with("max_depth", DEPTH as i64));
    store
        .persist(model, &mut |d: &Path| std::fs::write(d.join(ARTIFACT_FILE), &bytes))
        .unwrap();

    c.bench_function("build_runner_latest", |b| {
        b.iter(|| {
            let runner = RunnerBuilder::new(Tag::parse("bench:latest").unwrap())
                .resource_quota(ResourceQuota::cpu(4.0).unwrap())
                .build(&store, XgboostAdapter::new())
                .unwrap();
            black_box(runner.num_concurrency_per_replica());
        });
    });
}

criterion_group!(benches, bench_run_batch, bench_resolve);
criterion_main!(benches);
