//! Benchmarks for document passes.
//!
//! - `run/ready`: every reactive node resolves immediately.
//! - `run/chain`: each node defers on the next one, so resolution takes one
//!   sweep per link.
//! - `run/steady`: repeated passes over an unchanged document.
//!
//! Run with: cargo bench -p arbor-reactive --bench document_bench

use arbor_model::{Node, Value, json};
use arbor_reactive::{DocumentComputation, DocumentConfig, NodeTypeSpec, Reaction, Schema};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

const SIZES: &[usize] = &[10, 100, 1_000];

fn schema() -> Schema {
    Schema::builder()
        .node(NodeTypeSpec::new("doc"))
        .node(NodeTypeSpec::new("paragraph"))
        .node(NodeTypeSpec::new("text"))
        .node(
            NodeTypeSpec::new("counter")
                .reactive()
                .attrs(["id", "step"])
                .reactive_attr("count", |node, hooks| {
                    let (count, _) = hooks.use_state(0_i64)?;
                    Ok(Reaction::ready(count + node.attr_i64("step").unwrap_or(1)))
                }),
        )
        .node(
            NodeTypeSpec::new("link")
                .reactive()
                .attrs(["id", "next"])
                .reactive_attr("depth", |node, hooks| {
                    let Some(next) = node.attr_str("next") else {
                        return Ok(Reaction::ready(0));
                    };
                    Ok(hooks.use_deferred_node(next, |n| {
                        n.and_then(|n| n.attr_i64("depth")).map_or(0, |d| d + 1)
                    }))
                }),
        )
        .build()
        .expect("bench schema")
}

fn counters(n: usize) -> Node {
    let content: Vec<Value> = (0..n)
        .map(|i| {
            json!({ "type": "paragraph", "content": [
                { "type": "text", "text": "count: " },
                { "type": "counter", "attrs": { "id": format!("c{i}"), "step": i } },
            ] })
        })
        .collect();
    Node::from_json(json!({ "type": "doc", "content": content })).expect("bench doc")
}

/// Links in document order, each pointing at the one after it.
fn chain(n: usize) -> Node {
    let content: Vec<Value> = (0..n)
        .map(|i| {
            let next = (i + 1 < n).then(|| format!("l{}", i + 1));
            json!({ "type": "link", "attrs": { "id": format!("l{i}"), "next": next } })
        })
        .collect();
    Node::from_json(json!({ "type": "doc", "content": content })).expect("bench doc")
}

fn computation() -> DocumentComputation {
    DocumentComputation::new(schema(), DocumentConfig::new().with_invalidate(|_| {}))
}

fn bench_first_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    for &n in SIZES {
        group.throughput(Throughput::Elements(n as u64));
        let doc = counters(n);
        group.bench_with_input(BenchmarkId::new("ready", n), &doc, |b, doc| {
            b.iter(|| {
                let mut computation = computation();
                black_box(computation.run(black_box(doc)).expect("pass"))
            });
        });
    }
    group.finish();
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    for &n in &SIZES[..2] {
        group.throughput(Throughput::Elements(n as u64));
        let doc = chain(n);
        group.bench_with_input(BenchmarkId::new("chain", n), &doc, |b, doc| {
            b.iter(|| {
                let mut computation = computation();
                black_box(computation.run(black_box(doc)).expect("pass"))
            });
        });
    }
    group.finish();
}

fn bench_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    for &n in SIZES {
        group.throughput(Throughput::Elements(n as u64));
        let doc = counters(n);
        let mut computation = computation();
        computation.run(&doc).expect("warm-up pass");
        group.bench_with_input(BenchmarkId::new("steady", n), &doc, |b, doc| {
            b.iter(|| black_box(computation.run(black_box(doc)).expect("pass")));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_first_pass, bench_chain, bench_steady_state);
criterion_main!(benches);
