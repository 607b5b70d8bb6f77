//! Benchmarks for parsing, policy extraction and subgraph extraction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use koreografeye::{extract_graph, ground_store, parse_n3, DocumentContext, Extractor, Term};

const PREFIXES: &str = "@prefix ex: <http://example.org/> .\n\
    @prefix fno: <https://w3id.org/function/ontology#> .\n\
    @prefix sh: <http://www.w3.org/ns/shacl#> .\n\
    @prefix as: <https://www.w3.org/ns/activitystreams#> .\n";

/// `n` policies, each carrying a nested notification
fn policies(n: usize) -> String {
    let mut text = PREFIXES.to_string();
    for i in 0..n {
        text.push_str(&format!(
            "ex:p{i} a fno:Execution ; fno:executes ex:Send ; sh:order {order} ;\n\
               ex:to <http://example.org/inbox/{i}> ;\n\
               ex:notification [ a as:Announce ; as:actor ex:alice ; as:object [ a as:Note ; as:content \"n{i}\" ] ] .\n",
            i = i,
            order = n - i
        ));
    }
    text
}

/// A linked chain of `n` resources ending in a cycle
fn chain(n: usize) -> String {
    let mut text = PREFIXES.to_string();
    for i in 0..n {
        text.push_str(&format!("ex:r{} ex:next ex:r{} ; ex:label \"r{}\" .\n", i, (i + 1) % n, i));
    }
    text
}

fn parse_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_n3");
    for n in [10, 100, 1000] {
        let input = policies(n);
        group.bench_with_input(BenchmarkId::new("policies", n), &input, |b, input| {
            b.iter(|| parse_n3(black_box(input)))
        });
    }
    group.finish();
}

fn extract_policies_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_policies");
    for n in [10, 100, 500] {
        let store = parse_n3(&policies(n)).expect("benchmark input parses");
        let context = DocumentContext::new("bench.ttl", "http://example.org/alice", "bench.ttl");
        group.bench_with_input(BenchmarkId::new("policies", n), &store, |b, store| {
            b.iter(|| Extractor::new().extract(black_box(store), &context))
        });
    }
    group.finish();
}

fn extract_graph_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_graph");
    for n in [100, 1000, 10000] {
        let store = parse_n3(&chain(n)).expect("benchmark input parses");
        let start = Term::uri("http://example.org/r0");
        group.bench_with_input(BenchmarkId::new("cyclic_chain", n), &store, |b, store| {
            b.iter(|| extract_graph(black_box(store), &start))
        });
    }
    group.finish();
}

fn ground_benchmark(c: &mut Criterion) {
    let store = parse_n3(&policies(200)).expect("benchmark input parses");
    c.bench_function("ground_store/200_policies", |b| b.iter(|| ground_store(black_box(&store))));
}

criterion_group!(
    benches,
    parse_benchmark,
    extract_policies_benchmark,
    extract_graph_benchmark,
    ground_benchmark
);
criterion_main!(benches);
