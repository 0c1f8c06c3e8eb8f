//! 그래프 엔진 벤치마크
//!
//! 클러스터 규모의 트리 삽입, 서브그래프 추출, 루트 탐색 성능을 측정합니다.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tidewatch_core::labels::Labels;
use tidewatch_core::types::ImageReference;
use tidewatch_graph::{Graph, KubernetesKind, KubernetesResource, PlatformNode};

/// `namespaces`개 네임스페이스에 각각 `per_ns`개의 디플로이먼트를 만듭니다.
fn cluster_graph(namespaces: usize, per_ns: usize) -> Graph<PlatformNode> {
    let mut graph = Graph::new();
    for n in 0..namespaces {
        let ns = format!("ns-{n}");
        for d in 0..per_ns {
            let image = ImageReference::parse(&format!("ghcr.io/bench/app-{}:1.0", d % 16))
                .unwrap_or_else(|e| panic!("bench reference: {e}"));
            let pod = format!("app-{d}-0");
            graph.insert_tree([
                PlatformNode::image(image),
                KubernetesResource::container(&ns, &pod, "app").into(),
                KubernetesResource::new(KubernetesKind::Pod, Some(&ns), pod.clone(), Labels::new())
                    .into(),
                KubernetesResource::new(
                    KubernetesKind::Deployment,
                    Some(&ns),
                    format!("app-{d}"),
                    Labels::new(),
                )
                .into(),
                KubernetesResource::new(KubernetesKind::Namespace, None, ns.clone(), Labels::new())
                    .into(),
            ]);
        }
    }
    graph
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_tree");
    for size in [10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| black_box(cluster_graph(size, 20)));
        });
    }
    group.finish();
}

fn bench_subgraph(c: &mut Criterion) {
    let graph = cluster_graph(50, 20);
    let roots: Vec<String> = graph
        .roots()
        .into_iter()
        .map(|n| tidewatch_graph::Node::id(n).to_owned())
        .collect();

    c.bench_function("subgraph_all_roots", |b| {
        b.iter(|| {
            for root in &roots {
                black_box(graph.subgraph(root));
            }
        });
    });

    c.bench_function("roots", |b| b.iter(|| black_box(graph.roots().len())));
}

criterion_group!(benches, bench_insert, bench_subgraph);
criterion_main!(benches);
