//! 플랫폼 그래프 → 스토리지 모델 변환
//!
//! 한 이미지의 서브그래프에서:
//! - 모든 노드를 [`GraphNode`]로 변환
//! - 이미지에서 가까운 노드의 라벨이 우선하도록 라벨 해석
//! - 네임스페이스 역할 노드의 이웃 종류로 태그 계산

use std::collections::{BTreeSet, HashSet, VecDeque};

use tidewatch_core::labels::Labels;
use tidewatch_graph::{ImageNode, Node, PlatformGraph, PlatformNode, Resource};

use crate::model::{GraphNode, ImageGraph, RawImage};

/// 노드 하나를 스토리지 표현으로 변환합니다.
pub fn map_node(node: &PlatformNode) -> GraphNode {
    let domain = node.domain().as_str().to_owned();
    let node_type = node.node_type().to_owned();
    match node {
        PlatformNode::Image(image) => GraphNode {
            domain,
            node_type,
            name: image.reference().to_string(),
            labels: Labels::new(),
            internal_labels: Labels::new(),
        },
        PlatformNode::Kubernetes(resource) => map_resource(domain, node_type, resource),
        PlatformNode::Docker(resource) => map_resource(domain, node_type, resource),
    }
}

fn map_resource(domain: String, node_type: String, resource: &dyn Resource) -> GraphNode {
    GraphNode {
        domain,
        node_type,
        name: resource.name().to_owned(),
        labels: resource.labels().remove_unsupported(),
        internal_labels: resource.internal_labels().clone(),
    }
}

/// 루트에서 자식 방향 BFS 순서 (거리 오름차순, 같은 거리는 ID 순)
fn bfs_order<'a>(graph: &'a PlatformGraph, root: &'a PlatformNode) -> Vec<&'a PlatformNode> {
    let mut order = Vec::with_capacity(graph.len());
    let mut seen: HashSet<&str> = HashSet::from([root.id()]);
    let mut queue = VecDeque::from([root]);

    while let Some(node) = queue.pop_front() {
        order.push(node);
        for child in graph.children(node.id()) {
            if seen.insert(child.id()) {
                queue.push_back(child);
            }
        }
    }
    order
}

/// 가장 가까운 노드의 값이 이기는 라벨 해석
pub fn resolve_labels(graph: &PlatformGraph, image: &PlatformNode) -> Labels {
    let mut resolved = Labels::new();
    for node in bfs_order(graph, image) {
        for (key, value) in node.labels().remove_unsupported().iter() {
            resolved.insert_if_absent(key, value);
        }
    }
    resolved
}

/// 이미지에서 가장 가까운 네임스페이스 역할 노드
pub fn namespace_of<'a>(graph: &'a PlatformGraph, image: &'a PlatformNode) -> Option<&'a PlatformNode> {
    bfs_order(graph, image)
        .into_iter()
        .find(|n| n.is_namespace_like())
}

/// 네임스페이스 역할 노드의 이웃 중 태그 가능한 종류 (정렬, 중복 제거)
pub fn resolve_tags(graph: &PlatformGraph, namespace: Option<&PlatformNode>) -> Vec<String> {
    let Some(namespace) = namespace else {
        return Vec::new();
    };
    graph
        .neighbors(namespace.id())
        .filter_map(PlatformNode::tag)
        .map(str::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 이미지 서브그래프 전체를 [`RawImage`]로 변환합니다.
///
/// `subgraph`는 `image`를 루트로 추출된 그래프여야 합니다.
pub fn map_image(subgraph: &PlatformGraph, image: &ImageNode) -> Option<RawImage> {
    let root = subgraph.node(&image_id(image))?;

    let mut nodes = std::collections::BTreeMap::new();
    let mut edges = std::collections::BTreeMap::new();
    for node in subgraph.nodes() {
        let mut mapped = map_node(node);
        if node.id() == root.id() {
            mapped.labels = resolve_labels(subgraph, root);
        }
        nodes.insert(node.id().to_owned(), mapped);

        let children: BTreeSet<String> = subgraph
            .children(node.id())
            .map(|c| c.id().to_owned())
            .collect();
        if !children.is_empty() {
            edges.insert(node.id().to_owned(), children);
        }
    }

    let tags = resolve_tags(subgraph, namespace_of(subgraph, root));
    Some(RawImage::new(
        image.reference().clone(),
        tags,
        ImageGraph {
            root: root.id().to_owned(),
            nodes,
            edges,
        },
    ))
}

fn image_id(image: &ImageNode) -> String {
    image.reference().to_string()
}
