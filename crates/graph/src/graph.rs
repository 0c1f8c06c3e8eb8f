//! 인메모리 방향 그래프
//!
//! 노드는 ID로 키가 매겨진 아레나(`nodes`)에, 간선은 같은 ID로 키가 매겨진
//! 인접 맵(`edges`)에 저장합니다. `edges[a][b] == true`는 "a가 b의 부모",
//! `false`는 "b가 a의 부모"를 뜻하며 모든 간선은 양방향으로 기록됩니다.
//!
//! 한 스냅샷의 그래프는 한 곳에서만 소유하며, 모든 연산은 동기적입니다.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::node::Node;

/// 부모→자식 방향 플래그
const PARENT_OF: bool = true;
const CHILD_OF: bool = false;

/// 노드 `N`의 방향 그래프
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph<N> {
    nodes: BTreeMap<String, N>,
    edges: BTreeMap<String, BTreeMap<String, bool>>,
}

impl<N> Default for Graph<N> {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }
}

impl<N: Node + Clone> Graph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 루트부터 리프 순서의 체인을 삽입합니다.
    ///
    /// 이미 있는 ID의 노드는 그대로 두고 간선만 추가하므로 같은 체인을 다시
    /// 넣어도 그래프는 변하지 않습니다. 빈 입력은 아무것도 하지 않습니다.
    pub fn insert_tree<I>(&mut self, chain: I)
    where
        I: IntoIterator<Item = N>,
    {
        let mut parent: Option<String> = None;
        for node in chain {
            let id = node.id().to_owned();
            self.nodes.entry(id.clone()).or_insert(node);
            self.edges.entry(id.clone()).or_default();

            if let Some(parent_id) = parent.take()
                && parent_id != id
            {
                self.link(&parent_id, &id);
            }
            parent = Some(id);
        }
    }

    /// 부모가 없는 모든 노드
    pub fn roots(&self) -> Vec<&N> {
        self.nodes
            .iter()
            .filter(|(id, _)| self.is_root(id))
            .map(|(_, node)| node)
            .collect()
    }

    /// `root_id`에서 부모→자식 간선만 따라 도달 가능한 노드로 이루어진 그래프
    ///
    /// 알 수 없는 루트는 빈 그래프를 반환합니다.
    pub fn subgraph(&self, root_id: &str) -> Self {
        let mut result = Self::new();
        if !self.nodes.contains_key(root_id) {
            return result;
        }

        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::from([root_id.to_owned()]);
        visited.insert(root_id.to_owned());
        while let Some(id) = queue.pop_front() {
            for child in self.child_ids(&id) {
                if visited.insert(child.to_owned()) {
                    queue.push_back(child.to_owned());
                }
            }
        }

        for id in &visited {
            if let Some(node) = self.nodes.get(id) {
                result.nodes.insert(id.clone(), node.clone());
            }
            let adjacent = self
                .edges
                .get(id)
                .map(|adj| {
                    adj.iter()
                        .filter(|(other, _)| visited.contains(*other))
                        .map(|(other, dir)| (other.clone(), *dir))
                        .collect()
                })
                .unwrap_or_default();
            result.edges.insert(id.clone(), adjacent);
        }
        result
    }

    /// 조건에 맞는 노드와 그 노드에 닿는 모든 간선을 제거합니다.
    ///
    /// 자손으로 전파하지 않습니다. 부모를 잃은 자손은 새 루트가 됩니다.
    pub fn delete_func<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&N) -> bool,
    {
        let doomed: BTreeSet<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| predicate(node))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &doomed {
            self.nodes.remove(id);
            if let Some(adjacent) = self.edges.remove(id) {
                for other in adjacent.keys() {
                    if let Some(back) = self.edges.get_mut(other) {
                        back.remove(id);
                    }
                }
            }
        }
        doomed.len()
    }

    /// 다른 그래프의 노드와 간선을 합칩니다.
    pub fn merge(&mut self, other: Self) {
        for (id, node) in other.nodes {
            self.nodes.entry(id).or_insert(node);
        }
        for (id, adjacent) in other.edges {
            self.edges.entry(id).or_default().extend(adjacent);
        }
    }

    pub fn node(&self, id: &str) -> Option<&N> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `id`의 직접 자식
    pub fn children(&self, id: &str) -> impl Iterator<Item = &N> {
        self.child_ids(id).filter_map(|child| self.nodes.get(child))
    }

    /// `id`의 직접 부모
    pub fn parents(&self, id: &str) -> impl Iterator<Item = &N> {
        self.adjacent(id)
            .filter(|(_, dir)| **dir == CHILD_OF)
            .filter_map(|(other, _)| self.nodes.get(other))
    }

    /// `id`와 간선으로 연결된 모든 노드 (방향 무관)
    pub fn neighbors(&self, id: &str) -> impl Iterator<Item = &N> {
        self.adjacent(id)
            .filter_map(|(other, _)| self.nodes.get(other))
    }

    /// `from`→`to` 간선의 방향 플래그
    pub fn edge(&self, from: &str, to: &str) -> Option<bool> {
        self.edges.get(from)?.get(to).copied()
    }

    /// 모든 간선이 반대 방향 항목을 가지고 있는지 검사합니다.
    pub fn is_symmetric(&self) -> bool {
        self.edges.iter().all(|(a, adjacent)| {
            adjacent
                .iter()
                .all(|(b, dir)| self.edge(b, a) == Some(!*dir))
        })
    }

    fn link(&mut self, parent: &str, child: &str) {
        self.edges
            .entry(parent.to_owned())
            .or_default()
            .insert(child.to_owned(), PARENT_OF);
        self.edges
            .entry(child.to_owned())
            .or_default()
            .insert(parent.to_owned(), CHILD_OF);
    }

    fn is_root(&self, id: &str) -> bool {
        !self.adjacent(id).any(|(_, dir)| *dir == CHILD_OF)
    }

    fn adjacent<'a>(&'a self, id: &str) -> impl Iterator<Item = (&'a String, &'a bool)> + 'a {
        self.edges.get(id).into_iter().flat_map(|adj| adj.iter())
    }

    fn child_ids<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.adjacent(id)
            .filter(|(_, dir)| **dir == PARENT_OF)
            .map(|(other, _)| other.as_str())
    }

    fn write_paths(&self, f: &mut fmt::Formatter<'_>, path: &mut Vec<String>) -> fmt::Result {
        let Some(last) = path.last().cloned() else {
            return Ok(());
        };
        let children: Vec<&str> = self
            .child_ids(&last)
            .filter(|child| !path.iter().any(|p| p.as_str() == *child))
            .collect();
        if children.is_empty() {
            return writeln!(f, "{}", path.join(" -> "));
        }
        for child in children {
            path.push(child.to_owned());
            self.write_paths(f, path)?;
            path.pop();
        }
        Ok(())
    }
}

/// 루트에서 리프까지의 경로를 한 줄씩 출력합니다 (진단용).
impl<N: Node + Clone> fmt::Display for Graph<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for root in self.roots() {
            let mut path = vec![root.id().to_owned()];
            self.write_paths(f, &mut path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestNode(&'static str);

    impl Node for TestNode {
        fn id(&self) -> &str {
            self.0
        }

        fn node_type(&self) -> &str {
            "test/node"
        }
    }

    fn chain(ids: &[&'static str]) -> Vec<TestNode> {
        ids.iter().map(|id| TestNode(id)).collect()
    }

    fn ids<'a>(nodes: impl IntoIterator<Item = &'a TestNode>) -> Vec<&'static str> {
        let mut v: Vec<_> = nodes.into_iter().map(|n| n.0).collect();
        v.sort_unstable();
        v
    }

    fn two_chain_graph() -> Graph<TestNode> {
        let mut g = Graph::new();
        g.insert_tree(chain(&[
            "image-a",
            "container-a",
            "pod-a",
            "deployment-a",
            "namespace-a",
        ]));
        g.insert_tree(chain(&[
            "image-a",
            "container-c",
            "pod-b",
            "deployment-b",
            "namespace-b",
        ]));
        g
    }

    #[test]
    fn empty_insert_is_noop() {
        let mut g: Graph<TestNode> = Graph::new();
        g.insert_tree(Vec::new());
        assert!(g.is_empty());
        assert!(g.roots().is_empty());
    }

    #[test]
    fn roots_are_nodes_without_parents() {
        let mut g = Graph::new();
        g.insert_tree(chain(&["b", "c"]));
        g.insert_tree(chain(&["a", "c"]));
        g.insert_tree(chain(&["d"]));
        assert_eq!(ids(g.roots()), vec!["a", "b", "d"]);
    }

    #[test]
    fn roots_ignore_insertion_order() {
        let mut forward = Graph::new();
        forward.insert_tree(chain(&["x", "y", "z"]));
        forward.insert_tree(chain(&["w", "y"]));

        let mut reverse = Graph::new();
        reverse.insert_tree(chain(&["w", "y"]));
        reverse.insert_tree(chain(&["x", "y", "z"]));

        assert_eq!(forward, reverse);
        assert_eq!(ids(forward.roots()), vec!["w", "x"]);
    }

    #[test]
    fn insert_tree_is_idempotent() {
        let mut g = Graph::new();
        g.insert_tree(chain(&["a", "b", "c"]));
        let once = g.clone();
        g.insert_tree(chain(&["a", "b", "c"]));
        assert_eq!(g, once);
    }

    #[test]
    fn shared_prefix_merges() {
        let g = two_chain_graph();
        assert_eq!(ids(g.roots()), vec!["image-a"]);
        assert_eq!(g.len(), 9);
        assert_eq!(ids(g.children("image-a")), vec!["container-a", "container-c"]);
        assert!(g.is_symmetric());
    }

    #[test]
    fn subgraph_contains_both_chains() {
        let g = two_chain_graph();
        let sub = g.subgraph("image-a");
        assert_eq!(sub, g);
        assert!(sub.contains("namespace-a"));
        assert!(sub.contains("namespace-b"));
    }

    #[test]
    fn subgraph_excludes_unreachable_nodes() {
        let mut g = Graph::new();
        g.insert_tree(chain(&["img-1", "c1", "pod"]));
        g.insert_tree(chain(&["img-2", "c2", "pod"]));

        let sub = g.subgraph("img-1");
        assert_eq!(ids(sub.nodes()), vec!["c1", "img-1", "pod"]);
        assert_eq!(sub.edge("pod", "c2"), None);
        assert_eq!(sub.edge("pod", "c1"), Some(false));
        assert!(sub.is_symmetric());
    }

    #[test]
    fn subgraph_is_fixed_point() {
        let g = two_chain_graph();
        let mut partial = g.clone();
        partial.insert_tree(chain(&["image-z", "container-a"]));
        let once = partial.subgraph("image-z");
        let twice = once.subgraph("image-z");
        assert_eq!(once, twice);
    }

    #[test]
    fn subgraph_of_unknown_root_is_empty() {
        let g = two_chain_graph();
        assert!(g.subgraph("nope").is_empty());
    }

    #[test]
    fn delete_func_removes_node_and_edges_without_cascade() {
        let mut g = two_chain_graph();
        let removed = g.delete_func(|n| n.0 == "pod-a");
        assert_eq!(removed, 1);
        assert!(!g.contains("pod-a"));
        assert_eq!(g.edge("container-a", "pod-a"), None);
        assert_eq!(g.edge("deployment-a", "pod-a"), None);
        // 자손은 남아서 새 루트가 됨
        assert!(g.contains("deployment-a"));
        assert_eq!(ids(g.roots()), vec!["deployment-a", "image-a"]);
        // 무관한 간선은 그대로
        assert_eq!(g.edge("pod-b", "deployment-b"), Some(true));
        assert!(g.is_symmetric());
    }

    #[test]
    fn parents_and_neighbors() {
        let g = two_chain_graph();
        assert_eq!(ids(g.parents("pod-a")), vec!["container-a"]);
        assert_eq!(ids(g.neighbors("pod-a")), vec!["container-a", "deployment-a"]);
        assert_eq!(g.parents("image-a").count(), 0);
    }

    #[test]
    fn merge_combines_graphs() {
        let mut a = Graph::new();
        a.insert_tree(chain(&["i1", "c1"]));
        let mut b = Graph::new();
        b.insert_tree(chain(&["i1", "c2"]));
        a.merge(b);
        assert_eq!(ids(a.children("i1")), vec!["c1", "c2"]);
        assert!(a.is_symmetric());
    }

    #[test]
    fn display_renders_one_line_per_leaf_path() {
        let g = two_chain_graph();
        let rendered = g.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "image-a -> container-a -> pod-a -> deployment-a -> namespace-a",
                "image-a -> container-c -> pod-b -> deployment-b -> namespace-b",
            ]
        );
    }
}
