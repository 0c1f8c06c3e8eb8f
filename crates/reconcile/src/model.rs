//! 스토리지 모델
//!
//! 플랫폼 그래프 타입과 분리된, 직렬화 가능한 이미지 레코드입니다.

use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use tidewatch_core::labels::Labels;
use tidewatch_core::types::ImageReference;

/// 그래프 노드의 스토리지 표현
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// `kubernetes` | `docker` | `oci`
    pub domain: String,
    pub node_type: String,
    pub name: String,
    /// 이미지 노드는 하위 노드에서 해석된 라벨, 그 외는 자기 라벨
    pub labels: Labels,
    pub internal_labels: Labels,
}

/// 한 이미지의 서브그래프
///
/// `edges`는 부모 → 자식 방향만 기록합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGraph {
    pub root: String,
    pub nodes: BTreeMap<String, GraphNode>,
    pub edges: BTreeMap<String, BTreeSet<String>>,
}

impl ImageGraph {
    pub fn root_node(&self) -> Option<&GraphNode> {
        self.nodes.get(&self.root)
    }

    pub fn children(&self, id: &str) -> impl Iterator<Item = &str> {
        self.edges.get(id).into_iter().flatten().map(String::as_str)
    }
}

/// 관찰된 이미지 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImage {
    pub reference: ImageReference,
    /// 이미지를 사용하는 리소스 종류 (정렬, 중복 제거)
    pub tags: Vec<String>,
    pub graph: ImageGraph,
    /// 마지막 처리 시각. 처음 관찰된 이미지는 `None`
    pub last_processed: Option<SystemTime>,
}

impl RawImage {
    pub fn new(reference: ImageReference, tags: Vec<String>, graph: ImageGraph) -> Self {
        Self {
            reference,
            tags,
            graph,
            last_processed: None,
        }
    }

    /// 스토어 키
    pub fn key(&self) -> String {
        self.reference.to_string()
    }

    /// 이미지 노드에 해석된 라벨
    pub fn labels(&self) -> Option<&Labels> {
        self.graph.root_node().map(|n| &n.labels)
    }
}
