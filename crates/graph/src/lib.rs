//! tidewatch 의존성 그래프
//!
//! - [`graph::Graph`]: ID 키 아레나와 인접 맵으로 구성된 제네릭 방향 그래프
//! - [`node`]: 이미지/Kubernetes/Docker 노드의 닫힌 모델
//!
//! 이미지가 루트이고, 그 이미지를 참조하는 리소스가 자식 방향으로 이어집니다:
//! `image → container → pod → replicaset → deployment → namespace`

pub mod graph;
pub mod node;

pub use graph::Graph;
pub use node::{
    DockerKind, DockerResource, Domain, ImageNode, KubernetesKind, KubernetesResource, Node,
    PlatformNode, Resource,
};

/// 플랫폼 어댑터가 생성하는 스냅샷 그래프
pub type PlatformGraph = Graph<PlatformNode>;
