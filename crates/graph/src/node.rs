//! 플랫폼 노드 모델
//!
//! 그래프에 들어가는 모든 노드는 닫힌 열거형 [`PlatformNode`]의 한 변형입니다.
//! 새 플랫폼 종류를 추가하면 매퍼의 `match`가 컴파일 단계에서 누락을 잡아냅니다.
//!
//! # ID 규칙
//! - 이미지: 완전한 참조 문자열 (`docker.io/library/nginx:1.25`)
//! - Kubernetes: `{type}/{namespace}/{name}`, 컨테이너는 `{type}/{namespace}/{pod}/{name}`
//! - Docker: `{type}/{name}` (컨테이너는 컨테이너 ID)

use std::fmt;

use tidewatch_core::labels::Labels;
use tidewatch_core::types::ImageReference;

static NO_LABELS: Labels = Labels::new();

/// 그래프 노드 계약
///
/// 같은 ID를 가진 두 노드는 내용도 같다고 가정합니다.
pub trait Node {
    /// 전역적으로 안정적인 ID
    fn id(&self) -> &str;
    /// 도메인이 포함된 타입 (예: `kubernetes/core/v1/pod`)
    fn node_type(&self) -> &str;
}

/// 플랫폼 리소스 공통 인터페이스
pub trait Resource {
    fn kind(&self) -> &'static str;
    fn name(&self) -> &str;
    /// 사용자 설정 라벨/어노테이션
    fn labels(&self) -> &Labels;
    /// 표시용이 아닌 플랫폼 메타데이터
    fn internal_labels(&self) -> &Labels;
}

// ─── 이미지 ────────────────────────────────────────────────────────

/// 이미지 노드: 항상 그래프의 루트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageNode {
    id: String,
    reference: ImageReference,
}

impl ImageNode {
    pub const NODE_TYPE: &'static str = "oci/image";

    pub fn new(reference: ImageReference) -> Self {
        Self {
            id: reference.to_string(),
            reference,
        }
    }

    pub fn reference(&self) -> &ImageReference {
        &self.reference
    }
}

// ─── Kubernetes ────────────────────────────────────────────────────

/// Kubernetes 리소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KubernetesKind {
    Namespace,
    Deployment,
    DaemonSet,
    ReplicaSet,
    StatefulSet,
    CronJob,
    Job,
    Pod,
    Container,
}

impl KubernetesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Deployment => "deployment",
            Self::DaemonSet => "daemonset",
            Self::ReplicaSet => "replicaset",
            Self::StatefulSet => "statefulset",
            Self::CronJob => "cronjob",
            Self::Job => "job",
            Self::Pod => "pod",
            Self::Container => "container",
        }
    }

    pub fn node_type(&self) -> &'static str {
        match self {
            Self::Namespace => "kubernetes/core/v1/namespace",
            Self::Deployment => "kubernetes/apps/v1/deployment",
            Self::DaemonSet => "kubernetes/apps/v1/daemonset",
            Self::ReplicaSet => "kubernetes/apps/v1/replicaset",
            Self::StatefulSet => "kubernetes/apps/v1/statefulset",
            Self::CronJob => "kubernetes/batch/v1/cronjob",
            Self::Job => "kubernetes/batch/v1/job",
            Self::Pod => "kubernetes/core/v1/pod",
            Self::Container => "kubernetes/core/v1/container",
        }
    }

    /// 이미지 태그로 노출되는 종류인지
    ///
    /// 네임스페이스와 ReplicaSet은 사용자가 직접 다루는 워크로드가 아니므로 제외합니다.
    pub fn is_taggable(&self) -> bool {
        !matches!(self, Self::Namespace | Self::ReplicaSet)
    }
}

impl fmt::Display for KubernetesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kubernetes 오브젝트 노드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubernetesResource {
    id: String,
    kind: KubernetesKind,
    namespace: Option<String>,
    name: String,
    labels: Labels,
    internal_labels: Labels,
}

impl KubernetesResource {
    /// 네임스페이스 스코프 오브젝트 (네임스페이스 자신은 `namespace = None`)
    pub fn new(
        kind: KubernetesKind,
        namespace: Option<&str>,
        name: impl Into<String>,
        labels: Labels,
    ) -> Self {
        let name = name.into();
        let id = match namespace {
            Some(ns) => format!("{}/{ns}/{name}", kind.node_type()),
            None => format!("{}/{name}", kind.node_type()),
        };
        Self {
            id,
            kind,
            namespace: namespace.map(str::to_owned),
            name,
            labels,
            internal_labels: Labels::new(),
        }
    }

    /// 파드 안의 컨테이너. 컨테이너 이름은 파드 안에서만 유일하므로 ID에 파드를 포함합니다.
    pub fn container(namespace: &str, pod: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: format!(
                "{}/{namespace}/{pod}/{name}",
                KubernetesKind::Container.node_type()
            ),
            kind: KubernetesKind::Container,
            namespace: Some(namespace.to_owned()),
            name,
            labels: Labels::new(),
            internal_labels: Labels::new(),
        }
    }

    pub fn with_internal_label(mut self, key: &str, value: impl Into<String>) -> Self {
        self.internal_labels.insert(key, value);
        self
    }

    pub fn kubernetes_kind(&self) -> KubernetesKind {
        self.kind
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl Resource for KubernetesResource {
    fn kind(&self) -> &'static str {
        self.kind.as_str()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn internal_labels(&self) -> &Labels {
        &self.internal_labels
    }
}

// ─── Docker ────────────────────────────────────────────────────────

/// Docker 리소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DockerKind {
    Container,
    /// `com.docker.compose.project` 라벨로 묶인 컨테이너 집합
    ComposeProject,
    /// `com.docker.stack.namespace` 라벨로 묶인 swarm 스택
    SwarmNamespace,
}

impl DockerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::ComposeProject => "compose-project",
            Self::SwarmNamespace => "swarm-namespace",
        }
    }

    pub fn node_type(&self) -> &'static str {
        match self {
            Self::Container => "docker/container",
            Self::ComposeProject => "docker/compose-project",
            Self::SwarmNamespace => "docker/swarm-namespace",
        }
    }

    pub fn is_taggable(&self) -> bool {
        matches!(self, Self::Container)
    }
}

impl fmt::Display for DockerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Docker 오브젝트 노드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerResource {
    id: String,
    kind: DockerKind,
    name: String,
    labels: Labels,
    internal_labels: Labels,
}

impl DockerResource {
    /// `key`는 종류 안에서 유일한 값 (컨테이너 ID, 프로젝트 이름)
    pub fn new(kind: DockerKind, key: &str, name: impl Into<String>, labels: Labels) -> Self {
        Self {
            id: format!("{}/{key}", kind.node_type()),
            kind,
            name: name.into(),
            labels,
            internal_labels: Labels::new(),
        }
    }

    pub fn with_internal_label(mut self, key: &str, value: impl Into<String>) -> Self {
        self.internal_labels.insert(key, value);
        self
    }

    pub fn docker_kind(&self) -> DockerKind {
        self.kind
    }
}

impl Resource for DockerResource {
    fn kind(&self) -> &'static str {
        self.kind.as_str()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn internal_labels(&self) -> &Labels {
        &self.internal_labels
    }
}

// ─── PlatformNode ──────────────────────────────────────────────────

/// 플랫폼 도메인
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Oci,
    Kubernetes,
    Docker,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oci => "oci",
            Self::Kubernetes => "kubernetes",
            Self::Docker => "docker",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 그래프 노드의 닫힌 집합
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformNode {
    Image(ImageNode),
    Kubernetes(KubernetesResource),
    Docker(DockerResource),
}

impl PlatformNode {
    pub fn image(reference: ImageReference) -> Self {
        Self::Image(ImageNode::new(reference))
    }

    pub fn domain(&self) -> Domain {
        match self {
            Self::Image(_) => Domain::Oci,
            Self::Kubernetes(_) => Domain::Kubernetes,
            Self::Docker(_) => Domain::Docker,
        }
    }

    pub fn as_image(&self) -> Option<&ImageNode> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&dyn Resource> {
        match self {
            Self::Image(_) => None,
            Self::Kubernetes(r) => Some(r),
            Self::Docker(r) => Some(r),
        }
    }

    /// 노드 자신의 라벨. 이미지는 고유 라벨이 없습니다.
    pub fn labels(&self) -> &Labels {
        self.as_resource().map_or(&NO_LABELS, Resource::labels)
    }

    /// 네임스페이스 역할을 하는 노드인지 (k8s namespace, compose project, swarm namespace)
    pub fn is_namespace_like(&self) -> bool {
        match self {
            Self::Image(_) => false,
            Self::Kubernetes(r) => r.kind == KubernetesKind::Namespace,
            Self::Docker(r) => matches!(
                r.kind,
                DockerKind::ComposeProject | DockerKind::SwarmNamespace
            ),
        }
    }

    /// 태그로 노출되는 종류명
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::Image(_) => None,
            Self::Kubernetes(r) => r.kind.is_taggable().then(|| r.kind.as_str()),
            Self::Docker(r) => r.kind.is_taggable().then(|| r.kind.as_str()),
        }
    }
}

impl Node for PlatformNode {
    fn id(&self) -> &str {
        match self {
            Self::Image(n) => &n.id,
            Self::Kubernetes(n) => &n.id,
            Self::Docker(n) => &n.id,
        }
    }

    fn node_type(&self) -> &str {
        match self {
            Self::Image(_) => ImageNode::NODE_TYPE,
            Self::Kubernetes(n) => n.kind.node_type(),
            Self::Docker(n) => n.kind.node_type(),
        }
    }
}

impl From<ImageNode> for PlatformNode {
    fn from(node: ImageNode) -> Self {
        Self::Image(node)
    }
}

impl From<KubernetesResource> for PlatformNode {
    fn from(node: KubernetesResource) -> Self {
        Self::Kubernetes(node)
    }
}

impl From<DockerResource> for PlatformNode {
    fn from(node: DockerResource) -> Self {
        Self::Docker(node)
    }
}
