//! 캐시된 클러스터 상태로부터 스냅샷 그래프를 만드는 순수 함수
//!
//! 체인: `image → container → pod → owner chain → namespace`
//!
//! owner chain은 파드의 컨트롤러 owner reference를 따라갑니다:
//! - ReplicaSet → Deployment
//! - Job → CronJob
//! - DaemonSet
//! - StatefulSet

use std::collections::HashMap;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Container, ContainerStatus, Namespace, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

use tidewatch_core::labels::Labels;
use tidewatch_core::types::ImageReference;
use tidewatch_graph::{Graph, KubernetesKind, KubernetesResource, PlatformGraph, PlatformNode};

use crate::digest::pin_digest;
use crate::error::PlatformError;

/// 초기화 컨테이너 표시 내부 라벨
pub const INTERNAL_INIT_CONTAINER: &str = "kubernetes.container.init";
/// 파드 phase 내부 라벨
pub const INTERNAL_POD_PHASE: &str = "kubernetes.pod.phase";

const DEFAULT_NAMESPACE: &str = "default";

/// 그래프 빌드에 필요한 리소스 캐시의 한 시점 상태
#[derive(Debug, Clone, Default)]
pub struct ClusterState {
    pub namespaces: Vec<Arc<Namespace>>,
    pub deployments: Vec<Arc<Deployment>>,
    pub daemon_sets: Vec<Arc<DaemonSet>>,
    pub replica_sets: Vec<Arc<ReplicaSet>>,
    pub stateful_sets: Vec<Arc<StatefulSet>>,
    pub cron_jobs: Vec<Arc<CronJob>>,
    pub jobs: Vec<Arc<Job>>,
    pub pods: Vec<Arc<Pod>>,
}

/// `(namespace, name)` → 메타데이터 인덱스
type MetaIndex<'a> = HashMap<(&'a str, &'a str), &'a ObjectMeta>;

fn index<'a, K, F>(objects: &'a [Arc<K>], meta: F) -> MetaIndex<'a>
where
    F: Fn(&'a K) -> &'a ObjectMeta,
{
    objects
        .iter()
        .filter_map(|o| {
            let m = meta(o.as_ref());
            Some(((namespace_of(m), m.name.as_deref()?), m))
        })
        .collect()
}

fn namespace_of(meta: &ObjectMeta) -> &str {
    meta.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
}

/// 어노테이션을 라벨로 사용합니다.
fn annotations(meta: Option<&ObjectMeta>) -> Labels {
    meta.and_then(|m| m.annotations.clone())
        .map(Labels::from)
        .unwrap_or_default()
}

/// 컨트롤러 owner reference, 없으면 첫 번째 owner
fn controller_of(meta: &ObjectMeta) -> Option<&OwnerReference> {
    let owners = meta.owner_references.as_deref()?;
    owners
        .iter()
        .find(|o| o.controller == Some(true))
        .or_else(|| owners.first())
}

struct Indexes<'a> {
    namespaces: HashMap<&'a str, &'a ObjectMeta>,
    deployments: MetaIndex<'a>,
    daemon_sets: MetaIndex<'a>,
    replica_sets: MetaIndex<'a>,
    stateful_sets: MetaIndex<'a>,
    cron_jobs: MetaIndex<'a>,
    jobs: MetaIndex<'a>,
}

impl<'a> Indexes<'a> {
    fn new(state: &'a ClusterState) -> Self {
        Self {
            namespaces: state
                .namespaces
                .iter()
                .filter_map(|n| Some((n.metadata.name.as_deref()?, &n.metadata)))
                .collect(),
            deployments: index(&state.deployments, |o| &o.metadata),
            daemon_sets: index(&state.daemon_sets, |o| &o.metadata),
            replica_sets: index(&state.replica_sets, |o| &o.metadata),
            stateful_sets: index(&state.stateful_sets, |o| &o.metadata),
            cron_jobs: index(&state.cron_jobs, |o| &o.metadata),
            jobs: index(&state.jobs, |o| &o.metadata),
        }
    }

    fn resource(
        &self,
        kind: KubernetesKind,
        namespace: &'a str,
        name: &'a str,
    ) -> (KubernetesResource, Option<&'a ObjectMeta>) {
        let cache = match kind {
            KubernetesKind::Deployment => Some(&self.deployments),
            KubernetesKind::DaemonSet => Some(&self.daemon_sets),
            KubernetesKind::ReplicaSet => Some(&self.replica_sets),
            KubernetesKind::StatefulSet => Some(&self.stateful_sets),
            KubernetesKind::CronJob => Some(&self.cron_jobs),
            KubernetesKind::Job => Some(&self.jobs),
            KubernetesKind::Namespace | KubernetesKind::Pod | KubernetesKind::Container => None,
        };
        let meta = cache.and_then(|c| c.get(&(namespace, name)).copied());
        (
            KubernetesResource::new(kind, Some(namespace), name, annotations(meta)),
            meta,
        )
    }

    /// 파드 owner부터 최상위 컨트롤러까지의 체인
    fn owner_chain(&self, namespace: &'a str, pod: &'a ObjectMeta) -> Vec<PlatformNode> {
        let mut chain = Vec::new();
        let Some(owner) = controller_of(pod) else {
            return chain;
        };

        let (kind, parent_kind) = match owner.kind.as_str() {
            "ReplicaSet" => (KubernetesKind::ReplicaSet, Some(KubernetesKind::Deployment)),
            "Job" => (KubernetesKind::Job, Some(KubernetesKind::CronJob)),
            "DaemonSet" => (KubernetesKind::DaemonSet, None),
            "StatefulSet" => (KubernetesKind::StatefulSet, None),
            _ => return chain,
        };

        let (node, meta) = self.resource(kind, namespace, &owner.name);
        chain.push(node.into());

        if let Some(parent_kind) = parent_kind
            && let Some(parent) = meta.and_then(controller_of)
            && parent.kind == parent_kind_name(parent_kind)
        {
            let (node, _) = self.resource(parent_kind, namespace, &parent.name);
            chain.push(node.into());
        }
        chain
    }

    fn namespace(&self, name: &str) -> PlatformNode {
        KubernetesResource::new(
            KubernetesKind::Namespace,
            None,
            name,
            annotations(self.namespaces.get(name).copied()),
        )
        .into()
    }
}

fn parent_kind_name(kind: KubernetesKind) -> &'static str {
    match kind {
        KubernetesKind::Deployment => "Deployment",
        KubernetesKind::CronJob => "CronJob",
        _ => "",
    }
}

/// 컨테이너의 실제 이미지 참조
///
/// 상태의 `image_id`가 선언된 이미지와 같은 저장소면 그 다이제스트를 고정합니다.
fn container_image(
    container: &Container,
    statuses: &[ContainerStatus],
) -> Result<Option<ImageReference>, PlatformError> {
    let Some(declared) = container.image.as_deref().filter(|i| !i.is_empty()) else {
        return Ok(None);
    };
    let reference = ImageReference::parse(declared)?;
    let status = statuses.iter().find(|s| s.name == container.name);
    Ok(Some(pin_digest(
        &reference,
        status.map(|s| s.image_id.as_str()),
    )))
}

/// 클러스터 상태로부터 전체 그래프를 만듭니다.
///
/// 이미지 참조를 해석할 수 없는 컨테이너가 있으면 스냅샷 전체가 실패합니다.
pub fn build_graph(state: &ClusterState) -> Result<PlatformGraph, PlatformError> {
    let indexes = Indexes::new(state);
    let mut graph = Graph::new();

    for pod in &state.pods {
        let meta = &pod.metadata;
        let Some(pod_name) = meta.name.as_deref() else {
            continue;
        };
        let Some(spec) = pod.spec.as_ref() else {
            continue;
        };
        let namespace = namespace_of(meta);

        let mut pod_node =
            KubernetesResource::new(KubernetesKind::Pod, Some(namespace), pod_name, annotations(Some(meta)));
        if let Some(phase) = pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
            pod_node = pod_node.with_internal_label(INTERNAL_POD_PHASE, phase);
        }
        let mut tail: Vec<PlatformNode> = vec![pod_node.into()];
        tail.extend(indexes.owner_chain(namespace, meta));
        tail.push(indexes.namespace(namespace));

        let status = pod.status.as_ref();
        let regular = status
            .and_then(|s| s.container_statuses.as_deref())
            .unwrap_or_default();
        let init = status
            .and_then(|s| s.init_container_statuses.as_deref())
            .unwrap_or_default();

        let containers = spec
            .containers
            .iter()
            .map(|c| (c, regular, false))
            .chain(
                spec.init_containers
                    .iter()
                    .flatten()
                    .map(|c| (c, init, true)),
            );

        for (container, statuses, is_init) in containers {
            let Some(image) = container_image(container, statuses)? else {
                continue;
            };
            let mut node = KubernetesResource::container(namespace, pod_name, container.name.clone());
            if is_init {
                node = node.with_internal_label(INTERNAL_INIT_CONTAINER, "true");
            }

            let mut chain = Vec::with_capacity(tail.len() + 2);
            chain.push(PlatformNode::image(image));
            chain.push(node.into());
            chain.extend(tail.iter().cloned());
            graph.insert_tree(chain);
        }
    }

    Ok(graph)
}
