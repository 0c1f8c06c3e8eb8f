//! Docker 데몬 어댑터
//!
//! [`DockerClient`] 트레이트가 bollard API를 추상화하므로 프로덕션에서는
//! [`BollardDockerClient`], 테스트에서는 `MockDockerClient`를 사용합니다.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐
//! │ DockerGrapher│───▶│ DockerClient │ (trait)
//! └──────────────┘    └──────┬───────┘
//!                        ┌───┴────┐
//!                        ▼        ▼
//!                    Bollard    Mock
//! ```
//!
//! 한 번의 스냅샷은 컨테이너 목록을 가져와 각 컨테이너의 이미지를 해석하고
//! `image → container [→ compose project | swarm namespace]` 체인을 만듭니다.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tidewatch_core::labels::Labels;
use tidewatch_core::types::ImageReference;
use tidewatch_graph::{DockerKind, DockerResource, Graph, PlatformGraph, PlatformNode};

use crate::config::DockerGrapherConfig;
use crate::digest::pin_digest;
use crate::error::PlatformError;
use crate::grapher::Grapher;

/// compose 프로젝트 라벨
pub const LABEL_COMPOSE_PROJECT: &str = "com.docker.compose.project";
/// swarm 스택 라벨
pub const LABEL_STACK_NAMESPACE: &str = "com.docker.stack.namespace";

/// 컨테이너 노드의 내부 라벨 키
pub const INTERNAL_CONTAINER_ID: &str = "docker.container.id";
pub const INTERNAL_CONTAINER_STATE: &str = "docker.container.state";

/// 목록 조회 결과의 컨테이너 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerContainer {
    pub id: String,
    /// 앞의 `/`를 제거한 이름
    pub name: String,
    /// 컨테이너 생성 시 선언된 이미지 문자열
    pub image: String,
    /// 로컬 이미지 ID (`sha256:...`)
    pub image_id: String,
    pub labels: HashMap<String, String>,
    pub state: String,
}

/// 이미지 검사 결과 중 필요한 부분
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerImage {
    pub repo_tags: Vec<String>,
    pub repo_digests: Vec<String>,
}

/// Docker API 추상화
pub trait DockerClient: Send + Sync + 'static {
    /// 컨테이너 목록. `all`이 false면 실행 중인 컨테이너만 반환합니다.
    fn list_containers(
        &self,
        all: bool,
    ) -> impl Future<Output = Result<Vec<DockerContainer>, PlatformError>> + Send;

    /// 이미지 ID 또는 이름으로 이미지를 검사합니다.
    fn inspect_image(
        &self,
        image: &str,
    ) -> impl Future<Output = Result<DockerImage, PlatformError>> + Send;

    /// 데몬 연결 확인
    fn ping(&self) -> impl Future<Output = Result<(), PlatformError>> + Send;
}

/// bollard 기반 프로덕션 클라이언트
///
/// 내부적으로 `Arc<bollard::Docker>`를 사용하므로 복제 비용이 낮습니다.
#[derive(Clone)]
pub struct BollardDockerClient {
    docker: Arc<bollard::Docker>,
}

impl BollardDockerClient {
    /// 지정한 유닉스 소켓으로 연결합니다.
    ///
    /// 이 단계는 소켓 설정만 검증하며, 실제 데몬 응답은 `ping`으로 확인해야 합니다.
    pub fn connect_with_socket(
        socket_path: &str,
        timeout_secs: u64,
    ) -> Result<Self, PlatformError> {
        let docker = bollard::Docker::connect_with_socket(
            socket_path,
            timeout_secs,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| {
            PlatformError::DockerConnection(format!(
                "failed to connect to docker at {socket_path}: {e}"
            ))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// TCP 주소로 TLS 연결합니다.
    ///
    /// `cert_dir`에는 Docker 관례대로 `key.pem`, `cert.pem`, `ca.pem`이 있어야 합니다.
    pub fn connect_with_tls(
        address: &str,
        cert_dir: &str,
        timeout_secs: u64,
    ) -> Result<Self, PlatformError> {
        let dir = Path::new(cert_dir);
        let docker = bollard::Docker::connect_with_ssl(
            address,
            &dir.join("key.pem"),
            &dir.join("cert.pem"),
            &dir.join("ca.pem"),
            timeout_secs,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| {
            PlatformError::DockerConnection(format!(
                "failed to connect to docker at {address} over TLS: {e}"
            ))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// 설정에 따라 유닉스 소켓 또는 TLS로 연결합니다.
    pub fn connect(config: &DockerGrapherConfig) -> Result<Self, PlatformError> {
        if config.uses_tls() {
            Self::connect_with_tls(&config.socket, &config.tls_cert_dir, config.connect_timeout_secs)
        } else {
            Self::connect_with_socket(&config.socket, config.connect_timeout_secs)
        }
    }
}

impl DockerClient for BollardDockerClient {
    async fn list_containers(&self, all: bool) -> Result<Vec<DockerContainer>, PlatformError> {
        use bollard::container::ListContainersOptions;

        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| PlatformError::DockerApi(format!("list containers failed: {e}")))?;

        Ok(containers
            .into_iter()
            .map(|c| DockerContainer {
                id: c.id.unwrap_or_default(),
                name: c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_owned())
                    .unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                image_id: c.image_id.unwrap_or_default(),
                labels: c.labels.unwrap_or_default(),
                state: c.state.unwrap_or_default(),
            })
            .collect())
    }

    async fn inspect_image(&self, image: &str) -> Result<DockerImage, PlatformError> {
        let inspect = self.docker.inspect_image(image).await.map_err(|e| {
            PlatformError::DockerApi(format!("inspect image {image} failed: {e}"))
        })?;
        Ok(DockerImage {
            repo_tags: inspect.repo_tags.unwrap_or_default(),
            repo_digests: inspect.repo_digests.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), PlatformError> {
        self.docker
            .ping()
            .await
            .map_err(|e| PlatformError::DockerConnection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

/// Docker 스냅샷 어댑터
pub struct DockerGrapher<C = BollardDockerClient> {
    client: C,
    include_stopped: bool,
}

impl DockerGrapher<BollardDockerClient> {
    /// 설정의 소켓으로 연결하고 ping으로 데몬 응답을 확인합니다.
    pub async fn connect(config: &DockerGrapherConfig) -> Result<Self, PlatformError> {
        config.validate()?;
        let client = BollardDockerClient::connect(config)?;
        let grapher = Self::with_client(client, config.include_stopped).await?;
        info!(socket = %config.socket, tls = config.uses_tls(), "docker grapher connected");
        Ok(grapher)
    }
}

impl<C: DockerClient> DockerGrapher<C> {
    /// 임의의 클라이언트로 생성합니다. 데몬이 응답하지 않으면 실패합니다.
    pub async fn with_client(client: C, include_stopped: bool) -> Result<Self, PlatformError> {
        client.ping().await?;
        Ok(Self {
            client,
            include_stopped,
        })
    }

    /// 컨테이너의 실제 이미지 참조를 해석합니다.
    ///
    /// 선언이 이미지 ID뿐이면 이미지의 첫 태그(없으면 첫 다이제스트)를 사용합니다.
    fn resolve_image(
        container: &DockerContainer,
        image: &DockerImage,
    ) -> Result<ImageReference, PlatformError> {
        let declared = if is_image_id(&container.image) {
            image
                .repo_tags
                .first()
                .or_else(|| image.repo_digests.first())
                .ok_or_else(|| {
                    PlatformError::DockerApi(format!(
                        "container {} runs untagged image {}",
                        container.name, container.image
                    ))
                })?
                .as_str()
        } else {
            container.image.as_str()
        };

        let reference = ImageReference::parse(declared)?;
        Ok(pin_digest(
            &reference,
            image.repo_digests.iter().map(String::as_str),
        ))
    }
}

impl<C: DockerClient> Grapher for DockerGrapher<C> {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn graph(&self, token: &CancellationToken) -> Result<PlatformGraph, PlatformError> {
        let containers = self.client.list_containers(self.include_stopped).await?;
        let mut images: HashMap<String, DockerImage> = HashMap::new();
        let mut graph = Graph::new();

        for container in &containers {
            if token.is_cancelled() {
                return Err(PlatformError::Cancelled);
            }

            let key = if container.image_id.is_empty() {
                container.image.clone()
            } else {
                container.image_id.clone()
            };
            if !images.contains_key(&key) {
                let inspected = self.client.inspect_image(&key).await?;
                images.insert(key.clone(), inspected);
            }
            let image = &images[&key];

            let reference = Self::resolve_image(container, image)?;
            graph.insert_tree(container_chain(reference, container));
        }

        debug!(
            containers = containers.len(),
            images = images.len(),
            nodes = graph.len(),
            "docker snapshot built"
        );
        Ok(graph)
    }
}

/// `image → container [→ compose project | swarm namespace]`
fn container_chain(reference: ImageReference, container: &DockerContainer) -> Vec<PlatformNode> {
    let labels: Labels = container
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut chain = vec![
        PlatformNode::image(reference),
        DockerResource::new(
            DockerKind::Container,
            &container.id,
            container.name.clone(),
            labels,
        )
        .with_internal_label(INTERNAL_CONTAINER_ID, container.id.clone())
        .with_internal_label(INTERNAL_CONTAINER_STATE, container.state.clone())
        .into(),
    ];

    if let Some(project) = container.labels.get(LABEL_COMPOSE_PROJECT) {
        chain.push(
            DockerResource::new(
                DockerKind::ComposeProject,
                project,
                project.clone(),
                Labels::new(),
            )
            .into(),
        );
    } else if let Some(stack) = container.labels.get(LABEL_STACK_NAMESPACE) {
        chain.push(
            DockerResource::new(DockerKind::SwarmNamespace, stack, stack.clone(), Labels::new())
                .into(),
        );
    }

    chain
}

fn is_image_id(image: &str) -> bool {
    image
        .strip_prefix("sha256:")
        .is_some_and(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// 테스트용 Mock Docker 클라이언트
#[cfg(test)]
#[derive(Default)]
pub struct MockDockerClient {
    pub containers: Vec<DockerContainer>,
    /// 이미지 ID/이름 → 검사 결과
    pub images: HashMap<String, DockerImage>,
    pub fail_ping: bool,
    pub fail_list: bool,
    pub inspect_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl DockerClient for MockDockerClient {
    async fn list_containers(&self, all: bool) -> Result<Vec<DockerContainer>, PlatformError> {
        if self.fail_list {
            return Err(PlatformError::DockerApi("list containers failed".to_owned()));
        }
        Ok(self
            .containers
            .iter()
            .filter(|c| all || c.state == "running")
            .cloned()
            .collect())
    }

    async fn inspect_image(&self, image: &str) -> Result<DockerImage, PlatformError> {
        self.inspect_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.images
            .get(image)
            .cloned()
            .ok_or_else(|| PlatformError::DockerApi(format!("no such image: {image}")))
    }

    async fn ping(&self) -> Result<(), PlatformError> {
        if self.fail_ping {
            return Err(PlatformError::DockerConnection("ping failed".to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tidewatch_graph::Node;

    use super::*;

    const NGINX_ID: &str = "sha256:aaaa";
    const NGINX_DIGEST: &str =
        "sha256:1111111111111111111111111111111111111111111111111111111111111111";

    fn container(id: &str, name: &str, image: &str, labels: &[(&str, &str)]) -> DockerContainer {
        DockerContainer {
            id: id.to_owned(),
            name: name.to_owned(),
            image: image.to_owned(),
            image_id: NGINX_ID.to_owned(),
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            state: "running".to_owned(),
        }
    }

    fn nginx_image() -> DockerImage {
        DockerImage {
            repo_tags: vec!["nginx:1.25".to_owned()],
            repo_digests: vec![format!("nginx@{NGINX_DIGEST}")],
        }
    }

    fn client_with(containers: Vec<DockerContainer>) -> MockDockerClient {
        MockDockerClient {
            containers,
            images: HashMap::from([(NGINX_ID.to_owned(), nginx_image())]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn construction_fails_when_ping_fails() {
        let client = MockDockerClient {
            fail_ping: true,
            ..Default::default()
        };
        let err = DockerGrapher::with_client(client, false)
            .await
            .err()
            .unwrap();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn compose_container_builds_three_node_chain() {
        let client = client_with(vec![container(
            "c1",
            "web-1",
            "nginx:1.25",
            &[(LABEL_COMPOSE_PROJECT, "shop")],
        )]);
        let grapher = DockerGrapher::with_client(client, false).await.unwrap();
        let graph = Grapher::graph(&grapher, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(graph.len(), 3);
        let roots = graph.roots();
        assert_eq!(roots.len(), 1);
        let image = roots[0].as_image().unwrap();
        assert_eq!(
            image.reference().to_string(),
            format!("docker.io/library/nginx:1.25@{NGINX_DIGEST}")
        );

        let container = graph.children(roots[0].id()).next().unwrap();
        assert_eq!(container.node_type(), "docker/container");
        let project = graph.children(container.id()).next().unwrap();
        assert_eq!(project.node_type(), "docker/compose-project");
        assert!(project.is_namespace_like());
    }

    #[tokio::test]
    async fn swarm_label_creates_swarm_namespace() {
        let client = client_with(vec![container(
            "c1",
            "api.1",
            "nginx:1.25",
            &[(LABEL_STACK_NAMESPACE, "prod")],
        )]);
        let grapher = DockerGrapher::with_client(client, false).await.unwrap();
        let graph = Grapher::graph(&grapher, &CancellationToken::new())
            .await
            .unwrap();
        assert!(graph.contains("docker/swarm-namespace/prod"));
    }

    #[tokio::test]
    async fn containers_sharing_an_image_share_the_root() {
        let client = client_with(vec![
            container("c1", "web-1", "nginx:1.25", &[]),
            container("c2", "web-2", "nginx:1.25", &[]),
        ]);
        let grapher = DockerGrapher::with_client(client, false).await.unwrap();
        let graph = Grapher::graph(&grapher, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(graph.roots().len(), 1);
        assert_eq!(graph.len(), 3);
        assert_eq!(grapher.client.inspect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn untagged_declaration_falls_back_to_repo_tag() {
        let client = client_with(vec![container("c1", "web-1", NGINX_ID, &[])]);
        let grapher = DockerGrapher::with_client(client, false).await.unwrap();
        let graph = Grapher::graph(&grapher, &CancellationToken::new())
            .await
            .unwrap();
        let image = graph.roots()[0].as_image().unwrap();
        assert_eq!(image.reference().tag.as_deref(), Some("1.25"));
    }

    #[tokio::test]
    async fn unmatched_digest_keeps_declared_reference() {
        let client = client_with(vec![container("c1", "web-1", "ghcr.io/acme/web:2", &[])]);
        let grapher = DockerGrapher::with_client(client, false).await.unwrap();
        let graph = Grapher::graph(&grapher, &CancellationToken::new())
            .await
            .unwrap();
        let image = graph.roots()[0].as_image().unwrap();
        assert_eq!(image.reference().to_string(), "ghcr.io/acme/web:2");
    }

    #[tokio::test]
    async fn stopped_containers_follow_configuration() {
        let mut stopped = container("c2", "old", "nginx:1.25", &[]);
        stopped.state = "exited".to_owned();
        let containers = vec![container("c1", "web-1", "nginx:1.25", &[]), stopped];

        let running_only = DockerGrapher::with_client(client_with(containers.clone()), false)
            .await
            .unwrap();
        let graph = Grapher::graph(&running_only, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!graph.contains("docker/container/c2"));

        let all = DockerGrapher::with_client(client_with(containers), true)
            .await
            .unwrap();
        let graph = Grapher::graph(&all, &CancellationToken::new())
            .await
            .unwrap();
        assert!(graph.contains("docker/container/c2"));
    }

    #[tokio::test]
    async fn inspect_failure_aborts_cycle() {
        let mut client = client_with(vec![container("c1", "web-1", "nginx:1.25", &[])]);
        client.images.clear();
        let grapher = DockerGrapher::with_client(client, false).await.unwrap();
        let err = Grapher::graph(&grapher, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::DockerApi(_)));
    }

    #[tokio::test]
    async fn list_failure_aborts_cycle() {
        let client = MockDockerClient {
            fail_list: true,
            ..Default::default()
        };
        let grapher = DockerGrapher::with_client(client, false).await.unwrap();
        assert!(
            Grapher::graph(&grapher, &CancellationToken::new())
                .await
                .is_err()
        );
    }

    #[test]
    fn image_id_detection() {
        assert!(is_image_id("sha256:abcdef0123"));
        assert!(!is_image_id("nginx:1.25"));
        assert!(!is_image_id("sha256:"));
    }

    #[test]
    fn tls_connect_requires_certificate_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = DockerGrapherConfig {
            socket: "tcp://127.0.0.1:2376".to_owned(),
            tls_cert_dir: dir.path().display().to_string(),
            ..Default::default()
        };
        let err = BollardDockerClient::connect(&config).err().unwrap();
        assert!(matches!(err, PlatformError::DockerConnection(_)));
        assert!(err.to_string().contains("over TLS"));
    }

}
