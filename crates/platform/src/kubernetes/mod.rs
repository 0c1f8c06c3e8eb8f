//! Kubernetes 어댑터
//!
//! 리소스 종류마다 reflector(watch 캐시)를 하나씩 띄우고, 캐시 이벤트마다
//! 트리거를 넣습니다. 모든 캐시가 준비되면 스냅샷을 정확히 한 번 내보낸 뒤,
//! 디바운스된 트리거마다 캐시 상태 전체로 그래프를 다시 만듭니다.
//!
//! ```text
//! reflector(ns) ─┐
//! reflector(rs) ─┼─▶ trigger(cap) ─▶ debounce ─▶ build_graph ─▶ snapshot(cap 1)
//! reflector(po) ─┘
//! ```

mod build;

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::ListParams;
use kube::runtime::reflector::{self, Store};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tidewatch_graph::PlatformGraph;

use crate::config::KubernetesGrapherConfig;
use crate::debounce::debounce;
use crate::error::PlatformError;
use crate::grapher::{BoxFuture, ContinuousGrapher, SnapshotMetrics};

pub use build::{ClusterState, INTERNAL_INIT_CONTAINER, INTERNAL_POD_PHASE, build_graph};

const PLATFORM: &str = "kubernetes";

/// 감시 중인 모든 리소스 캐시
struct Stores {
    namespaces: Store<Namespace>,
    deployments: Store<Deployment>,
    daemon_sets: Store<DaemonSet>,
    replica_sets: Store<ReplicaSet>,
    stateful_sets: Store<StatefulSet>,
    cron_jobs: Store<CronJob>,
    jobs: Store<Job>,
    pods: Store<Pod>,
}

impl Stores {
    fn spawn(client: &Client, token: &CancellationToken, trigger: &mpsc::Sender<()>) -> Self {
        Self {
            namespaces: spawn_reflector(client.clone(), token.clone(), trigger.clone()),
            deployments: spawn_reflector(client.clone(), token.clone(), trigger.clone()),
            daemon_sets: spawn_reflector(client.clone(), token.clone(), trigger.clone()),
            replica_sets: spawn_reflector(client.clone(), token.clone(), trigger.clone()),
            stateful_sets: spawn_reflector(client.clone(), token.clone(), trigger.clone()),
            cron_jobs: spawn_reflector(client.clone(), token.clone(), trigger.clone()),
            jobs: spawn_reflector(client.clone(), token.clone(), trigger.clone()),
            pods: spawn_reflector(client.clone(), token.clone(), trigger.clone()),
        }
    }

    /// 모든 캐시가 첫 목록 조회를 마칠 때까지 기다립니다.
    async fn wait_until_ready(&self) -> Result<(), PlatformError> {
        let not_ready = |e: reflector::store::WriterDropped| {
            PlatformError::KubernetesApi(format!("watch cache stopped before ready: {e}"))
        };
        self.namespaces.wait_until_ready().await.map_err(not_ready)?;
        self.deployments.wait_until_ready().await.map_err(not_ready)?;
        self.daemon_sets.wait_until_ready().await.map_err(not_ready)?;
        self.replica_sets.wait_until_ready().await.map_err(not_ready)?;
        self.stateful_sets.wait_until_ready().await.map_err(not_ready)?;
        self.cron_jobs.wait_until_ready().await.map_err(not_ready)?;
        self.jobs.wait_until_ready().await.map_err(not_ready)?;
        self.pods.wait_until_ready().await.map_err(not_ready)?;
        Ok(())
    }

    fn state(&self) -> ClusterState {
        ClusterState {
            namespaces: self.namespaces.state(),
            deployments: self.deployments.state(),
            daemon_sets: self.daemon_sets.state(),
            replica_sets: self.replica_sets.state(),
            stateful_sets: self.stateful_sets.state(),
            cron_jobs: self.cron_jobs.state(),
            jobs: self.jobs.state(),
            pods: self.pods.state(),
        }
    }
}

/// 리소스 종류 `K`의 reflector를 백그라운드로 실행하고 읽기 캐시를 반환합니다.
///
/// 이벤트마다 트리거를 `try_send`하며, 트리거 채널이 가득 차 있으면
/// 이미 대기 중인 트리거가 있으므로 버립니다.
fn spawn_reflector<K>(
    client: Client,
    token: CancellationToken,
    trigger: mpsc::Sender<()>,
) -> Store<K>
where
    K: kube::Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    let (reader, writer) = reflector::store::<K>();
    let api: Api<K> = Api::all(client);
    let kind = K::kind(&K::DynamicType::default()).into_owned();

    tokio::spawn(async move {
        let stream = reflector::reflector(writer, watcher(api, watcher::Config::default()))
            .default_backoff();
        let mut stream = pin!(stream);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = stream.next() => match event {
                    Some(Ok(_)) => {
                        let _ = trigger.try_send(());
                    }
                    Some(Err(e)) => warn!(kind = %kind, error = %e, "watch error"),
                    None => break,
                },
            }
        }
        debug!(kind = %kind, "reflector stopped");
    });

    reader
}

async fn list_all<K>(client: &Client) -> Result<Vec<Arc<K>>, PlatformError>
where
    K: kube::Resource + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    let api: Api<K> = Api::all(client.clone());
    let list = api.list(&ListParams::default()).await.map_err(|e| {
        PlatformError::KubernetesApi(format!(
            "list {} failed: {e}",
            K::kind(&K::DynamicType::default())
        ))
    })?;
    Ok(list.items.into_iter().map(Arc::new).collect())
}

/// Kubernetes 연속 스냅샷 소스
pub struct KubernetesGrapher {
    client: Client,
    config: KubernetesGrapherConfig,
    closed: CancellationToken,
    metrics: SnapshotMetrics,
}

impl KubernetesGrapher {
    /// 기본 kubeconfig(또는 in-cluster 설정)로 연결하고 API 서버 응답을 확인합니다.
    pub async fn connect(config: KubernetesGrapherConfig) -> Result<Self, PlatformError> {
        config.validate()?;
        let client = Client::try_default()
            .await
            .map_err(|e| PlatformError::KubernetesConnection(format!("client setup failed: {e}")))?;
        let version = client.apiserver_version().await.map_err(|e| {
            PlatformError::KubernetesConnection(format!("api server unreachable: {e}"))
        })?;
        info!(
            version = %version.git_version,
            debounce_ms = config.debounce_ms,
            "kubernetes grapher connected"
        );
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: KubernetesGrapherConfig) -> Self {
        Self {
            client,
            config,
            closed: CancellationToken::new(),
            metrics: SnapshotMetrics::register(PLATFORM),
        }
    }

    /// 모든 리소스를 직접 목록 조회해 만든 상태
    async fn list_state(client: &Client) -> Result<ClusterState, PlatformError> {
        let (namespaces, deployments, daemon_sets, replica_sets, stateful_sets, cron_jobs, jobs, pods) =
            tokio::try_join!(
                list_all::<Namespace>(client),
                list_all::<Deployment>(client),
                list_all::<DaemonSet>(client),
                list_all::<ReplicaSet>(client),
                list_all::<StatefulSet>(client),
                list_all::<CronJob>(client),
                list_all::<Job>(client),
                list_all::<Pod>(client),
            )?;
        Ok(ClusterState {
            namespaces,
            deployments,
            daemon_sets,
            replica_sets,
            stateful_sets,
            cron_jobs,
            jobs,
            pods,
        })
    }
}

/// 스냅샷을 만들어 전송합니다. 수신자가 사라지거나 취소되면 false를 반환합니다.
///
/// 빌드에 실패한 스냅샷은 건너뛰고 true를 반환합니다.
async fn emit<S>(
    snapshot: &S,
    tx: &mpsc::Sender<PlatformGraph>,
    scope: &CancellationToken,
    metrics: &SnapshotMetrics,
) -> bool
where
    S: Fn() -> Result<PlatformGraph, PlatformError>,
{
    let graph = match snapshot() {
        Ok(graph) => graph,
        Err(e) => {
            metrics.errors.increment(1);
            warn!(platform = PLATFORM, error = %e, "snapshot build failed, skipping");
            return true;
        }
    };
    metrics.snapshots.increment(1);
    debug!(platform = PLATFORM, nodes = graph.len(), "snapshot produced");

    tokio::select! {
        _ = scope.cancelled() => false,
        sent = tx.send(graph) => sent.is_ok(),
    }
}

/// 캐시 동기화 이후의 스냅샷 루프
///
/// `ready`가 끝나면 동기화 중 쌓인 트리거를 버리고 스냅샷을 정확히 한 번
/// 내보냅니다. 이후 디바운스된 트리거마다 `snapshot`으로 전체 그래프를
/// 다시 만듭니다. 루프가 끝나면 `scope`를 취소합니다.
async fn watch_loop<R, S>(
    ready: R,
    mut triggers: mpsc::Receiver<()>,
    window: Duration,
    snapshot: S,
    tx: mpsc::Sender<PlatformGraph>,
    scope: CancellationToken,
    metrics: SnapshotMetrics,
) where
    R: Future<Output = Result<(), PlatformError>>,
    S: Fn() -> Result<PlatformGraph, PlatformError>,
{
    tokio::select! {
        _ = scope.cancelled() => return,
        ready = ready => {
            if let Err(e) = ready {
                warn!(platform = PLATFORM, error = %e, "watch caches failed to sync");
                scope.cancel();
                return;
            }
        }
    }
    info!(platform = PLATFORM, "watch caches synced");

    // 초기 동기화 중 쌓인 트리거는 첫 스냅샷에 이미 반영됨
    while triggers.try_recv().is_ok() {}
    if !emit(&snapshot, &tx, &scope, &metrics).await {
        scope.cancel();
        return;
    }

    let mut debounced = debounce(scope.clone(), window, triggers);
    loop {
        tokio::select! {
            _ = scope.cancelled() => break,
            trigger = debounced.recv() => {
                if trigger.is_none() || !emit(&snapshot, &tx, &scope, &metrics).await {
                    break;
                }
            }
        }
    }
    scope.cancel();
    info!(platform = PLATFORM, "kubernetes grapher stopped");
}

impl ContinuousGrapher for KubernetesGrapher {
    fn graph<'a>(
        &'a self,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<PlatformGraph, PlatformError>> {
        Box::pin(async move {
            if self.closed.is_cancelled() {
                return Err(PlatformError::Closed);
            }
            let state = tokio::select! {
                _ = token.cancelled() => return Err(PlatformError::Cancelled),
                state = Self::list_state(&self.client) => state?,
            };
            build_graph(&state)
        })
    }

    fn graph_continuously(
        &self,
        token: &CancellationToken,
    ) -> Result<mpsc::Receiver<PlatformGraph>, PlatformError> {
        if self.closed.is_cancelled() {
            return Err(PlatformError::Closed);
        }

        // close() 또는 호출자 취소 시 reflector를 포함한 모든 태스크 종료
        let scope = self.closed.child_token();
        {
            let scope = scope.clone();
            let caller = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = caller.cancelled() => scope.cancel(),
                    _ = scope.cancelled() => {}
                }
            });
        }

        let (trigger_tx, trigger_rx) = mpsc::channel(self.config.trigger_buffer);
        let stores = Stores::spawn(&self.client, &scope, &trigger_tx);
        drop(trigger_tx);

        let (tx, rx) = mpsc::channel(1);
        let window = self.config.debounce();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            watch_loop(
                stores.wait_until_ready(),
                trigger_rx,
                window,
                || build_graph(&stores.state()),
                tx,
                scope,
                metrics,
            )
            .await;
        });

        Ok(rx)
    }

    fn close(&self) -> Result<(), PlatformError> {
        self.closed.cancel();
        Ok(())
    }
}
