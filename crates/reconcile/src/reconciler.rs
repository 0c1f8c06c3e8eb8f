//! 재조정 엔진
//!
//! 스냅샷 하나를 받을 때마다 단일 패스로 스토어를 갱신합니다:
//!
//! 1. ignore 라벨이 붙은 노드 제거. 이미지에서 뻗어 나가는 모든 참조 경로에
//!    ignore 노드가 있으면 그 이미지는 제외
//! 2. 루트 열거. 이미지가 아닌 루트(제거 후 남은 조각)는 건너뜀
//! 3. 루트마다 서브그래프를 추출해 [`RawImage`]로 변환
//! 4. upsert. 새로 생성된 이미지만 작업 큐에 push
//! 5. 관찰되지 않은 이미지 삭제
//! 6. 변경이 있으면 [`ChangeEvent`] 한 번 브로드캐스트
//!
//! 개별 이미지의 스토리지 실패는 기록만 하고 패스를 계속 진행합니다.
//!
//! [`RawImage`]: crate::model::RawImage

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use metrics::{Counter, Gauge, Histogram};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tidewatch_core::event::ChangeEvent;
use tidewatch_core::hub::Hub;
use tidewatch_core::metrics as names;
use tidewatch_core::types::ImageReference;
use tidewatch_graph::{Node, PlatformGraph};
use tidewatch_platform::ContinuousGrapher;

use crate::error::ReconcileError;
use crate::mapper::map_image;
use crate::queue::WorkQueue;
use crate::store::ImageStore;

/// 재조정 메트릭 핸들
#[derive(Clone)]
pub struct ReconcileMetrics {
    pub passes: Counter,
    pub inserted: Counter,
    pub removed: Counter,
    pub store_errors: Counter,
    pub observed: Gauge,
    pub duration: Histogram,
}

impl ReconcileMetrics {
    pub fn register() -> Self {
        Self {
            passes: metrics::counter!(names::RECONCILE_PASSES_TOTAL),
            inserted: metrics::counter!(names::RECONCILE_IMAGES_INSERTED_TOTAL),
            removed: metrics::counter!(names::RECONCILE_IMAGES_REMOVED_TOTAL),
            store_errors: metrics::counter!(names::RECONCILE_STORE_ERRORS_TOTAL),
            observed: metrics::gauge!(names::RECONCILE_OBSERVED_IMAGES),
            duration: metrics::histogram!(names::RECONCILE_DURATION_SECONDS),
        }
    }

    pub fn noop() -> Self {
        Self {
            passes: Counter::noop(),
            inserted: Counter::noop(),
            removed: Counter::noop(),
            store_errors: Counter::noop(),
            observed: Gauge::noop(),
            duration: Histogram::noop(),
        }
    }
}

/// 한 패스의 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// 스냅샷에서 관찰된 이미지 수
    pub observed: usize,
    /// 새로 생성된 이미지 수
    pub inserted: usize,
    /// 삭제된 이미지 수
    pub removed: u64,
    /// 실패한 스토리지 호출 수
    pub store_errors: usize,
    /// 모든 참조 리소스가 ignore되어 제외된 이미지 수
    pub ignored: usize,
}

impl PassReport {
    pub fn has_changes(&self) -> bool {
        self.inserted > 0 || self.removed > 0
    }
}

/// 재조정 엔진
pub struct Reconciler<S> {
    store: S,
    queue: WorkQueue<ImageReference>,
    hub: Hub<ChangeEvent>,
    metrics: ReconcileMetrics,
}

impl<S: ImageStore> Reconciler<S> {
    pub fn new(
        store: S,
        queue: WorkQueue<ImageReference>,
        hub: Hub<ChangeEvent>,
        metrics: ReconcileMetrics,
    ) -> Self {
        Self {
            store,
            queue,
            hub,
            metrics,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 스냅샷 하나를 재조정합니다.
    pub async fn reconcile(&self, token: &CancellationToken, mut graph: PlatformGraph) -> PassReport {
        let started = Instant::now();
        let mut report = PassReport::default();

        let shadowed = fully_ignored_images(&graph);
        let pruned = graph.delete_func(|n| n.labels().ignore());
        if pruned > 0 {
            debug!(pruned, "ignored nodes pruned");
        }

        let mut observed: Vec<ImageReference> = Vec::new();
        for root in graph.roots() {
            let Some(image) = root.as_image() else {
                debug!(node = root.id(), "skipping non-image root");
                continue;
            };
            if shadowed.contains(root.id()) {
                debug!(image = root.id(), "every referrer path ignored, skipping image");
                report.ignored += 1;
                continue;
            }

            let subgraph = graph.subgraph(root.id());
            let Some(raw) = map_image(&subgraph, image) else {
                continue;
            };
            let reference = raw.reference.clone();
            observed.push(reference.clone());

            match self.store.insert_raw_image(raw).await {
                Ok(true) => {
                    report.inserted += 1;
                    debug!(image = %reference, "new image observed");
                    self.queue.push([reference]);
                }
                Ok(false) => {}
                Err(e) => {
                    report.store_errors += 1;
                    self.metrics.store_errors.increment(1);
                    warn!(image = %reference, error = %e, "failed to store image");
                }
            }
        }
        report.observed = observed.len();

        match self.store.delete_non_present(&observed).await {
            Ok(removed) => report.removed = removed,
            Err(e) => {
                report.store_errors += 1;
                self.metrics.store_errors.increment(1);
                warn!(error = %e, "failed to delete absent images");
            }
        }

        if report.has_changes() {
            let event = ChangeEvent::new(report.inserted, report.removed);
            if let Err(e) = self.hub.broadcast(token, event).await {
                debug!(error = %e, "change event not delivered");
            }
        }

        self.metrics.passes.increment(1);
        self.metrics.inserted.increment(report.inserted as u64);
        self.metrics.removed.increment(report.removed);
        self.metrics.observed.set(report.observed as f64);
        self.metrics
            .duration
            .record(started.elapsed().as_secs_f64());

        info!(
            observed = report.observed,
            inserted = report.inserted,
            removed = report.removed,
            store_errors = report.store_errors,
            "reconcile pass complete"
        );
        report
    }

    /// 소스의 스냅샷 스트림이 끝날 때까지 패스를 반복합니다.
    pub async fn run(
        &self,
        grapher: &dyn ContinuousGrapher,
        token: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let mut snapshots = grapher.graph_continuously(token)?;
        info!("reconciler started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                snapshot = snapshots.recv() => match snapshot {
                    Some(graph) => {
                        self.reconcile(token, graph).await;
                    }
                    None => break,
                },
            }
        }

        info!("reconciler stopped");
        Ok(())
    }
}

/// 제거 전 그래프에서, 참조 경로가 하나 이상이고 그 모든 경로가
/// ignore 노드를 지나는 이미지 ID
fn fully_ignored_images(graph: &PlatformGraph) -> HashSet<String> {
    let mut memo = HashMap::new();
    graph
        .nodes()
        .filter(|n| n.as_image().is_some())
        .filter(|n| {
            let children: Vec<String> = graph.children(n.id()).map(|c| c.id().to_owned()).collect();
            !children.is_empty()
                && children
                    .iter()
                    .all(|c| every_path_ignored(graph, c, &mut memo))
        })
        .map(|n| n.id().to_owned())
        .collect()
}

/// `id`에서 잎까지의 모든 경로에 ignore 노드가 있는지
fn every_path_ignored(
    graph: &PlatformGraph,
    id: &str,
    memo: &mut HashMap<String, bool>,
) -> bool {
    if let Some(&known) = memo.get(id) {
        return known;
    }
    // 순환 시 방문 중인 노드는 무시되지 않은 것으로 취급
    memo.insert(id.to_owned(), false);

    let Some(node) = graph.node(id) else {
        return false;
    };
    let result = if node.labels().ignore() {
        true
    } else {
        let children: Vec<String> = graph.children(id).map(|c| c.id().to_owned()).collect();
        !children.is_empty()
            && children
                .iter()
                .all(|c| every_path_ignored(graph, c, memo))
    };
    memo.insert(id.to_owned(), result);
    result
}
