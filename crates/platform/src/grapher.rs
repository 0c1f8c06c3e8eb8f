//! Grapher 추상화: 플랫폼 스냅샷 생성 계약
//!
//! - [`Grapher`]: 한 번 호출에 하나의 전체 스냅샷을 만드는 어댑터 (RPITIT)
//! - [`DynGrapher`]: `Box<dyn DynGrapher>`로 저장하기 위한 dyn-compatible 쌍둥이
//! - [`ContinuousGrapher`]: 스냅샷 스트림을 내보내는 소스
//! - [`PollGrapher`]: 임의의 `Grapher`를 주기적 폴링으로 연속 소스로 변환
//! - [`CompoundGrapher`]: 여러 `Grapher`를 동시에 실행해 하나의 스냅샷으로 병합

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use metrics::Counter;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tidewatch_core::metrics as names;
use tidewatch_graph::{Graph, PlatformGraph};

use crate::error::PlatformError;

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 한 번의 호출로 전체 스냅샷을 만드는 어댑터
pub trait Grapher: Send + Sync + 'static {
    /// 로그와 메트릭 레이블에 쓰이는 플랫폼 이름
    fn name(&self) -> &'static str;

    /// 현재 토폴로지의 전체 스냅샷을 생성합니다.
    ///
    /// 사이클 중 하나라도 실패하면 부분 결과 없이 에러를 반환합니다.
    fn graph(
        &self,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<PlatformGraph, PlatformError>> + Send;
}

/// dyn-compatible grapher
///
/// `Grapher`는 RPITIT를 사용하므로 `dyn Grapher`가 불가합니다.
/// 모든 `Grapher`는 blanket impl로 자동으로 `DynGrapher`가 됩니다.
pub trait DynGrapher: Send + Sync {
    fn name(&self) -> &'static str;

    fn graph<'a>(
        &'a self,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<PlatformGraph, PlatformError>>;
}

impl<T: Grapher> DynGrapher for T {
    fn name(&self) -> &'static str {
        Grapher::name(self)
    }

    fn graph<'a>(
        &'a self,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<PlatformGraph, PlatformError>> {
        Box::pin(Grapher::graph(self, token))
    }
}

impl Grapher for Box<dyn DynGrapher> {
    fn name(&self) -> &'static str {
        DynGrapher::name(self.as_ref())
    }

    fn graph(
        &self,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<PlatformGraph, PlatformError>> + Send {
        async move { DynGrapher::graph(self.as_ref(), token).await }
    }
}

/// 연속 스냅샷 소스
///
/// `graph_continuously`가 반환하는 채널은 한 번에 하나의 미처리 스냅샷만 버퍼링하며,
/// 토큰이 취소되거나 `close`가 호출되면 닫힙니다.
pub trait ContinuousGrapher: Send + Sync {
    /// 단발성 스냅샷
    fn graph<'a>(
        &'a self,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<PlatformGraph, PlatformError>>;

    /// 전체 스냅샷 스트림을 시작합니다.
    fn graph_continuously(
        &self,
        token: &CancellationToken,
    ) -> Result<mpsc::Receiver<PlatformGraph>, PlatformError>;

    /// 모든 스트림을 종료하고 자원을 해제합니다.
    fn close(&self) -> Result<(), PlatformError>;
}

/// 스냅샷 사이클 메트릭 핸들
#[derive(Clone)]
pub struct SnapshotMetrics {
    pub snapshots: Counter,
    pub errors: Counter,
}

impl SnapshotMetrics {
    /// 현재 설치된 recorder에 플랫폼 레이블로 등록합니다.
    pub fn register(platform: &'static str) -> Self {
        Self {
            snapshots: metrics::counter!(names::GRAPH_SNAPSHOTS_TOTAL, names::LABEL_PLATFORM => platform),
            errors: metrics::counter!(names::GRAPH_SNAPSHOT_ERRORS_TOTAL, names::LABEL_PLATFORM => platform),
        }
    }

    pub fn noop() -> Self {
        Self {
            snapshots: Counter::noop(),
            errors: Counter::noop(),
        }
    }
}

/// 폴링 기반 연속 소스
///
/// 시작 즉시 한 번, 이후 매 주기마다 변경 여부와 무관하게 전체 스냅샷을 내보냅니다.
/// 변경 감지는 하류의 재조정 엔진이 담당합니다.
pub struct PollGrapher<G> {
    inner: Arc<G>,
    interval: Duration,
    closed: CancellationToken,
    metrics: SnapshotMetrics,
}

impl<G: Grapher> PollGrapher<G> {
    pub fn new(inner: G, interval: Duration) -> Self {
        let metrics = SnapshotMetrics::register(Grapher::name(&inner));
        Self::with_metrics(inner, interval, metrics)
    }

    pub fn with_metrics(inner: G, interval: Duration, metrics: SnapshotMetrics) -> Self {
        Self {
            inner: Arc::new(inner),
            interval,
            closed: CancellationToken::new(),
            metrics,
        }
    }
}

impl<G: Grapher> ContinuousGrapher for PollGrapher<G> {
    fn graph<'a>(
        &'a self,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<PlatformGraph, PlatformError>> {
        if self.closed.is_cancelled() {
            return Box::pin(async { Err(PlatformError::Closed) });
        }
        Box::pin(Grapher::graph(self.inner.as_ref(), token))
    }

    fn graph_continuously(
        &self,
        token: &CancellationToken,
    ) -> Result<mpsc::Receiver<PlatformGraph>, PlatformError> {
        if self.closed.is_cancelled() {
            return Err(PlatformError::Closed);
        }

        let (tx, rx) = mpsc::channel(1);
        let inner = Arc::clone(&self.inner);
        let interval = self.interval;
        let metrics = self.metrics.clone();
        // close() 또는 호출자 취소 중 하나라도 발생하면 종료
        let stop = self.closed.child_token();
        let token = token.clone();

        tokio::spawn(async move {
            let platform = Grapher::name(inner.as_ref());
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(platform, interval_secs = interval.as_secs(), "poll grapher started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let graph = match Grapher::graph(inner.as_ref(), &token).await {
                    Ok(graph) => graph,
                    Err(PlatformError::Cancelled) => break,
                    Err(e) => {
                        metrics.errors.increment(1);
                        warn!(platform, error = %e, "snapshot cycle failed, skipping");
                        continue;
                    }
                };
                metrics.snapshots.increment(1);
                debug!(platform, nodes = graph.len(), "snapshot produced");

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = stop.cancelled() => break,
                    sent = tx.send(graph) => {
                        if sent.is_err() {
                            debug!(platform, "snapshot receiver dropped");
                            break;
                        }
                    }
                }
            }
            info!(platform, "poll grapher stopped");
        });

        Ok(rx)
    }

    fn close(&self) -> Result<(), PlatformError> {
        self.closed.cancel();
        Ok(())
    }
}

/// 여러 소스를 하나로 병합하는 grapher
///
/// 모든 소스를 동시에 실행합니다. 하나라도 실패하면 전체 스냅샷이 실패하며
/// 모든 에러가 [`PlatformError::Multiple`]로 합쳐집니다.
pub struct CompoundGrapher {
    graphers: Vec<Box<dyn DynGrapher>>,
}

impl CompoundGrapher {
    pub fn new(graphers: Vec<Box<dyn DynGrapher>>) -> Self {
        Self { graphers }
    }

    pub fn len(&self) -> usize {
        self.graphers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphers.is_empty()
    }
}

impl Grapher for CompoundGrapher {
    fn name(&self) -> &'static str {
        "compound"
    }

    async fn graph(&self, token: &CancellationToken) -> Result<PlatformGraph, PlatformError> {
        let results = futures::future::join_all(
            self.graphers
                .iter()
                .map(|g| DynGrapher::graph(g.as_ref(), token)),
        )
        .await;

        let mut merged = Graph::new();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(graph) => merged.merge(graph),
                Err(e) => errors.push(e),
            }
        }

        match errors.len() {
            0 => Ok(merged),
            1 => Err(errors.remove(0)),
            _ => Err(PlatformError::Multiple(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tidewatch_core::types::ImageReference;
    use tidewatch_graph::PlatformNode;

    use super::*;

    /// 호출마다 이미지 하나짜리 그래프를 반환하거나 실패하는 grapher
    struct FixedGrapher {
        image: &'static str,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FixedGrapher {
        fn ok(image: &'static str) -> Self {
            Self {
                image,
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing() -> Self {
            Self {
                image: "unused",
                fail: true,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Grapher for FixedGrapher {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn graph(&self, _token: &CancellationToken) -> Result<PlatformGraph, PlatformError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PlatformError::DockerApi("boom".to_owned()));
            }
            let mut graph = Graph::new();
            graph.insert_tree([PlatformNode::image(ImageReference::parse(self.image).unwrap())]);
            Ok(graph)
        }
    }

    #[tokio::test]
    async fn compound_merges_all_sources() {
        let compound = CompoundGrapher::new(vec![
            Box::new(FixedGrapher::ok("nginx")),
            Box::new(FixedGrapher::ok("redis")),
        ]);
        let graph = Grapher::graph(&compound, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(graph.roots().len(), 2);
    }

    #[tokio::test]
    async fn compound_fails_when_any_source_fails() {
        let compound = CompoundGrapher::new(vec![
            Box::new(FixedGrapher::ok("nginx")),
            Box::new(FixedGrapher::failing()),
            Box::new(FixedGrapher::failing()),
        ]);
        let err = Grapher::graph(&compound, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            PlatformError::Multiple(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected joined errors, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_emits_immediately_then_every_interval() {
        let inner = FixedGrapher::ok("nginx");
        let calls = Arc::clone(&inner.calls);
        let poller =
            PollGrapher::with_metrics(inner, Duration::from_secs(30), SnapshotMetrics::noop());
        let token = CancellationToken::new();
        let mut rx = poller.graph_continuously(&token).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.len(), 1);

        let second = rx.recv().await.unwrap();
        assert_eq!(second, first);
        assert!(calls.load(Ordering::SeqCst) >= 2);

        token.cancel();
        // 남은 버퍼를 비운 뒤 채널이 닫혀야 함
        while rx.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn poll_accepts_boxed_source() {
        let boxed: Box<dyn DynGrapher> = Box::new(FixedGrapher::ok("redis:7"));
        assert_eq!(Grapher::name(&boxed), "fixed");

        let poller = PollGrapher::with_metrics(boxed, Duration::from_secs(5), SnapshotMetrics::noop());
        let token = CancellationToken::new();
        let mut rx = poller.graph_continuously(&token).unwrap();
        assert_eq!(rx.recv().await.unwrap().roots().len(), 1);
        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn poll_skips_failed_cycles() {
        let poller = PollGrapher::with_metrics(
            FixedGrapher::failing(),
            Duration::from_secs(1),
            SnapshotMetrics::noop(),
        );
        let token = CancellationToken::new();
        let mut rx = poller.graph_continuously(&token).unwrap();

        let waited = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(waited.is_err(), "failed cycles must not emit snapshots");
        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn close_ends_stream_and_rejects_new_streams() {
        let poller = PollGrapher::with_metrics(
            FixedGrapher::ok("nginx"),
            Duration::from_secs(10),
            SnapshotMetrics::noop(),
        );
        let token = CancellationToken::new();
        let mut rx = poller.graph_continuously(&token).unwrap();
        assert!(rx.recv().await.is_some());

        poller.close().unwrap();
        while rx.recv().await.is_some() {}

        assert!(matches!(
            poller.graph_continuously(&token),
            Err(PlatformError::Closed)
        ));
        assert!(matches!(
            ContinuousGrapher::graph(&poller, &token).await,
            Err(PlatformError::Closed)
        ));
    }
}
