//! 데몬 조립과 수명주기
//!
//! [`Orchestrator`]는 설정을 검증하고 플랫폼 소스, 이미지 스토어, 작업 큐,
//! 이벤트 허브를 만든 뒤 백그라운드 태스크를 띄웁니다.
//!
//! # 태스크
//!
//! - 재조정 루프 1개 (소스의 스냅샷 스트림 소비)
//! - 큐 워커 N개
//! - 재처리 스캐너 1개 (`refresh_interval_secs > 0`일 때)
//! - 변경 이벤트 로거 1개
//!
//! # 종료 순서
//!
//! 1. 토큰 취소 → 재조정 루프, 재처리 스캐너, 이벤트 로거 종료 대기
//! 2. 큐 닫기 → 워커 종료 대기
//! 3. 스토어 스냅샷 저장 (경로가 설정된 경우)
//! 4. 소스 닫기

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tidewatch_core::config::TidewatchConfig;
use tidewatch_core::event::ChangeEvent;
use tidewatch_core::hub::Hub;
use tidewatch_core::types::ImageReference;
use tidewatch_platform::{ContinuousGrapher, source};
use tidewatch_reconcile::{
    MemoryReader, MemoryStore, QueueMetrics, ReconcileError, ReconcileMetrics, Reconciler, RefreshPolicy,
    Refresher, WorkQueue, Worker, WorkerMetrics,
};

use crate::metrics_server;
use crate::pid_file::PidFile;

/// 데몬 조립체
pub struct Orchestrator {
    config: TidewatchConfig,
    grapher: Arc<dyn ContinuousGrapher>,
    store: MemoryStore,
    queue: WorkQueue<ImageReference>,
    hub: Hub<ChangeEvent>,
    token: CancellationToken,
}

impl Orchestrator {
    /// 이미 로드된 설정으로 조립합니다.
    ///
    /// 활성화된 소스 중 하나라도 연결에 실패하면 에러를 반환합니다.
    pub async fn build_from_config(config: TidewatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let grapher: Arc<dyn ContinuousGrapher> = Arc::from(
            source::connect(&config)
                .await
                .map_err(|e| anyhow::anyhow!("failed to connect platform source: {e}"))?,
        );

        let store = if config.store.is_persistent() {
            MemoryStore::open(&config.store.path)
                .await
                .map_err(|e| anyhow::anyhow!("failed to open image store: {e}"))?
        } else {
            MemoryStore::new()
        };
        tracing::info!(
            images = store.len().await,
            persistent = config.store.is_persistent(),
            "image store ready"
        );

        let queue =
            WorkQueue::with_metrics(config.queue.burst, config.queue.tick(), QueueMetrics::register());

        Ok(Self {
            config,
            grapher,
            store,
            queue,
            hub: Hub::new(),
            token: CancellationToken::new(),
        })
    }

    /// SIGTERM 또는 SIGINT를 받을 때까지 실행합니다.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// `shutdown`이 완료되거나 재조정 루프가 끝날 때까지 실행한 뒤 정리합니다.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let _pid_file = if self.config.general.pid_file.is_empty() {
            None
        } else {
            Some(PidFile::create(&self.config.general.pid_file)?)
        };

        let token = self.token.clone();
        let change_logger = spawn_change_logger(self.hub.subscribe(&token).await, token.clone());
        let mut reconciler = self.spawn_reconciler();
        let workers = self.spawn_workers();
        let refresher = self.spawn_refresher();

        tracing::info!(workers = workers.len(), "tidewatch-daemon running");

        let mut outcome: Result<()> = Ok(());
        tokio::select! {
            signal = shutdown => match signal {
                Ok(name) => tracing::info!(signal = name, "shutdown signal received"),
                Err(e) => outcome = Err(e),
            },
            finished = &mut reconciler => {
                outcome = match finished {
                    Ok(Ok(())) => Err(anyhow::anyhow!("snapshot stream ended unexpectedly")),
                    Ok(Err(e)) => Err(anyhow::anyhow!("reconciler failed: {e}")),
                    Err(e) => Err(anyhow::anyhow!("reconciler task panicked: {e}")),
                };
                tracing::error!("reconciler stopped before shutdown was requested");
            }
        }

        token.cancel();
        if !reconciler.is_finished() {
            join_logged("reconciler", reconciler).await;
        }
        if let Some(task) = refresher {
            join_logged("refresher", task).await;
        }
        join_logged("change logger", change_logger).await;

        self.queue.close();
        for task in workers {
            join_logged("worker", task).await;
        }

        if self.config.store.is_persistent()
            && let Err(e) = self.store.persist().await
        {
            tracing::error!(error = %e, "failed to persist image store");
        }
        if let Err(e) = self.grapher.close() {
            tracing::warn!(error = %e, "failed to close platform source");
        }

        tracing::info!("tidewatch-daemon shut down");
        outcome
    }

    fn spawn_reconciler(&self) -> JoinHandle<Result<(), ReconcileError>> {
        let reconciler = Reconciler::new(
            self.store.clone(),
            self.queue.clone(),
            self.hub.clone(),
            ReconcileMetrics::register(),
        );
        let grapher = Arc::clone(&self.grapher);
        let token = self.token.clone();
        tokio::spawn(async move { reconciler.run(grapher.as_ref(), &token).await })
    }

    fn spawn_workers(&self) -> Vec<JoinHandle<usize>> {
        let metrics = WorkerMetrics::register();
        (0..self.config.processing.workers)
            .map(|id| {
                let worker = Worker::new(id, self.store.clone(), metrics.clone());
                let pull = self.queue.pull();
                let token = self.token.clone();
                tokio::spawn(async move { worker.run(pull, &token).await })
            })
            .collect()
    }

    fn spawn_refresher(&self) -> Option<JoinHandle<()>> {
        let Some(policy) = RefreshPolicy::from_core(&self.config.processing) else {
            tracing::info!("stale image refresh disabled");
            return None;
        };
        let refresher = Refresher::new(self.store.clone(), self.queue.clone(), policy);
        let token = self.token.clone();
        Some(tokio::spawn(async move { refresher.run(&token).await }))
    }

    /// 읽기 전용 조회 핸들 (재조정 루프와 같은 저장소를 공유)
    pub fn reader(&self) -> MemoryReader {
        self.store.reader()
    }

    pub fn hub(&self) -> &Hub<ChangeEvent> {
        &self.hub
    }
}

/// SIGTERM/SIGINT 중 먼저 도착한 시그널 이름
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {e}"))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {e}"))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// 변경 이벤트를 감사 로그로 남기는 태스크
fn spawn_change_logger(
    mut events: tokio::sync::mpsc::Receiver<ChangeEvent>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => tracing::info!(
                        event_id = %event.id,
                        origin = %event.metadata,
                        delay_ms = event.metadata.age().as_millis() as u64,
                        inserted = event.inserted,
                        removed = event.removed,
                        "image inventory changed"
                    ),
                    None => break,
                },
            }
        }
        tracing::debug!("change logger stopped");
    })
}

async fn join_logged<T>(task: &'static str, handle: JoinHandle<T>) {
    if let Err(e) = handle.await {
        tracing::error!(task, error = %e, "background task panicked");
    }
}
