//! 큐 처리 워커
//!
//! 작업 큐에서 이미지를 하나씩 꺼내 처리 시각을 기록합니다.
//! 큐가 닫히거나 토큰이 취소되면 종료합니다.

use std::time::SystemTime;

use metrics::Counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tidewatch_core::error::StorageError;
use tidewatch_core::metrics as names;
use tidewatch_core::types::ImageReference;

use crate::queue::Pull;
use crate::store::ImageStore;

/// 워커 결과 카운터
#[derive(Clone)]
pub struct WorkerMetrics {
    pub processed: Counter,
    pub failed: Counter,
}

impl WorkerMetrics {
    pub fn register() -> Self {
        Self {
            processed: metrics::counter!(names::WORKER_PROCESSED_TOTAL, names::LABEL_RESULT => "ok"),
            failed: metrics::counter!(names::WORKER_PROCESSED_TOTAL, names::LABEL_RESULT => "error"),
        }
    }

    pub fn noop() -> Self {
        Self {
            processed: Counter::noop(),
            failed: Counter::noop(),
        }
    }
}

/// 큐 소비 워커
pub struct Worker<S> {
    id: usize,
    store: S,
    metrics: WorkerMetrics,
}

impl<S: ImageStore> Worker<S> {
    pub fn new(id: usize, store: S, metrics: WorkerMetrics) -> Self {
        Self { id, store, metrics }
    }

    /// 이미지 하나를 처리합니다.
    ///
    /// 큐에 들어간 뒤 스토어에서 삭제된 이미지는 `NotFound`로 실패합니다.
    pub async fn process(&self, reference: &ImageReference) -> Result<(), StorageError> {
        self.store.mark_processed(reference, SystemTime::now()).await
    }

    /// 큐가 닫히거나 토큰이 취소될 때까지 처리합니다. 처리한 항목 수를 반환합니다.
    pub async fn run(&self, mut pull: Pull<ImageReference>, token: &CancellationToken) -> usize {
        debug!(worker = self.id, "worker started");
        let mut handled = 0usize;

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => None,
                item = pull.next() => item,
            };
            let Some(reference) = next else {
                break;
            };

            match self.process(&reference).await {
                Ok(()) => {
                    self.metrics.processed.increment(1);
                    debug!(worker = self.id, image = %reference, "image processed");
                }
                Err(StorageError::NotFound(_)) => {
                    self.metrics.failed.increment(1);
                    debug!(worker = self.id, image = %reference, "image removed before processing");
                }
                Err(e) => {
                    self.metrics.failed.increment(1);
                    warn!(worker = self.id, image = %reference, error = %e, "failed to process image");
                }
            }
            handled += 1;
        }

        info!(worker = self.id, handled, "worker stopped");
        handled
    }
}
