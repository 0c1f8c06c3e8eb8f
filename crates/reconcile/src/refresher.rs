//! 주기적 재처리
//!
//! 오래 전에 처리되었거나 처리된 적 없는 이미지를 주기마다 최대 `items`개
//! 작업 큐에 다시 넣습니다.

use std::time::{Duration, SystemTime};

use metrics::Counter;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tidewatch_core::metrics as names;
use tidewatch_core::types::ImageReference;

use crate::error::ReconcileError;
use crate::queue::WorkQueue;
use crate::store::ImageStore;

/// 재처리 설정
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    /// 스캔 주기
    pub interval: Duration,
    /// 이보다 오래 전에 처리된 이미지만 대상
    pub min_age: Duration,
    /// 한 번에 큐에 넣을 최대 개수
    pub items: usize,
}

impl RefreshPolicy {
    pub fn from_core(core: &tidewatch_core::config::ProcessingConfig) -> Option<Self> {
        if core.refresh_interval_secs == 0 {
            return None;
        }
        Some(Self {
            interval: Duration::from_secs(core.refresh_interval_secs),
            min_age: Duration::from_secs(core.refresh_min_age_secs),
            items: core.refresh_items,
        })
    }
}

/// 재처리 스캐너
pub struct Refresher<S> {
    store: S,
    queue: WorkQueue<ImageReference>,
    policy: RefreshPolicy,
    requeued: Counter,
}

impl<S: ImageStore> Refresher<S> {
    pub fn new(store: S, queue: WorkQueue<ImageReference>, policy: RefreshPolicy) -> Self {
        Self::with_counter(
            store,
            queue,
            policy,
            metrics::counter!(names::REFRESH_REQUEUED_TOTAL),
        )
    }

    pub fn with_counter(
        store: S,
        queue: WorkQueue<ImageReference>,
        policy: RefreshPolicy,
        requeued: Counter,
    ) -> Self {
        Self {
            store,
            queue,
            policy,
            requeued,
        }
    }

    /// 한 번 스캔해 큐에 넣은 이미지 수를 반환합니다.
    pub async fn refresh_once(&self, now: SystemTime) -> Result<usize, ReconcileError> {
        let cutoff = now
            .checked_sub(self.policy.min_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let stale = self.store.stale_images(cutoff, self.policy.items).await?;
        let count = stale.len();
        if count > 0 {
            self.queue.push(stale);
            self.requeued.increment(count as u64);
        }
        Ok(count)
    }

    /// 토큰이 취소될 때까지 주기적으로 스캔합니다. 첫 스캔은 한 주기 뒤에 실행됩니다.
    pub async fn run(&self, token: &CancellationToken) {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.policy.interval, self.policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_secs = self.policy.interval.as_secs(),
            min_age_secs = self.policy.min_age.as_secs(),
            items = self.policy.items,
            "refresher started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.refresh_once(SystemTime::now()).await {
                Ok(count) => debug!(count, "stale images requeued"),
                Err(e) => warn!(error = %e, "refresh scan failed"),
            }
        }
        info!("refresher stopped");
    }
}
