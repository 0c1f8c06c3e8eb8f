//! 이벤트 허브: fan-out 발행/구독
//!
//! 구독자마다 bounded `mpsc` 채널을 하나씩 가집니다. 구독은 구독 시 전달한
//! [`CancellationToken`]이 취소되거나 수신자가 drop되면 자동으로 해제됩니다.
//!
//! # 사용 예시
//! ```ignore
//! let hub = Hub::<ChangeEvent>::new();
//! let mut rx = hub.subscribe(&token).await;
//! hub.broadcast(&token, ChangeEvent::new(1, 0)).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::HubError;

/// 구독자 채널 기본 용량
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 16;

/// fan-out 이벤트 허브
pub struct Hub<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<T>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl<T> Inner<T> {
    async fn remove(&self, id: u64) {
        if self.subscribers.lock().await.remove(&id).is_some() {
            debug!(subscriber = id, "hub subscriber removed");
        }
    }
}

impl<T> Clone for Hub<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Hub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Hub<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                capacity: capacity.max(1),
            }),
        }
    }

    /// 새 구독을 등록하고 수신 채널을 반환합니다.
    ///
    /// `token`이 취소되면 구독이 해제되고 채널이 닫힙니다.
    pub async fn subscribe(&self, token: &CancellationToken) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().await.insert(id, tx.clone());
        debug!(subscriber = id, "hub subscriber added");

        let inner = Arc::downgrade(&self.inner);
        let token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tx.closed() => {}
            }
            drop(tx);
            if let Some(inner) = inner.upgrade() {
                inner.remove(id).await;
            }
        });

        rx
    }

    /// 모든 구독자에게 이벤트를 전달합니다.
    ///
    /// 느린 구독자는 채널에 여유가 생길 때까지 기다립니다. 그 도중 `token`이
    /// 취소되면 [`HubError::Cancelled`]를 반환합니다.
    pub async fn broadcast(&self, token: &CancellationToken, event: T) -> Result<(), HubError> {
        let targets: Vec<(u64, mpsc::Sender<T>)> = self
            .inner
            .subscribers
            .lock()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        for (id, tx) in targets {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(HubError::Cancelled),
                result = tx.send(event.clone()) => {
                    if result.is_err() {
                        self.inner.remove(id).await;
                    }
                }
            }
        }
        Ok(())
    }

    /// 현재 활성 구독자 수
    pub async fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().await.len()
    }
}
