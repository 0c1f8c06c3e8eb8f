//! 레이트 리밋 중복 제거 작업 큐
//!
//! 토큰 버킷으로 소비 속도를 제한하는 FIFO 백로그입니다.
//!
//! - `burst`개의 토큰으로 시작하며 `tick`마다 하나씩 `burst`까지 채워집니다
//! - `push`는 백로그에 없는 항목만 추가하고 대기 중인 소비자를 깨웁니다
//! - [`Pull::next`]는 항목과 토큰이 모두 있을 때 하나씩 소비합니다
//! - `close`는 백로그를 비우고 모든 소비자에게 종료를 알립니다
//!
//! 상태는 하나의 뮤텍스로 보호되며 깨우기는 [`Notify`]로 전달합니다.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use metrics::{Counter, Gauge};
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use tidewatch_core::metrics as names;

/// 큐 메트릭 핸들
#[derive(Clone)]
pub struct QueueMetrics {
    pub pushed: Counter,
    pub backlog: Gauge,
}

impl QueueMetrics {
    pub fn register() -> Self {
        Self {
            pushed: metrics::counter!(names::QUEUE_PUSHED_TOTAL),
            backlog: metrics::gauge!(names::QUEUE_BACKLOG),
        }
    }

    pub fn noop() -> Self {
        Self {
            pushed: Counter::noop(),
            backlog: Gauge::noop(),
        }
    }
}

struct State<T> {
    items: VecDeque<T>,
    tokens: usize,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    burst: usize,
    metrics: QueueMetrics,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 레이트 리밋 중복 제거 큐
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> WorkQueue<T>
where
    T: PartialEq + Send + 'static,
{
    /// 큐를 만들고 토큰 보충 태스크를 시작합니다. tokio 런타임 안에서 호출해야 합니다.
    ///
    /// # Panics
    /// `burst`가 0이거나 `tick`이 0이면 패닉합니다.
    pub fn new(burst: usize, tick: Duration) -> Self {
        Self::with_metrics(burst, tick, QueueMetrics::register())
    }

    pub fn with_metrics(burst: usize, tick: Duration, metrics: QueueMetrics) -> Self {
        assert!(burst > 0, "work queue burst must be positive");
        assert!(!tick.is_zero(), "work queue tick must be positive");

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                items: VecDeque::new(),
                tokens: burst,
                closed: false,
            }),
            notify: Notify::new(),
            burst,
            metrics,
        });
        tokio::spawn(refill(Arc::downgrade(&shared), tick));
        Self { shared }
    }

    /// 백로그에 없는 항목만 추가합니다.
    ///
    /// # Panics
    /// 닫힌 큐에 push하면 패닉합니다.
    pub fn push(&self, items: impl IntoIterator<Item = T>) {
        let added = {
            let mut state = self.shared.lock();
            assert!(!state.closed, "push on closed work queue");
            let mut added = 0u64;
            for item in items {
                if !state.items.contains(&item) {
                    state.items.push_back(item);
                    added += 1;
                }
            }
            self.shared.metrics.backlog.set(state.items.len() as f64);
            added
        };

        if added > 0 {
            self.shared.metrics.pushed.increment(added);
            self.shared.notify.notify_waiters();
        }
    }

    /// 소비 시퀀스를 시작합니다. 호출마다 독립된 시퀀스를 반환합니다.
    pub fn pull(&self) -> Pull<T> {
        Pull {
            shared: Arc::clone(&self.shared),
        }
    }

    /// 대기 중인 항목 수
    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 큐를 닫고 백로그를 비운 뒤 모든 소비자를 깨웁니다.
    pub fn close(&self) {
        let dropped = {
            let mut state = self.shared.lock();
            state.closed = true;
            let dropped = state.items.len();
            state.items.clear();
            dropped
        };
        self.shared.metrics.backlog.set(0.0);
        self.shared.notify.notify_waiters();
        debug!(dropped, "work queue closed");
    }
}

/// 큐의 소비 시퀀스
pub struct Pull<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Pull<T> {
    /// 다음 항목. 큐가 닫히면 `None`을 반환합니다.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            // 상태 확인 전에 등록해야 그 사이의 notify_waiters를 놓치지 않음
            let mut notified = pin!(self.shared.notify.notified());
            notified.as_mut().enable();

            {
                let mut state = self.shared.lock();
                if state.closed {
                    return None;
                }
                if state.tokens > 0
                    && let Some(item) = state.items.pop_front()
                {
                    state.tokens -= 1;
                    self.shared.metrics.backlog.set(state.items.len() as f64);
                    return Some(item);
                }
            }

            notified.await;
        }
    }
}

/// 토큰 보충 루프. 큐가 닫히거나 모든 핸들이 사라지면 종료합니다.
async fn refill<T>(shared: Weak<Shared<T>>, tick: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let refilled = {
            let mut state = shared.lock();
            if state.closed {
                break;
            }
            if state.tokens < shared.burst {
                state.tokens += 1;
                true
            } else {
                false
            }
        };
        if refilled {
            shared.notify.notify_waiters();
        }
    }
}
