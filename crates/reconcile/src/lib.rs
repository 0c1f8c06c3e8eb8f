//! tidewatch 재조정 엔진
//!
//! 플랫폼 스냅샷을 이미지 스토어에 반영하고 새 이미지를 작업 큐로 보냅니다.
//!
//! - [`model`]: 스토리지 중립 이미지 모델
//! - [`mapper`]: 플랫폼 그래프 → 모델 변환, 라벨/태그 해석
//! - [`store`]: `ImageStore`/`ImageReader` 계약과 메모리 구현
//! - [`queue`]: 레이트 리밋 중복 제거 작업 큐
//! - [`reconciler`]: 스냅샷 단위 재조정 패스
//! - [`refresher`]: 오래된 이미지 재처리
//! - [`worker`]: 큐 소비 워커

pub mod error;
pub mod mapper;
pub mod model;
pub mod queue;
pub mod reconciler;
pub mod refresher;
pub mod store;
pub mod worker;

pub use error::ReconcileError;
pub use model::{GraphNode, ImageGraph, RawImage};
pub use queue::{Pull, QueueMetrics, WorkQueue};
pub use reconciler::{PassReport, ReconcileMetrics, Reconciler};
pub use refresher::{RefreshPolicy, Refresher};
pub use store::{ImageReader, ImageStore, MemoryReader, MemoryStore};
pub use worker::{Worker, WorkerMetrics};
