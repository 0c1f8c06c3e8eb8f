//! 이벤트: 저장된 데이터의 변경 알림
//!
//! [`ChangeEvent`]는 재조정(reconcile) 패스가 이미지를 추가하거나 삭제했을 때
//! [`Hub`](crate::hub::Hub)를 통해 구독자(API, 텔레메트리)에게 전달됩니다.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// 재조정 엔진이 이벤트 출처로 쓰는 이름
pub const SOURCE_RECONCILER: &str = "reconciler";

/// 발생 시각, 출처, 추적 ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub timestamp: SystemTime,
    pub source_module: String,
    /// 같은 흐름에 속한 이벤트가 공유하는 ID
    pub trace_id: String,
}

impl EventMetadata {
    /// 새 추적 ID(UUID v4)를 발급합니다.
    pub fn new(source_module: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.to_owned(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// 발생 후 경과 시간. 시계가 되돌아가면 0
    pub fn age(&self) -> Duration {
        self.timestamp.elapsed().unwrap_or_default()
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self
            .timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        write!(f, "{}#{} @{secs}", self.source_module, self.trace_id)
    }
}

/// 이미지 저장소 변경 이벤트
///
/// 한 번의 재조정 패스에서 추가/삭제된 이미지 수를 담습니다.
/// 둘 다 0이면 이벤트를 만들지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// 이벤트 고유 ID
    pub id: String,
    pub metadata: EventMetadata,
    /// 새로 저장된 이미지 수
    pub inserted: usize,
    /// 삭제된 이미지 수
    pub removed: u64,
}

impl ChangeEvent {
    pub fn new(inserted: usize, removed: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::new(SOURCE_RECONCILER),
            inserted,
            removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_issues_distinct_uuid_traces() {
        let a = EventMetadata::new(SOURCE_RECONCILER);
        let b = EventMetadata::new(SOURCE_RECONCILER);
        assert_eq!(a.trace_id.len(), 36);
        assert_ne!(a.trace_id, b.trace_id);
        assert!(a.age() < Duration::from_secs(5));
    }

    #[test]
    fn change_event_carries_reconciler_origin() {
        let event = ChangeEvent::new(3, 1);
        assert_eq!(event.metadata.source_module, SOURCE_RECONCILER);
        assert_ne!(event.id, event.metadata.trace_id);

        let origin = event.metadata.to_string();
        assert!(origin.starts_with(&format!("reconciler#{}", event.metadata.trace_id)));
    }
}
