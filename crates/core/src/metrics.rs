//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tidewatch_`
//! - 컴포넌트명: `graph_`, `reconcile_`, `queue_`, `worker_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 플랫폼 레이블 키 (kubernetes, docker, static)
pub const LABEL_PLATFORM: &str = "platform";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Graph 메트릭 ──────────────────────────────────────────────────

/// 생성된 그래프 스냅샷 수 (counter, label: platform)
pub const GRAPH_SNAPSHOTS_TOTAL: &str = "tidewatch_graph_snapshots_total";

/// 실패한 스냅샷 사이클 수 (counter, label: platform)
pub const GRAPH_SNAPSHOT_ERRORS_TOTAL: &str = "tidewatch_graph_snapshot_errors_total";

// ─── Reconcile 메트릭 ──────────────────────────────────────────────

/// 완료된 재조정 패스 수 (counter)
pub const RECONCILE_PASSES_TOTAL: &str = "tidewatch_reconcile_passes_total";

/// 새로 저장된 이미지 수 (counter)
pub const RECONCILE_IMAGES_INSERTED_TOTAL: &str = "tidewatch_reconcile_images_inserted_total";

/// 삭제된 이미지 수 (counter)
pub const RECONCILE_IMAGES_REMOVED_TOTAL: &str = "tidewatch_reconcile_images_removed_total";

/// 저장/삭제 실패 수 (counter)
pub const RECONCILE_STORE_ERRORS_TOTAL: &str = "tidewatch_reconcile_store_errors_total";

/// 마지막 패스에서 관찰된 이미지 수 (gauge)
pub const RECONCILE_OBSERVED_IMAGES: &str = "tidewatch_reconcile_observed_images";

/// 재조정 패스 소요 시간 (histogram, 초)
pub const RECONCILE_DURATION_SECONDS: &str = "tidewatch_reconcile_duration_seconds";

// ─── Queue / Worker 메트릭 ─────────────────────────────────────────

/// 큐에 추가된 항목 수 (counter)
pub const QUEUE_PUSHED_TOTAL: &str = "tidewatch_queue_pushed_total";

/// 큐 대기 항목 수 (gauge)
pub const QUEUE_BACKLOG: &str = "tidewatch_queue_backlog";

/// 워커가 처리한 이미지 수 (counter, label: result)
pub const WORKER_PROCESSED_TOTAL: &str = "tidewatch_worker_processed_total";

/// 재처리를 위해 다시 큐에 넣은 이미지 수 (counter)
pub const REFRESH_REQUEUED_TOTAL: &str = "tidewatch_refresh_requeued_total";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// 데몬 빌드 정보 (gauge, label: version)
pub const DAEMON_BUILD_INFO: &str = "tidewatch_daemon_build_info";

/// 재조정 소요 시간 버킷
pub const RECONCILE_DURATION_BUCKETS: [f64; 9] =
    [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0];

/// 모든 메트릭의 설명을 등록합니다.
///
/// recorder 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        GRAPH_SNAPSHOTS_TOTAL,
        "Total number of graph snapshots produced by platform adapters"
    );
    describe_counter!(
        GRAPH_SNAPSHOT_ERRORS_TOTAL,
        "Total number of snapshot cycles aborted by an adapter error"
    );

    describe_counter!(
        RECONCILE_PASSES_TOTAL,
        "Total number of completed reconciliation passes"
    );
    describe_counter!(
        RECONCILE_IMAGES_INSERTED_TOTAL,
        "Total number of images stored for the first time"
    );
    describe_counter!(
        RECONCILE_IMAGES_REMOVED_TOTAL,
        "Total number of stored images removed because they were no longer observed"
    );
    describe_counter!(
        RECONCILE_STORE_ERRORS_TOTAL,
        "Total number of failed store operations during reconciliation"
    );
    describe_gauge!(
        RECONCILE_OBSERVED_IMAGES,
        "Number of images observed in the last reconciliation pass"
    );
    describe_histogram!(
        RECONCILE_DURATION_SECONDS,
        "Time spent reconciling a single snapshot in seconds"
    );

    describe_counter!(
        QUEUE_PUSHED_TOTAL,
        "Total number of items accepted by the work queue"
    );
    describe_gauge!(QUEUE_BACKLOG, "Number of items waiting in the work queue");
    describe_counter!(
        WORKER_PROCESSED_TOTAL,
        "Total number of images handled by processing workers"
    );
    describe_counter!(
        REFRESH_REQUEUED_TOTAL,
        "Total number of stale images pushed back onto the work queue"
    );

    describe_gauge!(DAEMON_BUILD_INFO, "Build information for the daemon");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metric_names_share_prefix() {
        let names = [
            GRAPH_SNAPSHOTS_TOTAL,
            GRAPH_SNAPSHOT_ERRORS_TOTAL,
            RECONCILE_PASSES_TOTAL,
            RECONCILE_IMAGES_INSERTED_TOTAL,
            RECONCILE_IMAGES_REMOVED_TOTAL,
            RECONCILE_STORE_ERRORS_TOTAL,
            RECONCILE_OBSERVED_IMAGES,
            RECONCILE_DURATION_SECONDS,
            QUEUE_PUSHED_TOTAL,
            QUEUE_BACKLOG,
            WORKER_PROCESSED_TOTAL,
            REFRESH_REQUEUED_TOTAL,
            DAEMON_BUILD_INFO,
        ];
        for name in names {
            assert!(name.starts_with("tidewatch_"), "{name}");
        }
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        describe_all();
    }

    #[test]
    fn duration_buckets_are_sorted() {
        assert!(RECONCILE_DURATION_BUCKETS.windows(2).all(|w| w[0] < w[1]));
    }
}
