//! Prometheus 스크레이프 엔드포인트
//!
//! `metrics-exporter-prometheus`의 내장 HTTP 리스너를 사용합니다.
//! 설치 이후의 모든 `metrics::counter!`/`gauge!`/`histogram!` 호출이 기록됩니다.

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

use tidewatch_core::config::MetricsConfig;
use tidewatch_core::metrics as names;

/// 전역 recorder를 설치하고 HTTP 리스너를 시작합니다.
///
/// # Errors
/// - 경로가 `/metrics`가 아닌 경우
/// - 주소 파싱 또는 바인드 실패
/// - recorder가 이미 설치된 경우
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is served",
            config.endpoint
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {e}"))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(listen_addr = %addr, "metrics endpoint is exposed on all interfaces");
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(names::RECONCILE_DURATION_SECONDS.to_owned()),
            &names::RECONCILE_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {e}"))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;

    names::describe_all();
    metrics::gauge!(names::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}
