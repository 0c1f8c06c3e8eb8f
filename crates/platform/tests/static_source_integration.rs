//! 설정 기반 소스 조립 통합 테스트
//!
//! Docker/Kubernetes 없이 정적 파일 소스만으로 연속 스트림을 검증합니다.

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use tidewatch_core::config::TidewatchConfig;
use tidewatch_graph::Node;
use tidewatch_platform::{ContinuousGrapher, PlatformError, source};

fn static_only_config(file: &NamedTempFile) -> TidewatchConfig {
    let mut config = TidewatchConfig::default();
    config.docker.enabled = false;
    config.kubernetes.enabled = false;
    config.static_file.enabled = true;
    config.static_file.path = file.path().display().to_string();
    config
}

fn images_file(images: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "images:").expect("write");
    for image in images {
        writeln!(file, "  - {image}").expect("write");
    }
    file
}

#[tokio::test]
async fn static_source_streams_initial_snapshot() {
    let file = images_file(&["nginx:1.25", "ghcr.io/acme/api:2"]);
    let grapher = source::connect(&static_only_config(&file))
        .await
        .expect("static source should connect");

    let token = CancellationToken::new();
    let mut rx = grapher.graph_continuously(&token).expect("stream");

    let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("first snapshot is immediate")
        .expect("stream open");

    let mut ids: Vec<&str> = snapshot.roots().into_iter().map(|n| n.id()).collect();
    ids.sort_unstable();
    assert_eq!(
        ids,
        vec!["docker.io/library/nginx:1.25", "ghcr.io/acme/api:2"]
    );

    token.cancel();
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok(), "stream must close after cancellation");
}

#[tokio::test]
async fn one_shot_graph_matches_stream() {
    let file = images_file(&["redis:7"]);
    let grapher = source::connect(&static_only_config(&file))
        .await
        .expect("connect");

    let token = CancellationToken::new();
    let graph = grapher.graph(&token).await.expect("one-shot graph");
    assert!(graph.contains("docker.io/library/redis:7"));
}

#[tokio::test]
async fn closed_source_rejects_streams() {
    let file = images_file(&["redis:7"]);
    let grapher = source::connect(&static_only_config(&file))
        .await
        .expect("connect");

    grapher.close().expect("close");
    let result = grapher.graph_continuously(&CancellationToken::new());
    assert!(matches!(result, Err(PlatformError::Closed)));
}

#[tokio::test]
async fn missing_static_file_fails_at_startup() {
    let mut config = TidewatchConfig::default();
    config.docker.enabled = false;
    config.static_file.enabled = true;
    config.static_file.path = "/nonexistent/tidewatch.yaml".to_owned();

    let result = source::connect(&config).await;
    assert!(matches!(result, Err(PlatformError::StaticFile { .. })));
}
