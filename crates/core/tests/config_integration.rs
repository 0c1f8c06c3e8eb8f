//! tidewatch.toml 통합 설정 테스트
//!
//! - tidewatch.toml.example 파싱 테스트
//! - 부분 설정 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 잘못된 형식 에러 테스트

use tidewatch_core::config::TidewatchConfig;
use tidewatch_core::error::{ConfigError, TidewatchError};

const EXAMPLE: &str = include_str!("../../../tidewatch.toml.example");

/// 환경변수를 설정하고 `f` 실행 후 원래 값으로 복원합니다.
fn with_env<R>(key: &str, value: &str, f: impl FnOnce() -> R) -> R {
    let original = std::env::var(key).ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe { std::env::set_var(key, value) };
    let result = f();
    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    result
}

// =============================================================================
// tidewatch.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let config = TidewatchConfig::parse(EXAMPLE).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let example = TidewatchConfig::parse(EXAMPLE).expect("should parse");
    let defaults = TidewatchConfig::default();

    assert_eq!(example.general.log_level, defaults.general.log_level);
    assert_eq!(example.general.log_format, defaults.general.log_format);
    assert_eq!(example.kubernetes.enabled, defaults.kubernetes.enabled);
    assert_eq!(example.kubernetes.debounce_ms, defaults.kubernetes.debounce_ms);
    assert_eq!(example.docker.socket, defaults.docker.socket);
    assert_eq!(
        example.docker.poll_interval_secs,
        defaults.docker.poll_interval_secs
    );
    assert_eq!(example.static_file.path, defaults.static_file.path);
    assert_eq!(example.queue.burst, defaults.queue.burst);
    assert_eq!(example.queue.tick_ms, defaults.queue.tick_ms);
    assert_eq!(example.processing.workers, defaults.processing.workers);
    assert_eq!(
        example.processing.refresh_min_age_secs,
        defaults.processing.refresh_min_age_secs
    );
    assert_eq!(example.metrics.port, defaults.metrics.port);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_static_only() {
    let toml = r#"
[docker]
enabled = false

[static_file]
enabled = true
path = "/srv/images.yaml"
"#;
    let config = TidewatchConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");
    assert!(config.static_file.enabled);
    assert_eq!(config.static_file.path, "/srv/images.yaml");
    assert_eq!(config.static_file.poll_interval_secs, 300);
}

#[test]
fn partial_config_queue_only() {
    let config = TidewatchConfig::parse("[queue]\nburst = 3").expect("should parse");
    assert_eq!(config.queue.burst, 3);
    assert_eq!(config.queue.tick_ms, 1000);
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = "[general]\nlog_level = \"info\"\n";
    let level = with_env("TIDEWATCH_GENERAL_LOG_LEVEL", "error", || {
        let mut config = TidewatchConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.general.log_level
    });
    assert_eq!(level, "error");
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let burst = with_env("TIDEWATCH_QUEUE_BURST", "42", || {
        let mut config = TidewatchConfig::default();
        config.apply_env_overrides();
        config.queue.burst
    });
    assert_eq!(burst, 42);
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let enabled = with_env("TIDEWATCH_KUBERNETES_ENABLED", "true", || {
        let mut config = TidewatchConfig::default();
        config.apply_env_overrides();
        config.kubernetes.enabled
    });
    assert!(enabled);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_value_keeps_toml_value() {
    let port = with_env("TIDEWATCH_METRICS_PORT", "not-a-port", || {
        let mut config = TidewatchConfig::parse("[metrics]\nport = 9100").expect("should parse");
        config.apply_env_overrides();
        config.metrics.port
    });
    assert_eq!(port, 9100);
}

// =============================================================================
// 에러 테스트
// =============================================================================

#[test]
fn wrong_type_for_numeric_field() {
    let err = TidewatchConfig::parse("[queue]\nburst = \"many\"").unwrap_err();
    assert!(matches!(
        err,
        TidewatchError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn unknown_section_is_ignored() {
    let config = TidewatchConfig::parse("[unknown]\nfoo = 1").expect("should parse");
    assert_eq!(config.queue.burst, 10);
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = TidewatchConfig::from_file("/tmp/tidewatch_test_nonexistent_12345.toml").await;
    assert!(matches!(
        result.unwrap_err(),
        TidewatchError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
#[serial_test::serial]
async fn load_example_config_from_disk() {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let example_path = format!("{manifest_dir}/../../tidewatch.toml.example");

    let config = TidewatchConfig::load(&example_path)
        .await
        .expect("example config should load");
    assert_eq!(config.queue.burst, 10);
}
