//! 설정 관리: tidewatch.toml 파싱 및 런타임 설정
//!
//! [`TidewatchConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TIDEWATCH_DOCKER_SOCKET=/run/docker.sock` 형식)
//! 3. 설정 파일 (`tidewatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tidewatch_core::error::TidewatchError> {
//! use tidewatch_core::config::TidewatchConfig;
//!
//! let config = TidewatchConfig::load("tidewatch.toml").await?;
//! let config = TidewatchConfig::parse("[docker]\nenabled = true")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TidewatchError};

/// 큐 burst 최대값
const MAX_QUEUE_BURST: usize = 10_000;
/// 워커 수 최대값
const MAX_WORKERS: usize = 256;
/// 폴링 주기 최대값 (초, 1일)
const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

/// tidewatch 통합 설정
///
/// `tidewatch.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TidewatchConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    /// Kubernetes 소스
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
    /// Docker 소스
    #[serde(default)]
    pub docker: DockerConfig,
    /// 정적 파일 소스
    #[serde(default)]
    pub static_file: StaticFileConfig,
    /// 작업 큐
    #[serde(default)]
    pub queue: QueueConfig,
    /// 처리 워커 및 재처리
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// 이미지 스토어
    #[serde(default)]
    pub store: StoreConfig,
    /// Prometheus 메트릭
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TidewatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TidewatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TidewatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TidewatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TidewatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TidewatchError> {
        toml::from_str(toml_str).map_err(|e| {
            TidewatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TIDEWATCH_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TIDEWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TIDEWATCH_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "TIDEWATCH_GENERAL_PID_FILE");

        // Kubernetes
        override_bool(&mut self.kubernetes.enabled, "TIDEWATCH_KUBERNETES_ENABLED");
        override_u64(
            &mut self.kubernetes.debounce_ms,
            "TIDEWATCH_KUBERNETES_DEBOUNCE_MS",
        );

        // Docker
        override_bool(&mut self.docker.enabled, "TIDEWATCH_DOCKER_ENABLED");
        override_string(&mut self.docker.socket, "TIDEWATCH_DOCKER_SOCKET");
        override_u64(
            &mut self.docker.poll_interval_secs,
            "TIDEWATCH_DOCKER_POLL_INTERVAL_SECS",
        );
        override_bool(
            &mut self.docker.include_stopped,
            "TIDEWATCH_DOCKER_INCLUDE_STOPPED",
        );
        override_string(&mut self.docker.tls_cert_dir, "TIDEWATCH_DOCKER_TLS_CERT_DIR");

        // Static file
        override_bool(
            &mut self.static_file.enabled,
            "TIDEWATCH_STATIC_FILE_ENABLED",
        );
        override_string(&mut self.static_file.path, "TIDEWATCH_STATIC_FILE_PATH");
        override_u64(
            &mut self.static_file.poll_interval_secs,
            "TIDEWATCH_STATIC_FILE_POLL_INTERVAL_SECS",
        );

        // Queue
        override_usize(&mut self.queue.burst, "TIDEWATCH_QUEUE_BURST");
        override_u64(&mut self.queue.tick_ms, "TIDEWATCH_QUEUE_TICK_MS");

        // Processing
        override_usize(&mut self.processing.workers, "TIDEWATCH_PROCESSING_WORKERS");
        override_u64(
            &mut self.processing.refresh_interval_secs,
            "TIDEWATCH_PROCESSING_REFRESH_INTERVAL_SECS",
        );
        override_u64(
            &mut self.processing.refresh_min_age_secs,
            "TIDEWATCH_PROCESSING_REFRESH_MIN_AGE_SECS",
        );
        override_usize(
            &mut self.processing.refresh_items,
            "TIDEWATCH_PROCESSING_REFRESH_ITEMS",
        );

        // Store
        override_string(&mut self.store.path, "TIDEWATCH_STORE_PATH");

        // Metrics
        override_bool(&mut self.metrics.enabled, "TIDEWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "TIDEWATCH_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "TIDEWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TidewatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if !self.kubernetes.enabled && !self.docker.enabled && !self.static_file.enabled {
            return Err(invalid(
                "sources",
                "at least one of kubernetes, docker, static_file must be enabled",
            ));
        }

        // watch 기반 소스와 폴링 소스는 하나의 재조정 루프를 공유할 수 없음
        if self.kubernetes.enabled && (self.docker.enabled || self.static_file.enabled) {
            return Err(invalid(
                "kubernetes.enabled",
                "kubernetes cannot be combined with docker or static_file",
            ));
        }

        if self.kubernetes.enabled && self.kubernetes.debounce_ms == 0 {
            return Err(invalid("kubernetes.debounce_ms", "must be greater than 0"));
        }

        if self.docker.enabled {
            if self.docker.socket.is_empty() {
                return Err(invalid(
                    "docker.socket",
                    "socket must not be empty when docker is enabled",
                ));
            }
            check_interval("docker.poll_interval_secs", self.docker.poll_interval_secs)?;
            if !self.docker.tls_cert_dir.is_empty()
                && !(self.docker.socket.starts_with("tcp://")
                    || self.docker.socket.starts_with("https://"))
            {
                return Err(invalid(
                    "docker.tls_cert_dir",
                    "TLS requires a tcp:// or https:// docker address",
                ));
            }
        }

        if self.static_file.enabled {
            if self.static_file.path.is_empty() {
                return Err(invalid(
                    "static_file.path",
                    "path must not be empty when static_file is enabled",
                ));
            }
            check_interval(
                "static_file.poll_interval_secs",
                self.static_file.poll_interval_secs,
            )?;
        }

        if self.queue.burst == 0 || self.queue.burst > MAX_QUEUE_BURST {
            return Err(invalid(
                "queue.burst",
                format!("must be 1-{MAX_QUEUE_BURST}"),
            ));
        }
        if self.queue.tick_ms == 0 {
            return Err(invalid("queue.tick_ms", "must be greater than 0"));
        }

        if self.processing.workers == 0 || self.processing.workers > MAX_WORKERS {
            return Err(invalid(
                "processing.workers",
                format!("must be 1-{MAX_WORKERS}"),
            ));
        }
        if self.processing.refresh_interval_secs > 0 && self.processing.refresh_items == 0 {
            return Err(invalid(
                "processing.refresh_items",
                "must be greater than 0 when refresh is enabled",
            ));
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid(
                "metrics.endpoint",
                "only '/metrics' is supported",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> TidewatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn check_interval(field: &str, secs: u64) -> Result<(), TidewatchError> {
    if secs == 0 || secs > MAX_POLL_INTERVAL_SECS {
        return Err(invalid(field, format!("must be 1-{MAX_POLL_INTERVAL_SECS}")));
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// Kubernetes 소스 설정
///
/// 클러스터 접속 정보는 kubeconfig 또는 in-cluster 환경에서 추론합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    pub enabled: bool,
    /// watch 트리거 디바운스 윈도우 (밀리초)
    pub debounce_ms: u64,
}

impl KubernetesConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: 1_000,
        }
    }
}

/// Docker 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub enabled: bool,
    /// Docker 소켓 경로. TLS 사용 시 `tcp://host:port` 주소
    pub socket: String,
    /// 폴링 주기 (초)
    pub poll_interval_secs: u64,
    /// 중지된 컨테이너도 포함할지
    pub include_stopped: bool,
    /// `key.pem`, `cert.pem`, `ca.pem`이 있는 디렉토리. 비어 있으면 유닉스 소켓
    pub tls_cert_dir: String,
}

impl DockerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket: "/var/run/docker.sock".to_owned(),
            poll_interval_secs: 60,
            include_stopped: false,
            tls_cert_dir: String::new(),
        }
    }
}

/// 정적 이미지 목록 파일 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFileConfig {
    pub enabled: bool,
    /// YAML 파일 경로
    pub path: String,
    /// 다시 읽는 주기 (초)
    pub poll_interval_secs: u64,
}

impl StaticFileConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for StaticFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "/etc/tidewatch/images.yaml".to_owned(),
            poll_interval_secs: 300,
        }
    }
}

/// 작업 큐 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 토큰 버킷 크기
    pub burst: usize,
    /// 토큰 보충 주기 (밀리초)
    pub tick_ms: u64,
}

impl QueueConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            burst: 10,
            tick_ms: 1_000,
        }
    }
}

/// 처리 워커 및 주기적 재처리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// 동시 워커 수
    pub workers: usize,
    /// 재처리 스캔 주기 (초, 0이면 비활성화)
    pub refresh_interval_secs: u64,
    /// 이보다 오래 전에 처리된 이미지를 재처리 (초)
    pub refresh_min_age_secs: u64,
    /// 한 번의 스캔에서 큐에 넣을 최대 이미지 수
    pub refresh_items: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            refresh_interval_secs: 3_600,
            refresh_min_age_secs: 6 * 3_600,
            refresh_items: 50,
        }
    }
}

/// 이미지 스토어 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 스냅샷 파일 경로 (비어 있으면 메모리에만 보관)
    pub path: String,
}

impl StoreConfig {
    pub fn is_persistent(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9_464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}
