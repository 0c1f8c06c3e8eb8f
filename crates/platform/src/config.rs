//! 플랫폼 어댑터 설정
//!
//! core의 소스별 설정 섹션에서 파생되며 어댑터 내부 확장 필드를 더합니다.
//!
//! # 사용 예시
//! ```ignore
//! use tidewatch_core::config::TidewatchConfig;
//! use tidewatch_platform::config::DockerGrapherConfig;
//!
//! let core_config = TidewatchConfig::default();
//! let config = DockerGrapherConfig::from_core(&core_config.docker);
//! config.validate()?;
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// 설정 상한값 상수
const MAX_POLL_INTERVAL_SECS: u64 = 86_400;
const MAX_DEBOUNCE_MS: u64 = 60_000;
const MAX_TRIGGER_BUFFER: usize = 1_024;

fn config_error(field: &str, reason: impl Into<String>) -> PlatformError {
    PlatformError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// Docker 어댑터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerGrapherConfig {
    /// Docker 소켓 경로
    pub socket: String,
    /// 중지된 컨테이너 포함 여부
    pub include_stopped: bool,
    /// 폴링 주기 (초)
    pub poll_interval_secs: u64,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// TLS 인증서 디렉토리. 비어 있으면 유닉스 소켓으로 연결
    pub tls_cert_dir: String,
}

impl Default for DockerGrapherConfig {
    fn default() -> Self {
        Self {
            socket: "/var/run/docker.sock".to_owned(),
            include_stopped: false,
            poll_interval_secs: 60,
            connect_timeout_secs: 120,
            tls_cert_dir: String::new(),
        }
    }
}

impl DockerGrapherConfig {
    pub fn from_core(core: &tidewatch_core::config::DockerConfig) -> Self {
        Self {
            socket: core.socket.clone(),
            include_stopped: core.include_stopped,
            poll_interval_secs: core.poll_interval_secs,
            tls_cert_dir: core.tls_cert_dir.clone(),
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn uses_tls(&self) -> bool {
        !self.tls_cert_dir.is_empty()
    }

    pub fn validate(&self) -> Result<(), PlatformError> {
        if self.socket.is_empty() {
            return Err(config_error("socket", "must not be empty"));
        }
        if self.uses_tls() && !self.socket.contains("://") {
            return Err(config_error("socket", "TLS requires a tcp:// address"));
        }
        if self.poll_interval_secs == 0 || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(config_error(
                "poll_interval_secs",
                format!("must be 1-{MAX_POLL_INTERVAL_SECS}"),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(config_error("connect_timeout_secs", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Kubernetes 어댑터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesGrapherConfig {
    /// 트리거 디바운스 윈도우 (밀리초)
    pub debounce_ms: u64,
    /// 디바운서 앞단 트리거 버퍼 크기
    pub trigger_buffer: usize,
}

impl Default for KubernetesGrapherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1_000,
            trigger_buffer: 1,
        }
    }
}

impl KubernetesGrapherConfig {
    pub fn from_core(core: &tidewatch_core::config::KubernetesConfig) -> Self {
        Self {
            debounce_ms: core.debounce_ms,
            ..Self::default()
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<(), PlatformError> {
        if self.debounce_ms == 0 || self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(config_error(
                "debounce_ms",
                format!("must be 1-{MAX_DEBOUNCE_MS}"),
            ));
        }
        if self.trigger_buffer == 0 || self.trigger_buffer > MAX_TRIGGER_BUFFER {
            return Err(config_error(
                "trigger_buffer",
                format!("must be 1-{MAX_TRIGGER_BUFFER}"),
            ));
        }
        Ok(())
    }
}

/// 정적 파일 어댑터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticGrapherConfig {
    /// YAML 파일 경로
    pub path: String,
    /// 다시 읽는 주기 (초)
    pub poll_interval_secs: u64,
}

impl Default for StaticGrapherConfig {
    fn default() -> Self {
        Self {
            path: "/etc/tidewatch/images.yaml".to_owned(),
            poll_interval_secs: 300,
        }
    }
}

impl StaticGrapherConfig {
    pub fn from_core(core: &tidewatch_core::config::StaticFileConfig) -> Self {
        Self {
            path: core.path.clone(),
            poll_interval_secs: core.poll_interval_secs,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn validate(&self) -> Result<(), PlatformError> {
        if self.path.is_empty() {
            return Err(config_error("path", "must not be empty"));
        }
        if self.poll_interval_secs == 0 || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(config_error(
                "poll_interval_secs",
                format!("must be 1-{MAX_POLL_INTERVAL_SECS}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DockerGrapherConfig::default().validate().unwrap();
        KubernetesGrapherConfig::default().validate().unwrap();
        StaticGrapherConfig::default().validate().unwrap();
    }

    #[test]
    fn docker_from_core_copies_fields() {
        let core = tidewatch_core::config::DockerConfig {
            enabled: true,
            socket: "/run/user/1000/docker.sock".to_owned(),
            poll_interval_secs: 15,
            include_stopped: true,
            tls_cert_dir: "/etc/docker/certs".to_owned(),
        };
        let config = DockerGrapherConfig::from_core(&core);
        assert_eq!(config.socket, "/run/user/1000/docker.sock");
        assert!(config.include_stopped);
        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.connect_timeout_secs, 120);
        assert!(config.uses_tls());
    }

    #[test]
    fn docker_tls_needs_tcp_address() {
        let config = DockerGrapherConfig {
            tls_cert_dir: "/etc/docker/certs".to_owned(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tcp://"));
    }

    #[test]
    fn docker_rejects_zero_interval() {
        let config = DockerGrapherConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn kubernetes_rejects_excessive_debounce() {
        let config = KubernetesGrapherConfig {
            debounce_ms: MAX_DEBOUNCE_MS + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn static_rejects_empty_path() {
        let config = StaticGrapherConfig {
            path: String::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("path"));
    }
}
