//! 플랫폼 어댑터 에러 타입
//!
//! [`PlatformError`]는 어댑터 생성과 스냅샷 사이클에서 발생하는 모든 에러를 표현합니다.
//! `From<PlatformError> for TidewatchError` 변환으로 상위 레이어에서 `?`로 전파됩니다.

use tidewatch_core::error::{ReferenceError, SourceError, TidewatchError};

/// 플랫폼 어댑터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Docker 소켓 연결 실패 (시작 시 치명적)
    #[error("docker connection error: {0}")]
    DockerConnection(String),

    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// Kubernetes API 서버 연결 실패 (시작 시 치명적)
    #[error("kubernetes connection error: {0}")]
    KubernetesConnection(String),

    /// Kubernetes API 호출 실패
    #[error("kubernetes api error: {0}")]
    KubernetesApi(String),

    /// 정적 이미지 목록 파일 에러
    #[error("static file error: {path}: {reason}")]
    StaticFile {
        /// 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 플랫폼이 보고한 이미지 참조를 해석할 수 없음
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 복합 소스 중 하나 이상이 실패
    #[error("{}", join_errors(.0))]
    Multiple(Vec<PlatformError>),

    /// 스냅샷 도중 취소됨
    #[error("snapshot cancelled")]
    Cancelled,

    /// 이미 닫힌 grapher
    #[error("grapher is closed")]
    Closed,
}

impl PlatformError {
    /// 시작 단계에서 치명적인 연결 에러인지
    pub fn is_connection(&self) -> bool {
        match self {
            Self::DockerConnection(_) | Self::KubernetesConnection(_) => true,
            Self::Multiple(errors) => errors.iter().any(Self::is_connection),
            _ => false,
        }
    }
}

fn join_errors(errors: &[PlatformError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<PlatformError> for TidewatchError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Reference(e) => TidewatchError::Reference(e),
            PlatformError::Cancelled | PlatformError::Closed => {
                TidewatchError::Source(SourceError::Cancelled)
            }
            e if e.is_connection() => TidewatchError::Source(SourceError::Connection(e.to_string())),
            e => TidewatchError::Source(SourceError::Snapshot(e.to_string())),
        }
    }
}
