//! 에러 타입: 도메인별 에러 정의
//!
//! 각 크레이트는 자체 에러 타입을 가지며, `From` 변환을 통해
//! [`TidewatchError`]로 모입니다.

/// tidewatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TidewatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 라벨 해석 에러
    #[error("label error: {0}")]
    Label(#[from] LabelError),

    /// 이미지 참조 파싱 에러
    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),

    /// 플랫폼 소스(kubernetes, docker, static) 에러
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 이벤트 허브 에러
    #[error("hub error: {0}")]
    Hub(#[from] HubError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 라벨 해석 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    /// 릴리스 버전 형식이 아님
    #[error("label '{key}' has invalid release version '{value}'")]
    InvalidVersion { key: String, value: String },
}

/// 이미지 참조 파싱 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    /// 빈 참조 문자열
    #[error("empty image reference")]
    Empty,

    /// 형식 오류
    #[error("invalid image reference '{reference}': {reason}")]
    Invalid { reference: String, reason: String },
}

/// 플랫폼 소스 에러
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// 플랫폼 연결 실패 (시작 시 치명적)
    #[error("connection failed: {0}")]
    Connection(String),

    /// 스냅샷 생성 실패 (해당 사이클만 중단)
    #[error("snapshot failed: {0}")]
    Snapshot(String),

    /// 취소됨
    #[error("cancelled")]
    Cancelled,
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),

    /// 대상 레코드 없음
    #[error("not found: {0}")]
    NotFound(String),
}

/// 이벤트 허브 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// 브로드캐스트 도중 취소됨
    #[error("broadcast cancelled")]
    Cancelled,
}
