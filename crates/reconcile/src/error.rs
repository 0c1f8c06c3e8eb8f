//! 재조정 엔진 에러 타입

use tidewatch_core::error::{HubError, StorageError, TidewatchError};
use tidewatch_platform::PlatformError;

/// 재조정 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// 스냅샷 소스 에러
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 이벤트 허브 에러
    #[error("hub error: {0}")]
    Hub(#[from] HubError),
}

impl From<ReconcileError> for TidewatchError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Platform(e) => e.into(),
            ReconcileError::Storage(e) => TidewatchError::Storage(e),
            ReconcileError::Hub(e) => TidewatchError::Hub(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use tidewatch_core::error::SourceError;

    use super::*;

    #[test]
    fn storage_error_keeps_kind() {
        let err: TidewatchError =
            ReconcileError::Storage(StorageError::NotFound("docker.io/library/nginx".to_owned()))
                .into();
        assert!(matches!(err, TidewatchError::Storage(StorageError::NotFound(_))));
    }

    #[test]
    fn platform_error_goes_through_platform_conversion() {
        let err: TidewatchError = ReconcileError::Platform(PlatformError::Closed).into();
        assert!(matches!(err, TidewatchError::Source(SourceError::Cancelled)));
    }
}
