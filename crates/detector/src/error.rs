//! 탐지기 에러 타입
//!
//! [`DetectorError`]는 탐지 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<DetectorError> for BrokerwatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use brokerwatch_core::error::{BrokerwatchError, PipelineError, StoreError};

/// 탐지기 도메인 에러
///
/// 테일링, 추출, 스토어 연산, 채널 통신 등 파이프라인 내부의
/// 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// 로그 파일 테일링 실패
    #[error("tail error: {path}: {reason}")]
    Tail {
        /// 로그 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 그래프 스토어 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 알림 전송 실패
    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// 알림 전송 에러
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// 싱크로의 전송 실패 (채널 포화 또는 닫힘)
    #[error("notification send failed: {0}")]
    Send(String),
}

impl From<DetectorError> for BrokerwatchError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Store(e) => BrokerwatchError::Store(e),
            DetectorError::Io(e) => BrokerwatchError::Io(e),
            other => BrokerwatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
