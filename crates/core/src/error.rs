//! 에러 타입 — 도메인별 에러 정의

/// Brokerwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum BrokerwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 그래프 스토어 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

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

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중인 파이프라인을 다시 시작
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 파이프라인을 정지
    #[error("pipeline is not running")]
    NotRunning,

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 그래프 스토어 에러
///
/// 모든 스토어 연산 실패는 시도한 연산명과 파라미터를 포함하여
/// 호출자가 컨텍스트를 잃지 않고 로깅할 수 있습니다.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 스토어 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 연산 실패
    #[error("operation '{operation}' failed: {reason}")]
    Query { operation: String, reason: String },

    /// 셀렉터가 정확히 하나의 노드로 해석되지 않음
    #[error("selector '{selector}' matched {found} nodes, expected exactly 1")]
    SelectorMismatch { selector: String, found: usize },
}
