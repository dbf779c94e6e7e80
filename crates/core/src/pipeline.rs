//! 파이프라인 trait — 모듈 생명주기 정의
//!
//! 데몬은 각 모듈을 [`Pipeline`] trait으로 관리합니다.
//! start / stop / health_check 세 연산으로 구성된 단순한 생명주기입니다.

use std::fmt;

use crate::error::BrokerwatchError;

/// 파이프라인 건강 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 동작 중이지만 주의 필요
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 반환합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 반환합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 모듈 생명주기 trait
///
/// 각 모듈은 이 trait을 구현하여 데몬에서 동일한 방식으로
/// 시작/정지/상태 확인됩니다.
pub trait Pipeline {
    /// 파이프라인을 시작합니다.
    ///
    /// 이미 실행 중이면 `PipelineError::AlreadyRunning`을 반환합니다.
    async fn start(&mut self) -> Result<(), BrokerwatchError>;

    /// 파이프라인을 정지합니다.
    ///
    /// 실행 중이 아니면 `PipelineError::NotRunning`을 반환합니다.
    async fn stop(&mut self) -> Result<(), BrokerwatchError>;

    /// 현재 건강 상태를 반환합니다.
    async fn health_check(&self) -> HealthStatus;
}
