//! 탐지기 설정
//!
//! [`DetectorConfig`]는 core의 [`BrokerwatchConfig`](brokerwatch_core::config::BrokerwatchConfig)를
//! 기반으로 탐지 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use brokerwatch_core::config::BrokerwatchConfig;
//! use brokerwatch_detector::config::DetectorConfig;
//!
//! let core_config = BrokerwatchConfig::default();
//! let config = DetectorConfig::from_core(&core_config);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DetectorError;

/// 탐지 파이프라인 설정
///
/// core의 `[broker]` / `[monitor]` 섹션에서 파생되며, 파이프라인
/// 내부에서 사용하는 추가 설정을 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// 브로커 로그 파일 경로
    pub log_path: String,
    /// Service 노드 이름 (브로커 로그에는 나타나지 않음)
    pub service_name: String,
    /// Service 노드 프로토콜 (브로커 로그에는 나타나지 않음)
    pub service_protocol: String,
    /// 연결 필드 초기화를 유발하는 로그 마커
    pub reset_marker: String,
    /// 로그 파일 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,

    /// 모니터 활성화 여부
    pub monitor_enabled: bool,
    /// 호스트당 활성 연결 임계값 (초과 시 차단)
    pub connection_threshold: u64,
    /// 모니터링 주기 (초)
    pub monitor_interval_secs: u64,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 알림 채널 용량
    pub alert_channel_capacity: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            log_path: "/var/log/mosquitto/mosquitto.log".to_owned(),
            service_name: "mosquitto".to_owned(),
            service_protocol: "mqtt".to_owned(),
            reset_marker: "/var/lib/mosquitto/mosquitto.db".to_owned(),
            poll_interval_ms: 250,
            monitor_enabled: true,
            connection_threshold: 50,
            monitor_interval_secs: 5,
            alert_channel_capacity: 1024,
        }
    }
}

impl DetectorConfig {
    /// core 설정에서 탐지기 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &brokerwatch_core::config::BrokerwatchConfig) -> Self {
        Self {
            log_path: core.broker.log_path.clone(),
            service_name: core.broker.service_name.clone(),
            service_protocol: core.broker.service_protocol.clone(),
            reset_marker: core.broker.reset_marker.clone(),
            poll_interval_ms: core.broker.poll_interval_ms,
            monitor_enabled: core.monitor.enabled,
            connection_threshold: core.monitor.connection_threshold,
            monitor_interval_secs: core.monitor.poll_interval_secs,
            ..Self::default()
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.log_path.is_empty() {
            return Err(DetectorError::Config {
                field: "log_path".to_owned(),
                reason: "log path must not be empty".to_owned(),
            });
        }

        if !Path::new(&self.log_path).is_absolute() {
            return Err(DetectorError::Config {
                field: "log_path".to_owned(),
                reason: format!("log path '{}' must be absolute", self.log_path),
            });
        }

        if self.poll_interval_ms == 0 {
            return Err(DetectorError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.service_name.is_empty() {
            return Err(DetectorError::Config {
                field: "service_name".to_owned(),
                reason: "service name must not be empty".to_owned(),
            });
        }

        if self.reset_marker.is_empty() {
            return Err(DetectorError::Config {
                field: "reset_marker".to_owned(),
                reason: "reset marker must not be empty".to_owned(),
            });
        }

        if self.monitor_enabled {
            if self.connection_threshold == 0 {
                return Err(DetectorError::Config {
                    field: "connection_threshold".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
            if self.monitor_interval_secs == 0 {
                return Err(DetectorError::Config {
                    field: "monitor_interval_secs".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        if self.alert_channel_capacity == 0 {
            return Err(DetectorError::Config {
                field: "alert_channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 탐지기 설정 빌더
#[derive(Default)]
pub struct DetectorConfigBuilder {
    config: DetectorConfig,
}

impl DetectorConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 브로커 로그 파일 경로를 설정합니다.
    pub fn log_path(mut self, path: impl Into<String>) -> Self {
        self.config.log_path = path.into();
        self
    }

    /// Service 노드 이름을 설정합니다.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service_name = name.into();
        self
    }

    /// Service 노드 프로토콜을 설정합니다.
    pub fn service_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.config.service_protocol = protocol.into();
        self
    }

    /// 연결 초기화 마커를 설정합니다.
    pub fn reset_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.reset_marker = marker.into();
        self
    }

    /// 로그 폴링 간격(밀리초)을 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 모니터 활성화 여부를 설정합니다.
    pub fn monitor_enabled(mut self, enabled: bool) -> Self {
        self.config.monitor_enabled = enabled;
        self
    }

    /// 활성 연결 임계값을 설정합니다.
    pub fn connection_threshold(mut self, threshold: u64) -> Self {
        self.config.connection_threshold = threshold;
        self
    }

    /// 모니터링 주기(초)를 설정합니다.
    pub fn monitor_interval_secs(mut self, secs: u64) -> Self {
        self.config.monitor_interval_secs = secs;
        self
    }

    /// 알림 채널 용량을 설정합니다.
    pub fn alert_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.alert_channel_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `DetectorConfig`를 생성합니다.
    pub fn build(self) -> Result<DetectorConfig, DetectorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
