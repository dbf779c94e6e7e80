//! 설정 관리 — brokerwatch.toml 파싱 및 런타임 설정
//!
//! [`BrokerwatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`BROKERWATCH_BROKER_LOG_PATH=/var/log/mosquitto/mosquitto.log` 형식)
//! 3. 설정 파일 (`brokerwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), brokerwatch_core::error::BrokerwatchError> {
//! use brokerwatch_core::config::BrokerwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = BrokerwatchConfig::load("brokerwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = BrokerwatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BrokerwatchError, ConfigError};

/// Brokerwatch 통합 설정
///
/// `brokerwatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 브로커 로그 수집 설정
    #[serde(default)]
    pub broker: BrokerConfig,
    /// 이상 징후 모니터 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl BrokerwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, BrokerwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, BrokerwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BrokerwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                BrokerwatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, BrokerwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            BrokerwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `BROKERWATCH_{SECTION}_{FIELD}`
    /// 예: `BROKERWATCH_MONITOR_CONNECTION_THRESHOLD=100`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "BROKERWATCH_GENERAL_LOG_LEVEL");
        override_string(
            &mut self.general.log_format,
            "BROKERWATCH_GENERAL_LOG_FORMAT",
        );
        override_string(&mut self.general.data_dir, "BROKERWATCH_GENERAL_DATA_DIR");

        // Broker
        override_string(&mut self.broker.log_path, "BROKERWATCH_BROKER_LOG_PATH");
        override_string(
            &mut self.broker.service_name,
            "BROKERWATCH_BROKER_SERVICE_NAME",
        );
        override_string(
            &mut self.broker.service_protocol,
            "BROKERWATCH_BROKER_SERVICE_PROTOCOL",
        );
        override_string(
            &mut self.broker.reset_marker,
            "BROKERWATCH_BROKER_RESET_MARKER",
        );
        override_u64(
            &mut self.broker.poll_interval_ms,
            "BROKERWATCH_BROKER_POLL_INTERVAL_MS",
        );

        // Monitor
        override_bool(&mut self.monitor.enabled, "BROKERWATCH_MONITOR_ENABLED");
        override_u64(
            &mut self.monitor.connection_threshold,
            "BROKERWATCH_MONITOR_CONNECTION_THRESHOLD",
        );
        override_u64(
            &mut self.monitor.poll_interval_secs,
            "BROKERWATCH_MONITOR_POLL_INTERVAL_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "BROKERWATCH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "BROKERWATCH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "BROKERWATCH_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "BROKERWATCH_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), BrokerwatchError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 브로커 로그 경로 검증
        if self.broker.log_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "broker.log_path".to_owned(),
                reason: "log path must not be empty".to_owned(),
            }
            .into());
        }
        if !Path::new(&self.broker.log_path).is_absolute() {
            return Err(ConfigError::InvalidValue {
                field: "broker.log_path".to_owned(),
                reason: "log path must be absolute".to_owned(),
            }
            .into());
        }

        if self.broker.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "broker.poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.broker.service_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "broker.service_name".to_owned(),
                reason: "service name must not be empty".to_owned(),
            }
            .into());
        }

        // 모니터 검증
        if self.monitor.enabled {
            if self.monitor.connection_threshold == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "monitor.connection_threshold".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
            if self.monitor.poll_interval_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "monitor.poll_interval_secs".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
        }

        // 메트릭 검증
        if self.metrics.enabled && !self.metrics.endpoint.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "metrics.endpoint".to_owned(),
                reason: "endpoint must start with '/'".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

// Default는 derive 매크로로 자동 생성 (각 필드가 Default를 구현하므로)

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/brokerwatch".to_owned(),
        }
    }
}

/// 브로커 로그 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// 브로커 로그 파일 경로
    pub log_path: String,
    /// 서비스 노드 이름 (로그에는 나타나지 않음)
    pub service_name: String,
    /// 서비스 프로토콜 (로그에는 나타나지 않음)
    pub service_protocol: String,
    /// 연결 필드 초기화를 유발하는 로그 마커
    pub reset_marker: String,
    /// 로그 파일 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            log_path: "/var/log/mosquitto/mosquitto.log".to_owned(),
            service_name: "mosquitto".to_owned(),
            service_protocol: "mqtt".to_owned(),
            reset_marker: "/var/lib/mosquitto/mosquitto.db".to_owned(),
            poll_interval_ms: 250,
        }
    }
}

/// 이상 징후 모니터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 호스트당 활성 연결 임계값 (초과 시 차단)
    pub connection_threshold: u64,
    /// 모니터링 주기 (초)
    pub poll_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            connection_threshold: 50,
            poll_interval_secs: 5,
        }
    }
}

/// 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9187,
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

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}
