//! 이벤트 시스템 — 모듈 간 통신의 기본 단위
//!
//! 모듈 간 통신은 이벤트 기반 메시지 패싱으로 수행됩니다.
//! [`EventMetadata`]는 모든 이벤트에 공통으로 포함되는 메타데이터이며,
//! [`Event`] trait은 모든 이벤트 타입이 구현해야 하는 인터페이스입니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::{Alert, Severity};

// --- 모듈명 상수 ---

/// 탐지기 모듈명
pub const MODULE_DETECTOR: &str = "detector";
/// 데몬 모듈명
pub const MODULE_DAEMON: &str = "daemon";

// --- 이벤트 타입 상수 ---

/// 알림 이벤트 타입
pub const EVENT_TYPE_ALERT: &str = "alert";

/// 이벤트 메타데이터 — 모든 이벤트에 공통으로 포함되는 추적 정보
///
/// 각 이벤트의 발생 시각, 생성 모듈, 추적 ID를 담고 있어
/// 이벤트 흐름을 추적하고 디버깅할 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명 (예: "detector")
    pub source_module: String,
    /// 추적 ID — 같은 흐름의 이벤트를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 사용하여 새 메타데이터를 생성합니다.
    ///
    /// 이벤트 체인에서 동일한 추적 ID를 유지할 때 사용합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    ///
    /// 새로운 이벤트 체인의 시작점에서 사용합니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} trace={}",
            unix_timestamp_str(self.timestamp),
            self.source_module,
            self.trace_id,
        )
    }
}

/// 모든 이벤트가 구현해야 하는 기본 trait
///
/// `Send + Sync + 'static` 바운드로 `tokio::mpsc` 채널을 통한
/// 안전한 전송을 보장합니다.
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터 (timestamp, source_module, trace_id)
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명 (로깅 및 라우팅에 사용)
    fn event_type(&self) -> &str;
}

/// 임계값 초과 탐지로 생성된 알림 이벤트
#[derive(Debug, Clone)]
pub struct AlertEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 알림 상세 정보
    pub alert: Alert,
    /// 알림 심각도
    pub severity: Severity,
}

impl AlertEvent {
    /// 새로운 trace를 시작하는 알림 이벤트를 생성합니다.
    pub fn new(alert: Alert, severity: Severity) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_DETECTOR),
            alert,
            severity,
        }
    }

    /// 기존 trace에 연결된 알림 이벤트를 생성합니다.
    pub fn with_trace(alert: Alert, severity: Severity, trace_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::new(MODULE_DETECTOR, trace_id),
            alert,
            severity,
        }
    }
}

impl Event for AlertEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_ALERT
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AlertEvent[{}] rule={} severity={} title={}",
            &self.id[..8.min(self.id.len())],
            self.alert.rule_name,
            self.severity,
            self.alert.title,
        )
    }
}

/// SystemTime을 사람이 읽을 수 있는 형태로 변환합니다.
fn unix_timestamp_str(time: SystemTime) -> String {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => {
            let secs = duration.as_secs();
            format!("{secs}")
        }
        Err(_) => "unknown".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_alert() -> Alert {
        Alert {
            id: "alert-001".to_owned(),
            title: "Connection flood detected".to_owned(),
            description: "Host 10.0.0.1 has 51 active connections".to_owned(),
            severity: Severity::Critical,
            rule_name: "connection_flood".to_owned(),
            source_ip: Some("10.0.0.1".parse().unwrap()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn event_metadata_new_preserves_trace_id() {
        let meta = EventMetadata::new("test-module", "trace-abc-123");
        assert_eq!(meta.source_module, "test-module");
        assert_eq!(meta.trace_id, "trace-abc-123");
        assert!(meta.timestamp <= SystemTime::now());
    }

    #[test]
    fn event_metadata_with_new_trace_generates_uuid() {
        let meta = EventMetadata::with_new_trace("test-module");
        assert_eq!(meta.source_module, "test-module");
        assert!(!meta.trace_id.is_empty());
        // UUID v4 형식 확인: 8-4-4-4-12
        assert_eq!(meta.trace_id.len(), 36);
        assert_eq!(meta.trace_id.chars().filter(|c| *c == '-').count(), 4);
    }

    #[test]
    fn alert_event_implements_event_trait() {
        let event = AlertEvent::new(sample_alert(), Severity::Critical);
        assert_eq!(event.event_type(), "alert");
        assert_eq!(event.severity, Severity::Critical);
        assert!(!event.event_id().is_empty());
        assert_eq!(event.metadata().source_module, "detector");
    }

    #[test]
    fn alert_event_with_trace_preserves_trace_id() {
        let event = AlertEvent::with_trace(sample_alert(), Severity::Critical, "my-trace-id");
        assert_eq!(event.metadata().trace_id, "my-trace-id");
    }

    #[test]
    fn alert_event_display() {
        let event = AlertEvent::new(sample_alert(), Severity::Critical);
        let display = event.to_string();
        assert!(display.contains("connection_flood"));
        assert!(display.contains("Critical"));
    }

    #[test]
    fn events_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<AlertEvent>();
    }
}
