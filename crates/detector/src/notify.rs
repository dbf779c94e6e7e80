//! 알림 싱크 -- 차단된 호스트에 대한 알림 전달
//!
//! [`NotificationSink`]는 모니터가 알림을 내보내는 경계입니다.
//! 전달 실패는 [`NotifyError`]로 보고되며, 호스트 차단 자체를
//! 막지 않습니다 (차단이 먼저, 알림은 최선 노력).
//!
//! SMTP 등 실제 전송 수단은 이 trait의 다른 구현으로 추가합니다.

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::warn;

use brokerwatch_core::event::AlertEvent;
use brokerwatch_core::types::{Alert, Severity};

use crate::error::NotifyError;

/// 임계값 초과 알림의 탐지 규칙명
pub const RULE_CONNECTION_FLOOD: &str = "connection_flood";

/// 알림 싱크 인터페이스
pub trait NotificationSink: Send + Sync {
    /// 알림 메시지를 전달합니다.
    ///
    /// 전달이 확인된 경우에만 `Ok(())`를 반환합니다.
    fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// mpsc 채널로 [`AlertEvent`]를 내보내는 싱크
///
/// 데몬의 다운스트림 경로입니다. 채널이 가득 차거나 닫혀 있으면
/// 전송 실패로 보고합니다 (블로킹하지 않음).
pub struct ChannelNotificationSink {
    tx: mpsc::Sender<AlertEvent>,
}

impl ChannelNotificationSink {
    /// 새 채널 싱크를 생성합니다.
    pub fn new(tx: mpsc::Sender<AlertEvent>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for ChannelNotificationSink {
    fn send(&self, message: &str) -> Result<(), NotifyError> {
        let alert = Alert {
            id: uuid::Uuid::new_v4().to_string(),
            title: "Host connection threshold exceeded".to_owned(),
            description: message.to_owned(),
            severity: Severity::Critical,
            rule_name: RULE_CONNECTION_FLOOD.to_owned(),
            source_ip: None,
            created_at: Utc::now(),
        };
        let event = AlertEvent::new(alert, Severity::Critical);

        self.tx
            .try_send(event)
            .map_err(|e| NotifyError::Send(e.to_string()))
    }
}

/// 로그로만 기록하는 싱크
///
/// 채널이 연결되지 않았을 때의 기본값입니다.
#[derive(Debug, Default)]
pub struct TracingNotificationSink;

impl TracingNotificationSink {
    /// 새 tracing 싱크를 생성합니다.
    pub fn new() -> Self {
        Self
    }
}

impl NotificationSink for TracingNotificationSink {
    fn send(&self, message: &str) -> Result<(), NotifyError> {
        warn!(message, "host notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_delivers_alert_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = ChannelNotificationSink::new(tx);

        sink.send("Host 10.0.0.1 has 51 active connections").unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(event.alert.rule_name, RULE_CONNECTION_FLOOD);
        assert!(event.alert.description.contains("51 active connections"));
    }

    #[tokio::test]
    async fn channel_sink_reports_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let sink = ChannelNotificationSink::new(tx);

        sink.send("first").unwrap();
        let err = sink.send("second").unwrap_err();
        assert!(matches!(err, NotifyError::Send(_)));
    }

    #[tokio::test]
    async fn channel_sink_reports_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ChannelNotificationSink::new(tx);
        assert!(sink.send("orphaned").is_err());
    }

    #[test]
    fn tracing_sink_always_succeeds() {
        let sink = TracingNotificationSink::new();
        assert!(sink.send("Host 10.0.0.1 has 51 active connections").is_ok());
    }
}
