//! 이상 징후 모니터 -- 임계값 초과 호스트의 차단과 알림
//!
//! 적재 루프와 동시에 실행되며, 주기마다 호스트별 활성 연결 수를
//! 집계해 임계값을 **초과한** (threshold보다 큰) 호스트를 차단합니다.
//! 차단이 먼저이고 알림은 그 다음입니다: 알림 전달이 실패해도 차단은
//! 유지되며, `notification_sent`는 전달이 확인된 경우에만 기록됩니다.
//!
//! 이미 차단되었거나 알림이 발송된 호스트는 집계 단계에서 제외되므로,
//! 호스트당 알림은 최대 한 번입니다. 전달에 실패한 알림은 유실됩니다:
//! 호스트는 이미 차단으로 집계에서 빠졌으므로 중복 알림도 없습니다.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use brokerwatch_core::metrics::{
    DETECTOR_STORE_ERRORS_TOTAL, MONITOR_HOSTS_BLOCKED_TOTAL,
    MONITOR_NOTIFICATION_FAILURES_TOTAL, MONITOR_NOTIFICATIONS_SENT_TOTAL, MONITOR_SCANNED_HOSTS,
    MONITOR_SCANS_TOTAL,
};
use brokerwatch_core::types::{
    ATTR_IS_BLOCKED, ATTR_NOTIFICATION_SENT, AttrValue, HostActivity, NodeSelector,
};

use crate::notify::NotificationSink;
use crate::store::{ActivityFilter, GraphStore};

/// 주기 스캔 모니터
pub struct AnomalyMonitor {
    store: Arc<dyn GraphStore>,
    sink: Arc<dyn NotificationSink>,
    threshold: u64,
    interval: Duration,
    cancel: CancellationToken,
}

impl AnomalyMonitor {
    /// 새 모니터를 생성합니다.
    pub fn new(
        store: Arc<dyn GraphStore>,
        sink: Arc<dyn NotificationSink>,
        threshold: u64,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            sink,
            threshold,
            interval,
            cancel,
        }
    }

    /// 취소될 때까지 주기적으로 스캔합니다. 첫 스캔은 즉시 수행합니다.
    pub async fn run(self) {
        info!(
            threshold = self.threshold,
            interval_secs = self.interval.as_secs(),
            "anomaly monitor started"
        );
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.scan();
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }
        info!("anomaly monitor stopped");
    }

    /// 단일 스캔 패스를 수행합니다.
    ///
    /// 스토어 실패는 이번 패스를 건너뛸 뿐이며 다음 주기에 다시
    /// 시도됩니다.
    pub fn scan(&self) {
        counter!(MONITOR_SCANS_TOTAL).increment(1);

        let filter = ActivityFilter {
            skip_blocked: true,
            skip_notified: true,
        };
        let rows = match self.store.active_connection_counts(filter) {
            Ok(rows) => rows,
            Err(e) => {
                counter!(DETECTOR_STORE_ERRORS_TOTAL).increment(1);
                error!(error = %e, "activity query failed, skipping scan");
                return;
            }
        };
        gauge!(MONITOR_SCANNED_HOSTS).set(rows.len() as f64);
        debug!(hosts = rows.len(), "scan pass complete");

        for row in rows {
            if row.active_connections > self.threshold {
                self.block_and_notify(&row);
            }
        }
    }

    fn block_and_notify(&self, activity: &HostActivity) {
        let selector = NodeSelector::host(activity.ip_address);

        // 차단이 먼저: 알림 실패와 무관하게 유지됨
        if let Err(e) =
            self.store
                .set_attribute(&selector, ATTR_IS_BLOCKED, AttrValue::Bool(true))
        {
            counter!(DETECTOR_STORE_ERRORS_TOTAL).increment(1);
            error!(
                ip = %activity.ip_address,
                error = %e,
                "failed to block host"
            );
            return;
        }
        counter!(MONITOR_HOSTS_BLOCKED_TOTAL).increment(1);
        warn!(
            ip = %activity.ip_address,
            active_connections = activity.active_connections,
            threshold = self.threshold,
            "host blocked"
        );

        let message = format!(
            "Host {} has {} active connections",
            activity.ip_address, activity.active_connections
        );
        match self.sink.send(&message) {
            Ok(()) => {
                counter!(MONITOR_NOTIFICATIONS_SENT_TOTAL).increment(1);
                // 전달이 확인된 경우에만 기록
                if let Err(e) = self.store.set_attribute(
                    &selector,
                    ATTR_NOTIFICATION_SENT,
                    AttrValue::Bool(true),
                ) {
                    counter!(DETECTOR_STORE_ERRORS_TOTAL).increment(1);
                    error!(
                        ip = %activity.ip_address,
                        error = %e,
                        "failed to record notification flag"
                    );
                }
            }
            Err(e) => {
                counter!(MONITOR_NOTIFICATION_FAILURES_TOTAL).increment(1);
                warn!(
                    ip = %activity.ip_address,
                    error = %e,
                    "notification delivery failed, host remains blocked"
                );
            }
        }
    }
}
