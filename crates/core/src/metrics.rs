//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `brokerwatch_`
//! - 모듈명: `detector_`, `monitor_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(brokerwatch_core::metrics::DETECTOR_LINES_PROCESSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 추출 규칙 레이블 키 (ip, port, timestamp, name, version)
pub const LABEL_RULE: &str = "rule";

/// 노드/엣지 종류 레이블 키 (host, connection, service)
pub const LABEL_KIND: &str = "kind";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Detector 메트릭 ────────────────────────────────────────────────

/// Detector: 읽어들인 로그 라인 수 (counter)
pub const DETECTOR_LINES_READ_TOTAL: &str = "brokerwatch_detector_lines_read_total";

/// Detector: 처리 완료된 로그 라인 수 (counter)
pub const DETECTOR_LINES_PROCESSED_TOTAL: &str = "brokerwatch_detector_lines_processed_total";

/// Detector: 추출 규칙 미매칭 수 (counter, label: rule)
pub const DETECTOR_EXTRACTION_MISSES_TOTAL: &str = "brokerwatch_detector_extraction_misses_total";

/// Detector: 추출 규칙 다중 매칭(모호성) 수 (counter, label: rule)
pub const DETECTOR_EXTRACTION_AMBIGUITIES_TOTAL: &str =
    "brokerwatch_detector_extraction_ambiguities_total";

/// Detector: 생성된 노드 수 (counter, label: kind)
pub const DETECTOR_NODES_CREATED_TOTAL: &str = "brokerwatch_detector_nodes_created_total";

/// Detector: 생성된 엣지 수 (counter, label: kind)
pub const DETECTOR_EDGES_CREATED_TOTAL: &str = "brokerwatch_detector_edges_created_total";

/// Detector: 스토어 연산 실패 수 (counter)
pub const DETECTOR_STORE_ERRORS_TOTAL: &str = "brokerwatch_detector_store_errors_total";

/// Detector: 로그 파일 로테이션 감지 수 (counter)
pub const DETECTOR_LOG_ROTATIONS_TOTAL: &str = "brokerwatch_detector_log_rotations_total";

// ─── Monitor 메트릭 ─────────────────────────────────────────────────

/// Monitor: 수행된 스캔 수 (counter)
pub const MONITOR_SCANS_TOTAL: &str = "brokerwatch_monitor_scans_total";

/// Monitor: 차단된 호스트 수 (counter)
pub const MONITOR_HOSTS_BLOCKED_TOTAL: &str = "brokerwatch_monitor_hosts_blocked_total";

/// Monitor: 발송된 알림 수 (counter)
pub const MONITOR_NOTIFICATIONS_SENT_TOTAL: &str = "brokerwatch_monitor_notifications_sent_total";

/// Monitor: 알림 발송 실패 수 (counter)
pub const MONITOR_NOTIFICATION_FAILURES_TOTAL: &str =
    "brokerwatch_monitor_notification_failures_total";

/// Monitor: 마지막 스캔에서 관측된 호스트 수 (gauge)
pub const MONITOR_SCANNED_HOSTS: &str = "brokerwatch_monitor_scanned_hosts";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "brokerwatch_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version)
pub const DAEMON_BUILD_INFO: &str = "brokerwatch_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// `metrics::describe_counter!()`, `describe_gauge!()`를 호출하여
/// Prometheus HELP 텍스트를 설정합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `brokerwatch-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Detector
    describe_counter!(
        DETECTOR_LINES_READ_TOTAL,
        "Total number of raw log lines read from the broker log"
    );
    describe_counter!(
        DETECTOR_LINES_PROCESSED_TOTAL,
        "Total number of log lines fully processed by the ingestion loop"
    );
    describe_counter!(
        DETECTOR_EXTRACTION_MISSES_TOTAL,
        "Total number of lines where an extraction rule found no match"
    );
    describe_counter!(
        DETECTOR_EXTRACTION_AMBIGUITIES_TOTAL,
        "Total number of lines where an extraction rule found multiple matches"
    );
    describe_counter!(
        DETECTOR_NODES_CREATED_TOTAL,
        "Total number of graph nodes created per kind"
    );
    describe_counter!(
        DETECTOR_EDGES_CREATED_TOTAL,
        "Total number of graph edges created per kind"
    );
    describe_counter!(
        DETECTOR_STORE_ERRORS_TOTAL,
        "Total number of failed graph store operations"
    );
    describe_counter!(
        DETECTOR_LOG_ROTATIONS_TOTAL,
        "Total number of log file rotations detected by the tailer"
    );

    // Monitor
    describe_counter!(
        MONITOR_SCANS_TOTAL,
        "Total number of anomaly monitor scan iterations"
    );
    describe_counter!(
        MONITOR_HOSTS_BLOCKED_TOTAL,
        "Total number of hosts blocked for exceeding the connection threshold"
    );
    describe_counter!(
        MONITOR_NOTIFICATIONS_SENT_TOTAL,
        "Total number of notifications sent for blocked hosts"
    );
    describe_counter!(
        MONITOR_NOTIFICATION_FAILURES_TOTAL,
        "Total number of failed notification deliveries"
    );
    describe_gauge!(
        MONITOR_SCANNED_HOSTS,
        "Number of hosts observed in the last monitor scan"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Brokerwatch daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        DETECTOR_LINES_READ_TOTAL,
        DETECTOR_LINES_PROCESSED_TOTAL,
        DETECTOR_EXTRACTION_MISSES_TOTAL,
        DETECTOR_EXTRACTION_AMBIGUITIES_TOTAL,
        DETECTOR_NODES_CREATED_TOTAL,
        DETECTOR_EDGES_CREATED_TOTAL,
        DETECTOR_STORE_ERRORS_TOTAL,
        DETECTOR_LOG_ROTATIONS_TOTAL,
        MONITOR_SCANS_TOTAL,
        MONITOR_HOSTS_BLOCKED_TOTAL,
        MONITOR_NOTIFICATIONS_SENT_TOTAL,
        MONITOR_NOTIFICATION_FAILURES_TOTAL,
        MONITOR_SCANNED_HOSTS,
        DAEMON_UPTIME_SECONDS,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_brokerwatch_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("brokerwatch_"),
                "Metric '{}' does not start with 'brokerwatch_' prefix",
                name
            );
        }
    }

    #[test]
    fn all_metrics_have_15_entries() {
        assert_eq!(
            ALL_METRIC_NAMES.len(),
            15,
            "Expected 15 metrics (8 Detector + 5 Monitor + 2 Daemon)"
        );
    }

    #[test]
    fn describe_all_does_not_panic() {
        // describe_all() should not panic even without a recorder installed
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        let labels = [LABEL_RULE, LABEL_KIND, LABEL_RESULT];
        for label in &labels {
            assert_eq!(
                label.to_lowercase(),
                *label,
                "Label key '{}' should be lowercase",
                label
            );
        }
    }
}
