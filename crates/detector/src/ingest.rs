//! 적재 루프 -- 라인 단위 그래프 갱신 상태 머신
//!
//! 한 라인을 완전히 처리한 뒤에야 다음 라인을 읽습니다. 라인마다:
//!
//! 1. 다섯 개의 추출 규칙 적용
//! 2. Host 집합 완전 -> Host upsert + 유일성 제약
//! 3. 연결 초기화 마커 포함 -> Connection 집합 초기화 (상태 active)
//! 4. Connection 집합 완전 (호스트 미차단 시) -> Connection upsert + 제약,
//!    Service 집합 완전 -> Service upsert + 복합 제약
//! 5. 연결 마커 포함 + 이름 기지 -> 상태 active + 시각 갱신,
//!    STARTS_CONNECTION / CONNECTS_TO 엣지 생성
//! 6. 해제 마커 포함 + 이름 기지 -> 상태 inactive + 시각 갱신
//! 7. Host / Connection 집합 초기화 (상태는 다시 active로 시드)
//!
//! 스토어 실패는 현재 라인에만 치명적입니다: 에러를 로깅하고 7단계의
//! 초기화는 그대로 수행하여 다음 라인이 깨끗한 필드 집합을 보게 합니다.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{debug, error};

use brokerwatch_core::metrics::{
    DETECTOR_EDGES_CREATED_TOTAL, DETECTOR_LINES_PROCESSED_TOTAL, DETECTOR_NODES_CREATED_TOTAL,
    DETECTOR_STORE_ERRORS_TOTAL, LABEL_KIND,
};
use brokerwatch_core::types::{
    ATTR_IP_ADDRESS, ATTR_LAST_UPDATE_TIME, ATTR_NAME, ATTR_PORT, ATTR_STATUS, ATTR_VERSION,
    AttrValue, ConnectionStatus, EdgeKind, NodeKind, NodeSelector, ServiceNode,
};

use crate::config::DetectorConfig;
use crate::error::DetectorError;
use crate::extract::RecordExtractor;
use crate::store::GraphStore;
use crate::tail::{LogTailer, RawLine};

/// 연결 수립을 나타내는 로그 마커
const CONNECT_MARKER: &str = "New client connected";
/// 연결 종료를 나타내는 로그 마커
const DISCONNECT_MARKERS: [&str; 2] = ["disconnected", "disconnecting"];

/// 라인 단위 적재 루프
pub struct IngestionLoop {
    tailer: LogTailer,
    extractor: RecordExtractor,
    store: Arc<dyn GraphStore>,
    reset_marker: String,
    /// 마지막으로 관측된 Service (CONNECTS_TO 엣지의 폴백 대상)
    last_service: Option<ServiceNode>,
}

impl IngestionLoop {
    /// 설정과 스토어로 적재 루프를 생성합니다.
    pub fn new(
        config: &DetectorConfig,
        store: Arc<dyn GraphStore>,
    ) -> Result<Self, DetectorError> {
        let tailer = LogTailer::new(
            &config.log_path,
            std::time::Duration::from_millis(config.poll_interval_ms),
        );
        let extractor = RecordExtractor::new(&config.service_name, &config.service_protocol)?;
        Ok(Self {
            tailer,
            extractor,
            store,
            reset_marker: config.reset_marker.clone(),
            last_service: None,
        })
    }

    /// 적재 루프를 실행합니다. 프로세스 수명 동안 반환하지 않습니다.
    ///
    /// 소유 태스크가 중단(abort)될 때 함께 종료됩니다.
    pub async fn run(mut self) {
        loop {
            match self.tailer.next_line().await {
                Ok(line) => self.process_line(&line),
                Err(e) => {
                    error!(error = %e, "failed to read log line, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
            }
        }
    }

    /// 라인 하나를 완전히 처리합니다.
    ///
    /// 스토어 실패 여부와 무관하게 필드 집합 초기화는 항상 수행됩니다.
    pub fn process_line(&mut self, raw: &RawLine) {
        let text = raw.as_text().into_owned();
        self.extractor.apply(&text);

        if let Err(e) = self.update_graph(&text) {
            counter!(DETECTOR_STORE_ERRORS_TOTAL).increment(1);
            error!(
                error = %e,
                line_offset = raw.offset,
                "graph update failed, skipping line"
            );
        }

        self.extractor.reset_transient();
        counter!(DETECTOR_LINES_PROCESSED_TOTAL).increment(1);
    }

    fn update_graph(&mut self, text: &str) -> Result<(), DetectorError> {
        // 2단계: Host
        if let Some(host) = self.extractor.host_node() {
            if self
                .store
                .upsert_node(NodeKind::Host, &host.selector(), host.attributes())?
            {
                counter!(DETECTOR_NODES_CREATED_TOTAL, LABEL_KIND => "host").increment(1);
                debug!(host = %host, "host node created");
            }
            self.store
                .ensure_unique_constraint(NodeKind::Host, &[ATTR_IP_ADDRESS])?;
        }

        // 3단계: 연결 초기화 마커
        if text.contains(&self.reset_marker) {
            debug!("connection reset marker observed, clearing connection fields");
            self.extractor.reset_connection();
        }

        // 4단계: Connection / Service
        // 차단은 새 Connection 노드 생성만 막습니다. 기존 연결의 상태
        // 전이(5-6단계)와 Service 적재는 차단 여부와 무관하게 수행됩니다.
        if let Some(conn) = self.extractor.connection_node() {
            if self.host_is_blocked()? {
                debug!(
                    ip = ?self.extractor.host_ip(),
                    connection = %conn,
                    "host is blocked, skipping connection upsert"
                );
            } else {
                if self
                    .store
                    .upsert_node(NodeKind::Connection, &conn.selector(), conn.attributes())?
                {
                    counter!(DETECTOR_NODES_CREATED_TOTAL, LABEL_KIND => "connection").increment(1);
                    debug!(connection = %conn, "connection node created");
                }
                self.store
                    .ensure_unique_constraint(NodeKind::Connection, &[ATTR_NAME])?;
            }
        }

        if let Some(service) = self.extractor.service_node() {
            if self
                .store
                .upsert_node(NodeKind::Service, &service.selector(), service.attributes())?
            {
                counter!(DETECTOR_NODES_CREATED_TOTAL, LABEL_KIND => "service").increment(1);
                debug!(service = %service, "service node created");
            }
            self.store.ensure_unique_constraint(
                NodeKind::Service,
                &[ATTR_NAME, ATTR_VERSION, ATTR_PORT],
            )?;
            self.last_service = Some(service);
        }

        // 5단계: 연결 수립
        if text.contains(CONNECT_MARKER) {
            if let Some(name) = self.extractor.connection_name().map(str::to_owned) {
                self.mark_connection(&name, ConnectionStatus::Active)?;

                let conn_sel = NodeSelector::connection(name);
                match self.extractor.host_ip() {
                    Some(ip) => {
                        if self.store.create_edge(
                            EdgeKind::StartsConnection,
                            &NodeSelector::host(ip),
                            &conn_sel,
                        )? {
                            counter!(DETECTOR_EDGES_CREATED_TOTAL, LABEL_KIND => "starts_connection")
                                .increment(1);
                        }
                    }
                    None => {
                        debug!("connect line without known host, skipping STARTS_CONNECTION edge");
                    }
                }

                match &self.last_service {
                    Some(service) => {
                        if self.store.create_edge(
                            EdgeKind::ConnectsTo,
                            &conn_sel,
                            &service.selector(),
                        )? {
                            counter!(DETECTOR_EDGES_CREATED_TOTAL, LABEL_KIND => "connects_to")
                                .increment(1);
                        }
                    }
                    None => {
                        debug!("no service observed yet, skipping CONNECTS_TO edge");
                    }
                }
            }
        }
        // 6단계: 연결 종료
        else if DISCONNECT_MARKERS.iter().any(|m| text.contains(m)) {
            if let Some(name) = self.extractor.connection_name().map(str::to_owned) {
                self.mark_connection(&name, ConnectionStatus::Inactive)?;
            }
        }

        Ok(())
    }

    /// 연결 상태와 갱신 시각을 함께 기록합니다.
    fn mark_connection(
        &self,
        name: &str,
        status: ConnectionStatus,
    ) -> Result<(), DetectorError> {
        let selector = NodeSelector::connection(name);
        let time = self.extractor.last_update_time().unwrap_or_else(Utc::now);
        self.store.set_attribute(
            &selector,
            ATTR_STATUS,
            AttrValue::Text(status.to_string()),
        )?;
        self.store
            .set_attribute(&selector, ATTR_LAST_UPDATE_TIME, AttrValue::Time(time))?;
        debug!(connection = name, status = %status, "connection status updated");
        Ok(())
    }

    /// 현재 라인의 호스트가 차단 상태인지 확인합니다.
    ///
    /// 호스트를 모르거나 스토어에 없는 호스트는 차단되지 않은 것으로
    /// 취급합니다.
    fn host_is_blocked(&self) -> Result<bool, DetectorError> {
        let Some(ip) = self.extractor.host_ip() else {
            return Ok(false);
        };
        let blocked = self
            .store
            .node_attribute(
                &NodeSelector::host(ip),
                brokerwatch_core::types::ATTR_IS_BLOCKED,
            )?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfigBuilder;
    use crate::store::{ActivityFilter, MemoryGraphStore};
    use brokerwatch_core::error::StoreError;
    use brokerwatch_core::types::{ATTR_IS_BLOCKED, HostActivity};
    use bytes::Bytes;

    fn raw(line: &str) -> RawLine {
        RawLine {
            data: Bytes::from(line.to_owned()),
            offset: 0,
        }
    }

    fn test_loop(store: Arc<dyn GraphStore>) -> IngestionLoop {
        let config = DetectorConfigBuilder::new()
            .log_path("/tmp/mosquitto-test.log")
            .build()
            .unwrap();
        IngestionLoop::new(&config, store).unwrap()
    }

    fn status_of(store: &MemoryGraphStore, name: &str) -> Option<String> {
        store
            .node_attribute(&NodeSelector::connection(name), ATTR_STATUS)
            .unwrap()
            .and_then(|v| v.as_text().map(str::to_owned))
    }

    #[test]
    fn connect_line_builds_host_connection_and_edge() {
        let store = Arc::new(MemoryGraphStore::new());
        let mut ingest = test_loop(store.clone());

        ingest.process_line(&raw(
            "1700000000: New client connected from 10.0.0.1:47642 as mqtt-client_01 (p2, c1, k60).\n",
        ));

        // Host + Connection 생성
        assert_eq!(store.node_count(), 2);
        assert_eq!(status_of(&store, "mqtt-client_01").as_deref(), Some("active"));

        // STARTS_CONNECTION 엣지 생성 (Service가 없으므로 CONNECTS_TO는 생략)
        assert_eq!(store.edge_count(), 1);
        let rows = store
            .active_connection_counts(ActivityFilter::default())
            .unwrap();
        assert_eq!(
            rows,
            vec![HostActivity {
                ip_address: "10.0.0.1".parse().unwrap(),
                active_connections: 1,
            }]
        );
    }

    #[test]
    fn service_lines_enable_connects_to_edge() {
        let store = Arc::new(MemoryGraphStore::new());
        let mut ingest = test_loop(store.clone());

        ingest.process_line(&raw("1700000000: mosquitto version 2.0.18 starting\n"));
        ingest.process_line(&raw("1700000000: Opening ipv4 listen socket on port 1883.\n"));
        ingest.process_line(&raw(
            "1700000001: New client connected from 10.0.0.1:47642 as mqtt-client_01 (p2, c1, k60).\n",
        ));

        // Host + Connection + Service, 엣지는 STARTS_CONNECTION + CONNECTS_TO
        assert_eq!(store.node_count(), 3);
        assert_eq!(store.edge_count(), 2);
    }

    #[test]
    fn disconnect_line_marks_connection_inactive() {
        let store = Arc::new(MemoryGraphStore::new());
        let mut ingest = test_loop(store.clone());

        ingest.process_line(&raw(
            "1700000000: New client connected from 10.0.0.1:47642 as mqtt-client_01 (p2, c1, k60).\n",
        ));
        ingest.process_line(&raw("1700000005: Client mqtt-client_01 disconnected.\n"));

        assert_eq!(
            status_of(&store, "mqtt-client_01").as_deref(),
            Some("inactive")
        );
        let time = store
            .node_attribute(
                &NodeSelector::connection("mqtt-client_01"),
                ATTR_LAST_UPDATE_TIME,
            )
            .unwrap()
            .and_then(|v| v.as_time())
            .unwrap();
        assert_eq!(time.timestamp(), 1_700_000_005);
    }

    #[test]
    fn disconnecting_marker_also_marks_inactive() {
        let store = Arc::new(MemoryGraphStore::new());
        let mut ingest = test_loop(store.clone());

        ingest.process_line(&raw(
            "1700000000: New client connected from 10.0.0.1:47642 as mqtt-client_01 (p2, c1, k60).\n",
        ));
        ingest.process_line(&raw(
            "1700000006: disconnecting mqtt-client_01 due to protocol error\n",
        ));

        assert_eq!(
            status_of(&store, "mqtt-client_01").as_deref(),
            Some("inactive")
        );
    }

    #[test]
    fn malformed_line_causes_no_store_mutation() {
        let store = Arc::new(MemoryGraphStore::new());
        let mut ingest = test_loop(store.clone());

        ingest.process_line(&raw("completely uninteresting text\n"));
        ingest.process_line(&raw("\n"));

        assert_eq!(store.node_count(), 0);
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn reset_marker_discards_pending_connection_fields() {
        let store = Arc::new(MemoryGraphStore::new());
        let mut ingest = test_loop(store.clone());

        // "in-memory"가 연결명 규칙에 걸리지만, 마커가 같은 라인에 있어
        // 완전성 검사 전에 초기화됨
        ingest.process_line(&raw(
            "1700000000: Saving in-memory database to /var/lib/mosquitto/mosquitto.db.\n",
        ));

        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn blocked_host_new_connection_is_not_created() {
        let store = Arc::new(MemoryGraphStore::new());
        let mut ingest = test_loop(store.clone());

        ingest.process_line(&raw(
            "1700000000: New client connected from 10.0.0.1:47642 as mqtt-client_01 (p2, c1, k60).\n",
        ));
        store
            .set_attribute(
                &NodeSelector::host("10.0.0.1".parse().unwrap()),
                ATTR_IS_BLOCKED,
                AttrValue::Bool(true),
            )
            .unwrap();

        ingest.process_line(&raw(
            "1700000001: New client connected from 10.0.0.1:47643 as mqtt-client_02 (p2, c1, k60).\n",
        ));

        // 새 연결 노드가 생기지 않음
        assert!(status_of(&store, "mqtt-client_02").is_none());
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn blocked_host_disconnect_still_marks_inactive() {
        let store = Arc::new(MemoryGraphStore::new());
        let mut ingest = test_loop(store.clone());

        ingest.process_line(&raw(
            "1700000000: New client connected from 10.0.0.1:47642 as mqtt-client_01 (p2, c1, k60).\n",
        ));
        store
            .set_attribute(
                &NodeSelector::host("10.0.0.1".parse().unwrap()),
                ATTR_IS_BLOCKED,
                AttrValue::Bool(true),
            )
            .unwrap();

        // 차단 이후에도 기존 연결의 종료는 반영됨
        ingest.process_line(&raw("1700000005: Client mqtt-client_01 disconnected.\n"));

        assert_eq!(
            status_of(&store, "mqtt-client_01").as_deref(),
            Some("inactive")
        );
    }

    #[test]
    fn blocked_host_does_not_suppress_service_upsert() {
        let store = Arc::new(MemoryGraphStore::new());
        let mut ingest = test_loop(store.clone());

        ingest.process_line(&raw(
            "1700000000: New client connected from 10.0.0.1:47642 as mqtt-client_01 (p2, c1, k60).\n",
        ));
        store
            .set_attribute(
                &NodeSelector::host("10.0.0.1".parse().unwrap()),
                ATTR_IS_BLOCKED,
                AttrValue::Bool(true),
            )
            .unwrap();

        // 버전 라인으로 Service 집합이 완성됨 (포트는 이전 라인에서 누적)
        ingest.process_line(&raw("1700000001: mosquitto version 2.0.18 starting\n"));

        // Host + Connection + Service
        assert_eq!(store.node_count(), 3);
    }

    #[test]
    fn repeated_connect_lines_are_idempotent() {
        let store = Arc::new(MemoryGraphStore::new());
        let mut ingest = test_loop(store.clone());

        for _ in 0..3 {
            ingest.process_line(&raw(
                "1700000000: New client connected from 10.0.0.1:47642 as mqtt-client_01 (p2, c1, k60).\n",
            ));
        }

        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
    }

    /// 모든 연산이 실패하는 스토어 (실패 경로 검증용)
    struct FailingStore;

    impl GraphStore for FailingStore {
        fn upsert_node(
            &self,
            _kind: NodeKind,
            _selector: &NodeSelector,
            _attributes: Vec<(String, AttrValue)>,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Connection("backend down".to_owned()))
        }

        fn ensure_unique_constraint(
            &self,
            _kind: NodeKind,
            _key_attributes: &[&str],
        ) -> Result<(), StoreError> {
            Err(StoreError::Connection("backend down".to_owned()))
        }

        fn create_edge(
            &self,
            _kind: EdgeKind,
            _from: &NodeSelector,
            _to: &NodeSelector,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Connection("backend down".to_owned()))
        }

        fn set_attribute(
            &self,
            _selector: &NodeSelector,
            _attribute: &str,
            _value: AttrValue,
        ) -> Result<(), StoreError> {
            Err(StoreError::Connection("backend down".to_owned()))
        }

        fn node_attribute(
            &self,
            _selector: &NodeSelector,
            _attribute: &str,
        ) -> Result<Option<AttrValue>, StoreError> {
            Err(StoreError::Connection("backend down".to_owned()))
        }

        fn active_connection_counts(
            &self,
            _filter: ActivityFilter,
        ) -> Result<Vec<HostActivity>, StoreError> {
            Err(StoreError::Connection("backend down".to_owned()))
        }
    }

    #[test]
    fn store_failure_is_fatal_for_current_line_only() {
        let mut ingest = test_loop(Arc::new(FailingStore));

        // 두 라인 모두 에러가 로깅될 뿐 패닉하지 않음
        ingest.process_line(&raw(
            "1700000000: New client connected from 10.0.0.1:47642 as mqtt-client_01 (p2, c1, k60).\n",
        ));
        ingest.process_line(&raw(
            "1700000001: New client connected from 10.0.0.2:47643 as mqtt-client_02 (p2, c1, k60).\n",
        ));
    }
}
