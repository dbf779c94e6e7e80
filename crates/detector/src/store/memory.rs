//! 인메모리 그래프 스토어
//!
//! [`MemoryGraphStore`]는 [`GraphStore`] trait의 기본 구현입니다.
//! 내부 mutex로 모든 연산을 직렬화하므로 스토어 경계 위에서
//! 별도의 애플리케이션 레벨 잠금이 필요하지 않습니다.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard};

use brokerwatch_core::error::StoreError;
use brokerwatch_core::types::{
    ATTR_IP_ADDRESS, ATTR_IS_BLOCKED, ATTR_NOTIFICATION_SENT, ATTR_STATUS, AttrValue,
    ConnectionStatus, EdgeKind, HostActivity, NodeKind, NodeSelector,
};

use super::{ActivityFilter, GraphStore};

/// 저장된 노드 레코드
#[derive(Debug, Clone)]
struct NodeRecord {
    kind: NodeKind,
    attrs: HashMap<String, AttrValue>,
}

impl NodeRecord {
    /// 셀렉터의 모든 키 속성이 일치하는지 확인합니다.
    fn matches(&self, selector: &NodeSelector) -> bool {
        self.kind == selector.kind
            && selector
                .keys
                .iter()
                .all(|(name, value)| self.attrs.get(name) == Some(value))
    }

    fn flag(&self, attribute: &str) -> bool {
        self.attrs
            .get(attribute)
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    next_id: u64,
    nodes: HashMap<u64, NodeRecord>,
    edges: HashSet<(EdgeKind, u64, u64)>,
    constraints: HashSet<(NodeKind, Vec<String>)>,
}

impl StoreInner {
    fn matching_ids(&self, selector: &NodeSelector) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .nodes
            .iter()
            .filter(|(_, record)| record.matches(selector))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// 셀렉터를 정확히 하나의 노드 ID로 해석합니다.
    fn resolve_unique(&self, selector: &NodeSelector) -> Result<u64, StoreError> {
        let ids = self.matching_ids(selector);
        if ids.len() == 1 {
            Ok(ids[0])
        } else {
            Err(StoreError::SelectorMismatch {
                selector: selector.to_string(),
                found: ids.len(),
            })
        }
    }
}

/// 인메모리 그래프 스토어
///
/// 기본 / 테스트 백엔드입니다. 외부 그래프 엔진과 동일한 의미론
/// (자연 키 멱등성, 셀렉터 단일성)을 제공합니다.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    inner: Mutex<StoreInner>,
}

impl MemoryGraphStore {
    /// 빈 스토어를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 노드 수를 반환합니다 (테스트/상태 확인용).
    pub fn node_count(&self) -> usize {
        self.inner.lock().map(|g| g.nodes.len()).unwrap_or(0)
    }

    /// 저장된 엣지 수를 반환합니다 (테스트/상태 확인용).
    pub fn edge_count(&self) -> usize {
        self.inner.lock().map(|g| g.edges.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Connection("store mutex poisoned".to_owned()))
    }
}

impl GraphStore for MemoryGraphStore {
    fn upsert_node(
        &self,
        kind: NodeKind,
        selector: &NodeSelector,
        attributes: Vec<(String, AttrValue)>,
    ) -> Result<bool, StoreError> {
        if selector.kind != kind {
            return Err(StoreError::Query {
                operation: "upsert_node".to_owned(),
                reason: format!("selector kind {} does not match {kind}", selector.kind),
            });
        }

        let mut inner = self.lock()?;

        // 존재 확인 우선: 자연 키가 이미 있으면 no-op
        if !inner.matching_ids(selector).is_empty() {
            return Ok(false);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.nodes.insert(
            id,
            NodeRecord {
                kind,
                attrs: attributes.into_iter().collect(),
            },
        );
        Ok(true)
    }

    fn ensure_unique_constraint(
        &self,
        kind: NodeKind,
        key_attributes: &[&str],
    ) -> Result<(), StoreError> {
        let mut keys: Vec<String> = key_attributes.iter().map(|s| (*s).to_owned()).collect();
        keys.sort_unstable();

        let mut inner = self.lock()?;
        // 선언된 제약 집합 조회: 이미 있으면 no-op
        inner.constraints.insert((kind, keys));
        Ok(())
    }

    fn create_edge(
        &self,
        kind: EdgeKind,
        from: &NodeSelector,
        to: &NodeSelector,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let from_id = inner.resolve_unique(from)?;
        let to_id = inner.resolve_unique(to)?;
        Ok(inner.edges.insert((kind, from_id, to_id)))
    }

    fn set_attribute(
        &self,
        selector: &NodeSelector,
        attribute: &str,
        value: AttrValue,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let id = inner.resolve_unique(selector)?;
        if let Some(record) = inner.nodes.get_mut(&id) {
            record.attrs.insert(attribute.to_owned(), value);
        }
        Ok(())
    }

    fn node_attribute(
        &self,
        selector: &NodeSelector,
        attribute: &str,
    ) -> Result<Option<AttrValue>, StoreError> {
        let inner = self.lock()?;
        let ids = inner.matching_ids(selector);
        match ids.len() {
            0 => Ok(None),
            1 => Ok(inner
                .nodes
                .get(&ids[0])
                .and_then(|record| record.attrs.get(attribute))
                .cloned()),
            found => Err(StoreError::SelectorMismatch {
                selector: selector.to_string(),
                found,
            }),
        }
    }

    fn active_connection_counts(
        &self,
        filter: ActivityFilter,
    ) -> Result<Vec<HostActivity>, StoreError> {
        let inner = self.lock()?;
        let active_text = ConnectionStatus::Active.to_string();

        let mut rows = Vec::new();
        for (host_id, host) in &inner.nodes {
            if host.kind != NodeKind::Host {
                continue;
            }
            if filter.skip_blocked && host.flag(ATTR_IS_BLOCKED) {
                continue;
            }
            if filter.skip_notified && host.flag(ATTR_NOTIFICATION_SENT) {
                continue;
            }

            let count = inner
                .edges
                .iter()
                .filter(|(kind, from, to)| {
                    *kind == EdgeKind::StartsConnection
                        && from == host_id
                        && inner.nodes.get(to).is_some_and(|conn| {
                            conn.attrs.get(ATTR_STATUS).and_then(AttrValue::as_text)
                                == Some(active_text.as_str())
                        })
                })
                .count() as u64;

            // 활성 연결이 없는 호스트는 집계에 나타나지 않음
            if count == 0 {
                continue;
            }

            let ip_address: IpAddr = host
                .attrs
                .get(ATTR_IP_ADDRESS)
                .and_then(AttrValue::as_text)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| StoreError::Query {
                    operation: "active_connection_counts".to_owned(),
                    reason: format!("host node {host_id} has no parseable ip_address"),
                })?;

            rows.push(HostActivity {
                ip_address,
                active_connections: count,
            });
        }

        rows.sort_by_key(|row| row.ip_address);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokerwatch_core::types::{ATTR_NAME, ConnectionNode, HostNode};
    use chrono::Utc;

    fn host(ip: &str) -> HostNode {
        HostNode::observed(ip.parse().unwrap(), Utc::now())
    }

    fn connection(name: &str, status: ConnectionStatus) -> ConnectionNode {
        ConnectionNode {
            name: name.to_owned(),
            status,
            last_update_time: Utc::now(),
        }
    }

    fn insert_host(store: &MemoryGraphStore, ip: &str) {
        let node = host(ip);
        store
            .upsert_node(NodeKind::Host, &node.selector(), node.attributes())
            .unwrap();
    }

    fn insert_connection(store: &MemoryGraphStore, name: &str, status: ConnectionStatus) {
        let node = connection(name, status);
        store
            .upsert_node(NodeKind::Connection, &node.selector(), node.attributes())
            .unwrap();
    }

    #[test]
    fn upsert_is_idempotent_on_natural_key() {
        let store = MemoryGraphStore::new();
        let node = host("10.0.0.1");

        assert!(
            store
                .upsert_node(NodeKind::Host, &node.selector(), node.attributes())
                .unwrap()
        );
        // 같은 키로 다시 upsert: no-op
        for _ in 0..5 {
            assert!(
                !store
                    .upsert_node(NodeKind::Host, &node.selector(), node.attributes())
                    .unwrap()
            );
        }
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn upsert_rejects_kind_mismatch() {
        let store = MemoryGraphStore::new();
        let node = host("10.0.0.1");
        let result = store.upsert_node(NodeKind::Connection, &node.selector(), node.attributes());
        assert!(matches!(result, Err(StoreError::Query { .. })));
    }

    #[test]
    fn constraint_registration_is_a_noop_when_repeated() {
        let store = MemoryGraphStore::new();
        store
            .ensure_unique_constraint(NodeKind::Host, &[ATTR_IP_ADDRESS])
            .unwrap();
        store
            .ensure_unique_constraint(NodeKind::Host, &[ATTR_IP_ADDRESS])
            .unwrap();
        store
            .ensure_unique_constraint(NodeKind::Connection, &[ATTR_NAME])
            .unwrap();
    }

    #[test]
    fn create_edge_requires_both_endpoints() {
        let store = MemoryGraphStore::new();
        insert_host(&store, "10.0.0.1");

        let err = store
            .create_edge(
                EdgeKind::StartsConnection,
                &NodeSelector::host("10.0.0.1".parse().unwrap()),
                &NodeSelector::connection("missing-conn"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::SelectorMismatch { found: 0, .. }
        ));
    }

    #[test]
    fn duplicate_edge_is_a_noop() {
        let store = MemoryGraphStore::new();
        insert_host(&store, "10.0.0.1");
        insert_connection(&store, "mqtt-client_01", ConnectionStatus::Active);

        let from = NodeSelector::host("10.0.0.1".parse().unwrap());
        let to = NodeSelector::connection("mqtt-client_01");

        assert!(
            store
                .create_edge(EdgeKind::StartsConnection, &from, &to)
                .unwrap()
        );
        assert!(
            !store
                .create_edge(EdgeKind::StartsConnection, &from, &to)
                .unwrap()
        );
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn set_and_read_attribute() {
        let store = MemoryGraphStore::new();
        insert_host(&store, "10.0.0.1");
        let selector = NodeSelector::host("10.0.0.1".parse().unwrap());

        assert_eq!(
            store
                .node_attribute(&selector, ATTR_IS_BLOCKED)
                .unwrap()
                .and_then(|v| v.as_bool()),
            Some(false)
        );

        store
            .set_attribute(&selector, ATTR_IS_BLOCKED, AttrValue::Bool(true))
            .unwrap();
        assert_eq!(
            store
                .node_attribute(&selector, ATTR_IS_BLOCKED)
                .unwrap()
                .and_then(|v| v.as_bool()),
            Some(true)
        );
    }

    #[test]
    fn missing_node_attribute_is_none() {
        let store = MemoryGraphStore::new();
        let selector = NodeSelector::host("10.0.0.9".parse().unwrap());
        assert!(
            store
                .node_attribute(&selector, ATTR_IS_BLOCKED)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn set_attribute_on_missing_node_fails_loudly() {
        let store = MemoryGraphStore::new();
        let selector = NodeSelector::host("10.0.0.9".parse().unwrap());
        let err = store
            .set_attribute(&selector, ATTR_IS_BLOCKED, AttrValue::Bool(true))
            .unwrap_err();
        assert!(matches!(err, StoreError::SelectorMismatch { .. }));
    }

    #[test]
    fn activity_counts_only_active_connections() {
        let store = MemoryGraphStore::new();
        insert_host(&store, "10.0.0.1");
        insert_connection(&store, "conn-a", ConnectionStatus::Active);
        insert_connection(&store, "conn-b", ConnectionStatus::Inactive);

        let from = NodeSelector::host("10.0.0.1".parse().unwrap());
        store
            .create_edge(EdgeKind::StartsConnection, &from, &NodeSelector::connection("conn-a"))
            .unwrap();
        store
            .create_edge(EdgeKind::StartsConnection, &from, &NodeSelector::connection("conn-b"))
            .unwrap();

        let rows = store
            .active_connection_counts(ActivityFilter::default())
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].active_connections, 1);
    }

    #[test]
    fn activity_filter_skips_blocked_and_notified_hosts() {
        let store = MemoryGraphStore::new();
        insert_host(&store, "10.0.0.1");
        insert_host(&store, "10.0.0.2");
        insert_connection(&store, "conn-a", ConnectionStatus::Active);
        insert_connection(&store, "conn-b", ConnectionStatus::Active);

        store
            .create_edge(
                EdgeKind::StartsConnection,
                &NodeSelector::host("10.0.0.1".parse().unwrap()),
                &NodeSelector::connection("conn-a"),
            )
            .unwrap();
        store
            .create_edge(
                EdgeKind::StartsConnection,
                &NodeSelector::host("10.0.0.2".parse().unwrap()),
                &NodeSelector::connection("conn-b"),
            )
            .unwrap();

        store
            .set_attribute(
                &NodeSelector::host("10.0.0.1".parse().unwrap()),
                ATTR_IS_BLOCKED,
                AttrValue::Bool(true),
            )
            .unwrap();

        let rows = store
            .active_connection_counts(ActivityFilter {
                skip_blocked: true,
                skip_notified: true,
            })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ip_address, "10.0.0.2".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn activity_counts_return_empty_vec_when_no_hosts() {
        let store = MemoryGraphStore::new();
        let rows = store
            .active_connection_counts(ActivityFilter::default())
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn hosts_without_active_connections_are_omitted() {
        let store = MemoryGraphStore::new();
        insert_host(&store, "10.0.0.1");
        let rows = store
            .active_connection_counts(ActivityFilter::default())
            .unwrap();
        assert!(rows.is_empty());
    }
}
