//! 그래프 스토어 -- 자연 키 기반 멱등 그래프 연산
//!
//! [`GraphStore`]는 탐지 파이프라인이 의존하는 그래프 저장소 인터페이스입니다.
//! 노드는 항상 [`NodeSelector`](brokerwatch_core::types::NodeSelector)로
//! 지칭하며, 질의 문자열 조립은 존재하지 않습니다. 모든 연산은 자연 키에
//! 대해 멱등이고 동시 호출에 안전해야 합니다.
//!
//! 외부 그래프 엔진 연동은 이 trait의 다른 구현으로 추가합니다.
//! 기본 구현은 [`MemoryGraphStore`]입니다.

mod memory;

pub use memory::MemoryGraphStore;

use brokerwatch_core::error::StoreError;
use brokerwatch_core::types::{AttrValue, EdgeKind, HostActivity, NodeKind, NodeSelector};

/// 모니터 질의 필터
///
/// 이미 차단되었거나 알림이 발송된 호스트를 집계에서 제외합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityFilter {
    /// `is_blocked = true`인 호스트 제외
    pub skip_blocked: bool,
    /// `notification_sent = true`인 호스트 제외
    pub skip_notified: bool,
}

/// 그래프 저장소 인터페이스
///
/// 실패 시 스토어는 에러를 삼키지 않고 [`StoreError`]로 반환하며,
/// 호출자가 시도한 연산과 파라미터를 함께 로깅합니다.
pub trait GraphStore: Send + Sync {
    /// 노드를 생성합니다. 셀렉터의 자연 키가 이미 존재하면 아무것도
    /// 하지 않고 `false`를 반환합니다 (존재 확인 우선).
    fn upsert_node(
        &self,
        kind: NodeKind,
        selector: &NodeSelector,
        attributes: Vec<(String, AttrValue)>,
    ) -> Result<bool, StoreError>;

    /// 해당 노드 종류와 키 속성 조합에 유일성 제약을 보장합니다.
    ///
    /// 이미 선언된 제약에 대해서는 아무것도 하지 않습니다.
    fn ensure_unique_constraint(
        &self,
        kind: NodeKind,
        key_attributes: &[&str],
    ) -> Result<(), StoreError>;

    /// 두 노드 사이에 엣지를 생성합니다.
    ///
    /// 양쪽 셀렉터가 각각 정확히 하나의 노드로 해석되지 않으면
    /// `StoreError::SelectorMismatch`를 반환합니다.
    /// 같은 (종류, from, to) 엣지가 이미 있으면 `false`를 반환합니다.
    fn create_edge(
        &self,
        kind: EdgeKind,
        from: &NodeSelector,
        to: &NodeSelector,
    ) -> Result<bool, StoreError>;

    /// 노드의 단일 속성을 갱신합니다.
    ///
    /// 셀렉터는 정확히 하나의 노드로 해석되어야 합니다.
    fn set_attribute(
        &self,
        selector: &NodeSelector,
        attribute: &str,
        value: AttrValue,
    ) -> Result<(), StoreError>;

    /// 노드의 단일 속성을 읽습니다.
    ///
    /// 노드가 없으면 `Ok(None)`을 반환합니다 (미관측 호스트는
    /// 차단되지 않은 것으로 취급).
    fn node_attribute(
        &self,
        selector: &NodeSelector,
        attribute: &str,
    ) -> Result<Option<AttrValue>, StoreError>;

    /// 호스트별 활성 연결 수를 집계합니다.
    ///
    /// active 상태의 Connection으로 향하는 STARTS_CONNECTION 엣지를
    /// 호스트별로 세어 반환합니다. 활성 연결이 하나도 없는 호스트는
    /// 결과에 포함되지 않습니다. 결과가 없으면 빈 Vec을 반환합니다.
    fn active_connection_counts(
        &self,
        filter: ActivityFilter,
    ) -> Result<Vec<HostActivity>, StoreError>;
}
