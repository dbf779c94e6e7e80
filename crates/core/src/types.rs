//! 도메인 타입 — 그래프 데이터 모델과 공통 타입
//!
//! 브로커 로그에서 추출한 엔티티는 세 종류의 노드(Host / Connection / Service)와
//! 두 종류의 엣지(STARTS_CONNECTION / CONNECTS_TO)로 그래프에 저장됩니다.
//! 노드는 자연 키 기반의 [`NodeSelector`]로만 지칭하며,
//! 문자열 질의 조립은 어디에서도 사용하지 않습니다.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- 속성 이름 상수 ---
// 노드 속성은 모든 모듈이 동일한 이름으로 읽고 씁니다.

/// Host: IP 주소 (자연 키)
pub const ATTR_IP_ADDRESS: &str = "ip_address";
/// Host: 최초 관측 시각
pub const ATTR_CREATION_TIME: &str = "creation_time";
/// Host: 차단 여부
pub const ATTR_IS_BLOCKED: &str = "is_blocked";
/// Host: 알림 발송 여부
pub const ATTR_NOTIFICATION_SENT: &str = "notification_sent";
/// Connection/Service: 이름
pub const ATTR_NAME: &str = "name";
/// Connection: 활성 상태
pub const ATTR_STATUS: &str = "status";
/// Connection: 마지막 갱신 시각
pub const ATTR_LAST_UPDATE_TIME: &str = "last_update_time";
/// Service: 리스너 포트
pub const ATTR_PORT: &str = "port";
/// Service: 프로토콜
pub const ATTR_PROTOCOL: &str = "protocol";
/// Service: 버전
pub const ATTR_VERSION: &str = "version";

/// 그래프 노드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// 브로커에 접속하는 원격 호스트
    Host,
    /// 클라이언트 연결 (MQTT 세션)
    Connection,
    /// 브로커가 제공하는 서비스 (리스너)
    Service,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "Host"),
            Self::Connection => write!(f, "Connection"),
            Self::Service => write!(f, "Service"),
        }
    }
}

/// 그래프 엣지 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Host -> Connection
    StartsConnection,
    /// Connection -> Service
    ConnectsTo,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartsConnection => write!(f, "STARTS_CONNECTION"),
            Self::ConnectsTo => write!(f, "CONNECTS_TO"),
        }
    }
}

/// 연결 상태
///
/// 연결 노드는 삭제되지 않고 상태만 전이됩니다 (`Active` <-> `Inactive`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// 활성 연결
    Active,
    /// 종료된 연결 (기본값)
    #[default]
    Inactive,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// 타입이 지정된 노드 속성 값
///
/// 문자열로 직렬화된 값 대신 타입을 유지하여 스토어가
/// 비교와 집계를 타입 안전하게 수행할 수 있습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// 문자열
    Text(String),
    /// 정수
    Int(i64),
    /// 불리언
    Bool(bool),
    /// 시각
    Time(DateTime<Utc>),
}

impl AttrValue {
    /// 문자열 값이면 참조를 반환합니다.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 정수 값이면 반환합니다.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// 불리언 값이면 반환합니다.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// 시각 값이면 반환합니다.
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Time(v) => write!(f, "{}", v.timestamp()),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

/// 자연 키 기반 노드 셀렉터
///
/// 노드 종류와 키 속성(이름, 값) 목록으로 노드를 지칭합니다.
/// 스토어 연산은 셀렉터가 정확히 하나의 노드로 해석될 때만 수행됩니다.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSelector {
    /// 대상 노드 종류
    pub kind: NodeKind,
    /// 키 속성 (이름, 값) 목록
    pub keys: Vec<(String, AttrValue)>,
}

impl NodeSelector {
    /// 임의의 키 속성으로 셀렉터를 생성합니다.
    pub fn new(kind: NodeKind, keys: Vec<(String, AttrValue)>) -> Self {
        Self { kind, keys }
    }

    /// Host 노드 셀렉터 (키: ip_address)
    pub fn host(ip: IpAddr) -> Self {
        Self {
            kind: NodeKind::Host,
            keys: vec![(ATTR_IP_ADDRESS.to_owned(), AttrValue::Text(ip.to_string()))],
        }
    }

    /// Connection 노드 셀렉터 (키: name)
    pub fn connection(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Connection,
            keys: vec![(ATTR_NAME.to_owned(), AttrValue::Text(name.into()))],
        }
    }

    /// Service 노드 셀렉터 (복합 키: name, version, port)
    pub fn service(name: impl Into<String>, version: impl Into<String>, port: u16) -> Self {
        Self {
            kind: NodeKind::Service,
            keys: vec![
                (ATTR_NAME.to_owned(), AttrValue::Text(name.into())),
                (ATTR_VERSION.to_owned(), AttrValue::Text(version.into())),
                (ATTR_PORT.to_owned(), AttrValue::Int(i64::from(port))),
            ],
        }
    }
}

impl fmt::Display for NodeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.kind)?;
        for (i, (name, value)) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, "}}")
    }
}

/// Host 노드
///
/// 브로커에 접속하는 원격 호스트를 나타냅니다.
/// `is_blocked`와 `notification_sent` 플래그는 false -> true로만 전이되며
/// 이 시스템이 되돌리지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostNode {
    /// IP 주소 (자연 키)
    pub ip_address: IpAddr,
    /// 최초 관측 시각
    pub creation_time: DateTime<Utc>,
    /// 차단 여부
    pub is_blocked: bool,
    /// 알림 발송 여부
    pub notification_sent: bool,
}

impl HostNode {
    /// 방금 관측된 호스트를 생성합니다 (플래그는 모두 false).
    pub fn observed(ip_address: IpAddr, creation_time: DateTime<Utc>) -> Self {
        Self {
            ip_address,
            creation_time,
            is_blocked: false,
            notification_sent: false,
        }
    }

    /// 이 노드를 지칭하는 셀렉터를 반환합니다.
    pub fn selector(&self) -> NodeSelector {
        NodeSelector::host(self.ip_address)
    }

    /// 스토어에 기록할 속성 목록을 반환합니다.
    pub fn attributes(&self) -> Vec<(String, AttrValue)> {
        vec![
            (
                ATTR_IP_ADDRESS.to_owned(),
                AttrValue::Text(self.ip_address.to_string()),
            ),
            (
                ATTR_CREATION_TIME.to_owned(),
                AttrValue::Time(self.creation_time),
            ),
            (ATTR_IS_BLOCKED.to_owned(), AttrValue::Bool(self.is_blocked)),
            (
                ATTR_NOTIFICATION_SENT.to_owned(),
                AttrValue::Bool(self.notification_sent),
            ),
        ]
    }
}

impl fmt::Display for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Host[{}] blocked={} notified={}",
            self.ip_address, self.is_blocked, self.notification_sent,
        )
    }
}

/// Connection 노드
///
/// 클라이언트 연결 세션을 나타냅니다. 연결 종료 시 삭제되지 않고
/// `status`가 `Inactive`로 전이됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionNode {
    /// 연결 이름 (자연 키, 예: "mqtt-client_01")
    pub name: String,
    /// 활성 상태
    pub status: ConnectionStatus,
    /// 마지막 상태 갱신 시각
    pub last_update_time: DateTime<Utc>,
}

impl ConnectionNode {
    /// 이 노드를 지칭하는 셀렉터를 반환합니다.
    pub fn selector(&self) -> NodeSelector {
        NodeSelector::connection(self.name.clone())
    }

    /// 스토어에 기록할 속성 목록을 반환합니다.
    pub fn attributes(&self) -> Vec<(String, AttrValue)> {
        vec![
            (ATTR_NAME.to_owned(), AttrValue::Text(self.name.clone())),
            (
                ATTR_STATUS.to_owned(),
                AttrValue::Text(self.status.to_string()),
            ),
            (
                ATTR_LAST_UPDATE_TIME.to_owned(),
                AttrValue::Time(self.last_update_time),
            ),
        ]
    }
}

impl fmt::Display for ConnectionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection[{}] status={}", self.name, self.status)
    }
}

/// Service 노드
///
/// 브로커가 제공하는 리스너를 나타냅니다.
/// (name, version, port) 복합 키로 유일성이 보장됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
    /// 서비스 이름 (예: "mosquitto")
    pub name: String,
    /// 리스너 포트
    pub port: u16,
    /// 프로토콜 (예: "mqtt")
    pub protocol: String,
    /// 브로커 버전 (예: "2.0.18")
    pub version: String,
}

impl ServiceNode {
    /// 이 노드를 지칭하는 셀렉터를 반환합니다.
    pub fn selector(&self) -> NodeSelector {
        NodeSelector::service(self.name.clone(), self.version.clone(), self.port)
    }

    /// 스토어에 기록할 속성 목록을 반환합니다.
    pub fn attributes(&self) -> Vec<(String, AttrValue)> {
        vec![
            (ATTR_NAME.to_owned(), AttrValue::Text(self.name.clone())),
            (ATTR_PORT.to_owned(), AttrValue::Int(i64::from(self.port))),
            (
                ATTR_PROTOCOL.to_owned(),
                AttrValue::Text(self.protocol.clone()),
            ),
            (
                ATTR_VERSION.to_owned(),
                AttrValue::Text(self.version.clone()),
            ),
        ]
    }
}

impl fmt::Display for ServiceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Service[{}] port={} protocol={} version={}",
            self.name, self.port, self.protocol, self.version,
        )
    }
}

/// 호스트별 활성 연결 집계 결과
///
/// 모니터 질의의 반환 행입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostActivity {
    /// 호스트 IP
    pub ip_address: IpAddr,
    /// 활성 상태인 STARTS_CONNECTION 엣지 수
    pub active_connections: u64,
}

impl fmt::Display for HostActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} active_connections={}",
            self.ip_address, self.active_connections,
        )
    }
}

/// 심각도 레벨
///
/// 보안 이벤트의 심각도를 나타냅니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 정보성 이벤트
    #[default]
    Info,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 보안 알림
///
/// 임계값 초과 탐지로 생성된 알림을 나타냅니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// 알림 ID
    pub id: String,
    /// 알림 제목
    pub title: String,
    /// 상세 설명
    pub description: String,
    /// 심각도
    pub severity: Severity,
    /// 탐지 규칙명
    pub rule_name: String,
    /// 관련 호스트 IP (있을 경우)
    pub source_ip: Option<IpAddr>,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (rule: {})",
            self.severity, self.title, self.rule_name,
        )
    }
}
