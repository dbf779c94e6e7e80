//! 레코드 추출기 -- 로그 라인에서 그래프 필드를 누적 추출
//!
//! 한 라인에 다섯 개의 독립 규칙(IP, 포트, 타임스탬프, 연결명, 버전)을
//! 모두 적용하고, 결과를 세 개의 누적 필드 집합(Host / Connection /
//! Service)에 병합합니다. 브로커 로그는 한 엔티티의 정보를 여러 라인에
//! 걸쳐 흘리므로 필드 집합은 라인 경계를 넘어 유지됩니다.
//!
//! 규칙이 0개 매칭이면 비이벤트(trace), 2개 이상 매칭이면 모호성(warn)
//! 으로 처리하며 어느 쪽도 필드를 설정하지 않습니다. 모호한 결과로
//! 값을 임의 선택하는 일은 없습니다.

use std::net::IpAddr;

use chrono::{DateTime, TimeZone, Utc};
use metrics::counter;
use regex::Regex;
use tracing::{trace, warn};

use brokerwatch_core::metrics::{
    DETECTOR_EXTRACTION_AMBIGUITIES_TOTAL, DETECTOR_EXTRACTION_MISSES_TOTAL, LABEL_RULE,
};
use brokerwatch_core::types::{ConnectionNode, ConnectionStatus, HostNode, ServiceNode};

use crate::error::DetectorError;

/// Host 필드 집합
#[derive(Debug, Clone, Default)]
struct HostFields {
    ip_address: Option<IpAddr>,
    creation_time: Option<DateTime<Utc>>,
}

/// Connection 필드 집합
///
/// 초기 상태는 inactive입니다. 라인 처리 후의 재시드만 active로
/// 설정됩니다 ([`RecordExtractor::reset_connection`]).
#[derive(Debug, Clone, Default)]
struct ConnectionFields {
    name: Option<String>,
    status: ConnectionStatus,
    last_update_time: Option<DateTime<Utc>>,
}

/// Service 필드 집합
#[derive(Debug, Clone, Default)]
struct ServiceFields {
    port: Option<u16>,
    version: Option<String>,
}

/// 상태 유지 레코드 추출기
///
/// Service의 이름과 프로토콜은 브로커 로그에 나타나지 않으므로
/// 설정에서 시드됩니다.
pub struct RecordExtractor {
    ip_re: Regex,
    port_re: Regex,
    name_re: Regex,
    version_re: Regex,
    service_name: String,
    service_protocol: String,
    host: HostFields,
    connection: ConnectionFields,
    service: ServiceFields,
}

impl RecordExtractor {
    /// 새 추출기를 생성합니다.
    pub fn new(
        service_name: impl Into<String>,
        service_protocol: impl Into<String>,
    ) -> Result<Self, DetectorError> {
        Ok(Self {
            ip_re: Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b")?,
            port_re: Regex::new(r"(\d{1,5})$")?,
            name_re: Regex::new(r"\b\w+[-_][^\s()]+")?,
            version_re: Regex::new(r"\bversion\s+(\d+\.\d+\.\d+)")?,
            service_name: service_name.into(),
            service_protocol: service_protocol.into(),
            host: HostFields::default(),
            connection: ConnectionFields::default(),
            service: ServiceFields::default(),
        })
    }

    /// 다섯 개의 추출 규칙을 모두 적용하고 필드 집합을 갱신합니다.
    ///
    /// `line`은 테일러가 반환한 그대로, 후행 개행을 포함해야 합니다.
    pub fn apply(&mut self, line: &str) {
        self.apply_ip_rule(line);
        self.apply_port_rule(line);
        self.apply_timestamp_rule(line);
        self.apply_name_rule(line);
        self.apply_version_rule(line);
    }

    /// 규칙 1: 점으로 구분된 IPv4 주소
    ///
    /// 옥텟 범위 초과(예: 300.1.2.3)는 파싱 단계에서 걸러져 미매칭으로
    /// 처리됩니다.
    fn apply_ip_rule(&mut self, line: &str) {
        let Some(text) = single_match(&self.ip_re, line, "ip") else {
            return;
        };
        match text.parse::<IpAddr>() {
            Ok(ip) => self.host.ip_address = Some(ip),
            Err(_) => {
                counter!(DETECTOR_EXTRACTION_MISSES_TOTAL, LABEL_RULE => "ip").increment(1);
                trace!(candidate = text, "ip-like token failed to parse, skipping");
            }
        }
    }

    /// 규칙 2: 라인 말미의 리스너 포트
    ///
    /// 라인의 마지막 두 문자(구두점/개행 쌍)를 제거한 뒤 끝에 남은
    /// 정수를 포트로 해석합니다. u16 범위를 벗어나면 미매칭입니다.
    fn apply_port_rule(&mut self, line: &str) {
        let stripped = strip_final_two_chars(line);
        let Some(caps) = self.port_re.captures(stripped) else {
            counter!(DETECTOR_EXTRACTION_MISSES_TOTAL, LABEL_RULE => "port").increment(1);
            trace!("no trailing port number");
            return;
        };
        match caps[1].parse::<u16>() {
            Ok(port) => self.service.port = Some(port),
            Err(_) => {
                counter!(DETECTOR_EXTRACTION_MISSES_TOTAL, LABEL_RULE => "port").increment(1);
                trace!(candidate = &caps[1], "trailing number out of port range");
            }
        }
    }

    /// 규칙 3: 라인 선두의 Unix epoch 타임스탬프
    ///
    /// 첫 `:` 앞의 토큰을 epoch 초로 해석하여 Host 생성 시각과
    /// Connection 갱신 시각 양쪽에 기록합니다.
    fn apply_timestamp_rule(&mut self, line: &str) {
        let token = line.split(':').next().unwrap_or("");
        let parsed = token
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        match parsed {
            Some(time) => {
                self.host.creation_time = Some(time);
                self.connection.last_update_time = Some(time);
            }
            None => {
                counter!(DETECTOR_EXTRACTION_MISSES_TOTAL, LABEL_RULE => "timestamp").increment(1);
                trace!(token, "line has no epoch timestamp prefix");
            }
        }
    }

    /// 규칙 4: 연결(클라이언트) 이름
    ///
    /// 하이픈 또는 언더스코어를 포함하는 토큰을 연결 이름으로 해석합니다.
    fn apply_name_rule(&mut self, line: &str) {
        if let Some(name) = single_match(&self.name_re, line, "name") {
            self.connection.name = Some(name.to_owned());
        }
    }

    /// 규칙 5: `version` 토큰 뒤의 삼중 버전 번호
    fn apply_version_rule(&mut self, line: &str) {
        let mut captures = self.version_re.captures_iter(line);
        let first = captures.next();
        let extra = captures.count();
        match (first, extra) {
            (Some(caps), 0) => self.service.version = Some(caps[1].to_owned()),
            (Some(_), n) => {
                counter!(DETECTOR_EXTRACTION_AMBIGUITIES_TOTAL, LABEL_RULE => "version")
                    .increment(1);
                warn!(matches = n + 1, "multiple version tokens, leaving field unset");
            }
            (None, _) => {
                counter!(DETECTOR_EXTRACTION_MISSES_TOTAL, LABEL_RULE => "version").increment(1);
                trace!("no version token");
            }
        }
    }

    /// Host 필드 집합이 완전하면 노드를 반환합니다 (ip + creation_time).
    pub fn host_node(&self) -> Option<HostNode> {
        Some(HostNode::observed(
            self.host.ip_address?,
            self.host.creation_time?,
        ))
    }

    /// Connection 필드 집합이 완전하면 노드를 반환합니다 (name + last_update_time).
    pub fn connection_node(&self) -> Option<ConnectionNode> {
        Some(ConnectionNode {
            name: self.connection.name.clone()?,
            status: self.connection.status,
            last_update_time: self.connection.last_update_time?,
        })
    }

    /// Service 필드 집합이 완전하면 노드를 반환합니다 (port + version).
    ///
    /// 이름과 프로토콜은 설정에서 시드된 값을 사용합니다.
    pub fn service_node(&self) -> Option<ServiceNode> {
        Some(ServiceNode {
            name: self.service_name.clone(),
            port: self.service.port?,
            protocol: self.service_protocol.clone(),
            version: self.service.version.clone()?,
        })
    }

    /// 현재까지 알려진 호스트 IP를 반환합니다.
    pub fn host_ip(&self) -> Option<IpAddr> {
        self.host.ip_address
    }

    /// 현재까지 알려진 연결 이름을 반환합니다.
    pub fn connection_name(&self) -> Option<&str> {
        self.connection.name.as_deref()
    }

    /// 현재까지 알려진 연결 갱신 시각을 반환합니다.
    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.connection.last_update_time
    }

    /// Connection 필드 집합을 초기화하고 상태를 active로 시드합니다.
    pub fn reset_connection(&mut self) {
        self.connection = ConnectionFields {
            status: ConnectionStatus::Active,
            ..ConnectionFields::default()
        };
    }

    /// 라인 처리 후의 필드 초기화를 수행합니다.
    ///
    /// Host 집합은 세션 연속성을 위해 `ip_address`만 유지하고 비우며,
    /// Connection 집합은 전부 비우고 상태를 active로 다시 시드합니다.
    /// Service 집합은 덮어써질 때까지 유지됩니다.
    pub fn reset_transient(&mut self) {
        self.host.creation_time = None;
        self.reset_connection();
    }
}

/// 라인의 마지막 두 문자를 제거합니다 (문자 경계 안전).
fn strip_final_two_chars(line: &str) -> &str {
    let mut indices = line.char_indices().rev();
    match (indices.next(), indices.next()) {
        (Some(_), Some((i, _))) => &line[..i],
        _ => "",
    }
}

/// find_iter 기반 단일 매칭 정책: 0개는 미매칭, 2개 이상은 모호성.
fn single_match<'t>(re: &Regex, line: &'t str, rule: &'static str) -> Option<&'t str> {
    let mut it = re.find_iter(line);
    let first = it.next();
    let extra = it.count();
    match (first, extra) {
        (Some(m), 0) => Some(m.as_str()),
        (Some(_), n) => {
            counter!(DETECTOR_EXTRACTION_AMBIGUITIES_TOTAL, LABEL_RULE => rule).increment(1);
            warn!(rule, matches = n + 1, "multiple matches, leaving field unset");
            None
        }
        (None, _) => {
            counter!(DETECTOR_EXTRACTION_MISSES_TOTAL, LABEL_RULE => rule).increment(1);
            trace!(rule, "no match");
            None
        }
    }
}
