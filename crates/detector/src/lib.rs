#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`tail`]: 로테이션 감지 로그 테일러 (폴링 기반)
//! - [`extract`]: 라인별 다중 규칙 레코드 추출기 (IP, 포트, 타임스탬프, 연결명, 버전)
//! - [`store`]: 자연 키 기반 그래프 스토어 trait과 인메모리 구현
//! - [`ingest`]: 라인 단위 적재 루프 (한 라인 완전 처리 후 다음 라인)
//! - [`monitor`]: 활성 연결 수 임계값 모니터 (차단 + 알림)
//! - [`notify`]: 알림 싱크 trait과 구현
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 탐지기 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod config;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod monitor;
pub mod notify;
pub mod pipeline;
pub mod store;
pub mod tail;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{DetectorPipeline, DetectorPipelineBuilder};

// 설정
pub use config::{DetectorConfig, DetectorConfigBuilder};

// 에러
pub use error::{DetectorError, NotifyError};

// 테일러
pub use tail::{LogTailer, RawLine};

// 추출기
pub use extract::RecordExtractor;

// 스토어
pub use store::{ActivityFilter, GraphStore, MemoryGraphStore};

// 적재 루프
pub use ingest::IngestionLoop;

// 모니터
pub use monitor::AnomalyMonitor;

// 알림
pub use notify::{ChannelNotificationSink, NotificationSink, TracingNotificationSink};
