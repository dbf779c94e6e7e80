//! 탐지 파이프라인 -- 적재 루프와 모니터의 생명주기 관리
//!
//! [`DetectorPipeline`]은 로그 테일러, 레코드 추출기, 적재 루프,
//! 이상 징후 모니터를 하나의 [`Pipeline`]으로 묶습니다.
//!
//! # 사용 예시
//! ```ignore
//! use brokerwatch_core::pipeline::Pipeline;
//! use brokerwatch_detector::pipeline::DetectorPipelineBuilder;
//!
//! let (mut pipeline, alert_rx) = DetectorPipelineBuilder::new().build()?;
//! pipeline.start().await?;
//! // ... alert_rx에서 AlertEvent 수신 ...
//! pipeline.stop().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use brokerwatch_core::error::{BrokerwatchError, PipelineError};
use brokerwatch_core::event::AlertEvent;
use brokerwatch_core::pipeline::{HealthStatus, Pipeline};

use crate::config::DetectorConfig;
use crate::error::DetectorError;
use crate::ingest::IngestionLoop;
use crate::monitor::AnomalyMonitor;
use crate::notify::{ChannelNotificationSink, NotificationSink};
use crate::store::{GraphStore, MemoryGraphStore};

/// 파이프라인 내부 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Initialized,
    Running,
    Stopped,
}

/// 브로커 로그 탐지 파이프라인
pub struct DetectorPipeline {
    config: DetectorConfig,
    state: PipelineState,
    store: Arc<dyn GraphStore>,
    sink: Arc<dyn NotificationSink>,
    cancel: CancellationToken,
    ingest_task: Option<JoinHandle<()>>,
    monitor_task: Option<JoinHandle<()>>,
}

impl DetectorPipeline {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &'static str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 파이프라인이 사용하는 그래프 스토어를 반환합니다.
    pub fn store(&self) -> Arc<dyn GraphStore> {
        Arc::clone(&self.store)
    }
}

impl Pipeline for DetectorPipeline {
    async fn start(&mut self) -> Result<(), BrokerwatchError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        // 재시작 지원: 이전 stop()에서 취소된 토큰을 교체
        self.cancel = CancellationToken::new();

        let ingest = IngestionLoop::new(&self.config, Arc::clone(&self.store))
            .map_err(BrokerwatchError::from)?;
        self.ingest_task = Some(tokio::spawn(ingest.run()));

        if self.config.monitor_enabled {
            let monitor = AnomalyMonitor::new(
                Arc::clone(&self.store),
                Arc::clone(&self.sink),
                self.config.connection_threshold,
                Duration::from_secs(self.config.monitor_interval_secs),
                self.cancel.child_token(),
            );
            self.monitor_task = Some(tokio::spawn(monitor.run()));
        }

        self.state = PipelineState::Running;
        info!(
            log_path = %self.config.log_path,
            monitor_enabled = self.config.monitor_enabled,
            "detector pipeline started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), BrokerwatchError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        self.cancel.cancel();

        // 적재 루프는 자발적으로 종료되지 않으므로 중단시킴
        if let Some(task) = self.ingest_task.take() {
            task.abort();
        }
        // 모니터는 취소 신호를 보고 스스로 종료함
        if let Some(task) = self.monitor_task.take() {
            let _ = task.await;
        }

        self.state = PipelineState::Stopped;
        info!("detector pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
            PipelineState::Running => {
                if self
                    .ingest_task
                    .as_ref()
                    .is_none_or(tokio::task::JoinHandle::is_finished)
                {
                    return HealthStatus::Unhealthy("ingestion task exited".to_owned());
                }
                if let Some(task) = &self.monitor_task {
                    if task.is_finished() {
                        return HealthStatus::Degraded("monitor task exited".to_owned());
                    }
                }
                HealthStatus::Healthy
            }
        }
    }
}

/// 탐지 파이프라인 빌더
///
/// 스토어와 알림 싱크를 주입하지 않으면 [`MemoryGraphStore`]와
/// 새 알림 채널이 사용됩니다. 알림 싱크 우선순위:
///
/// 1. [`notification_sink`](Self::notification_sink)로 주입한 싱크
/// 2. [`alert_sender`](Self::alert_sender)로 주입한 송신단 ([`ChannelNotificationSink`])
/// 3. 둘 다 없으면 새 채널을 만들고 수신단을 함께 반환
pub struct DetectorPipelineBuilder {
    config: DetectorConfig,
    store: Option<Arc<dyn GraphStore>>,
    sink: Option<Arc<dyn NotificationSink>>,
    alert_tx: Option<mpsc::Sender<AlertEvent>>,
}

impl DetectorPipelineBuilder {
    /// 기본 설정으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::default(),
            store: None,
            sink: None,
            alert_tx: None,
        }
    }

    /// 탐지기 설정을 지정합니다.
    pub fn config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// 그래프 스토어를 주입합니다.
    pub fn store(mut self, store: Arc<dyn GraphStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 알림 싱크를 직접 주입합니다.
    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 외부 알림 채널의 송신단을 주입합니다.
    ///
    /// 지정하면 빌더는 수신단을 반환하지 않습니다 (`None`).
    pub fn alert_sender(mut self, tx: mpsc::Sender<AlertEvent>) -> Self {
        self.alert_tx = Some(tx);
        self
    }

    /// 파이프라인을 생성합니다.
    ///
    /// 알림 채널을 내부에서 만들었을 때만 수신단을 반환합니다.
    pub fn build(
        self,
    ) -> Result<(DetectorPipeline, Option<mpsc::Receiver<AlertEvent>>), DetectorError> {
        self.config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryGraphStore::new()));

        let (sink, alert_rx): (Arc<dyn NotificationSink>, Option<mpsc::Receiver<AlertEvent>>) =
            match (self.sink, self.alert_tx) {
                (Some(sink), _) => (sink, None),
                (None, Some(tx)) => (Arc::new(ChannelNotificationSink::new(tx)), None),
                (None, None) => {
                    let (tx, rx) = mpsc::channel(self.config.alert_channel_capacity);
                    (Arc::new(ChannelNotificationSink::new(tx)), Some(rx))
                }
            };

        let pipeline = DetectorPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            store,
            sink,
            cancel: CancellationToken::new(),
            ingest_task: None,
            monitor_task: None,
        };
        Ok((pipeline, alert_rx))
    }
}

impl Default for DetectorPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
