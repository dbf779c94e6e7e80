//! 로그 테일러 -- 로테이션을 감지하는 폴링 기반 파일 추적
//!
//! [`LogTailer`]는 브로커 로그 파일을 폴링하며 개행으로 끝나는 완전한
//! 라인만 반환합니다. 파일 크기가 저장된 오프셋보다 작아지면 로테이션으로
//! 판단하여 오프셋 0부터 다시 읽고, 파일이 일시적으로 없으면 에러 대신
//! 대기합니다. 스트림 종료 개념이 없어 `next_line()`은 프로세스 수명
//! 동안 계속 호출됩니다.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use brokerwatch_core::metrics::{DETECTOR_LINES_READ_TOTAL, DETECTOR_LOG_ROTATIONS_TOTAL};

use crate::error::DetectorError;

/// 한 번의 read에서 가져올 최대 바이트 수
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// 테일러가 반환하는 원시 로그 라인
///
/// `data`는 후행 개행 문자를 포함합니다. 추출기의 포트 규칙이
/// 라인 끝의 구두점/개행 쌍에 의존하기 때문입니다.
#[derive(Debug, Clone)]
pub struct RawLine {
    /// 라인 바이트 (후행 '\n' 포함)
    pub data: Bytes,
    /// 라인 끝의 파일 오프셋
    pub offset: u64,
}

impl RawLine {
    /// 라인을 UTF-8 문자열로 변환합니다 (비정상 바이트는 대체 문자).
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// 로테이션 감지 로그 테일러
///
/// 파일 핸들을 유지하지 않고 매 폴링마다 경로를 다시 열어 저장된
/// 오프셋에서 읽습니다. 로그 로테이션으로 파일이 교체되어도 다음
/// 폴링에서 새 파일을 읽게 됩니다.
pub struct LogTailer {
    /// 추적 대상 로그 파일 경로
    path: PathBuf,
    /// 폴링 간격
    poll_interval: Duration,
    /// 마지막으로 읽은 파일 오프셋
    offset: u64,
    /// 아직 개행을 만나지 못한 부분 라인 버퍼
    buffer: Vec<u8>,
}

impl LogTailer {
    /// 새 테일러를 생성합니다.
    ///
    /// 파일이 아직 존재하지 않아도 실패하지 않습니다.
    /// 첫 `next_line()` 호출부터 파일이 나타나기를 기다립니다.
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            offset: 0,
            buffer: Vec::new(),
        }
    }

    /// 다음 완전한 로그 라인을 반환합니다.
    ///
    /// 개행으로 끝나는 라인이 준비될 때까지 대기합니다.
    /// 파일 없음은 대기 조건이며, 그 외의 I/O 실패만 에러로 반환합니다.
    pub async fn next_line(&mut self) -> Result<RawLine, DetectorError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let rest = self.buffer.split_off(pos + 1);
                let line = std::mem::replace(&mut self.buffer, rest);
                counter!(DETECTOR_LINES_READ_TOTAL).increment(1);
                return Ok(RawLine {
                    data: Bytes::from(line),
                    offset: self.offset - self.buffer.len() as u64,
                });
            }

            self.fill_buffer().await?;
        }
    }

    /// 현재 파일 오프셋을 반환합니다.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 파일에서 새 바이트를 버퍼로 읽어들입니다.
    ///
    /// 읽을 데이터가 없으면 폴링 간격만큼 대기한 뒤 반환합니다.
    async fn fill_buffer(&mut self) -> Result<(), DetectorError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "log file not found, waiting");
                tokio::time::sleep(self.poll_interval).await;
                return Ok(());
            }
            Err(e) => {
                return Err(DetectorError::Tail {
                    path: self.path.display().to_string(),
                    reason: format!("stat failed: {e}"),
                });
            }
        };

        // 파일이 줄어들었으면 로테이션으로 판단: 처음부터 다시 읽고
        // 이전 파일의 부분 라인은 버립니다.
        if metadata.len() < self.offset {
            warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_size = metadata.len(),
                "log file shrank, assuming rotation"
            );
            counter!(DETECTOR_LOG_ROTATIONS_TOTAL).increment(1);
            self.offset = 0;
            self.buffer.clear();
        }

        if metadata.len() == self.offset {
            tokio::time::sleep(self.poll_interval).await;
            return Ok(());
        }

        let mut file = File::open(&self.path)
            .await
            .map_err(|e| DetectorError::Tail {
                path: self.path.display().to_string(),
                reason: format!("open failed: {e}"),
            })?;
        file.seek(SeekFrom::Start(self.offset))
            .await
            .map_err(|e| DetectorError::Tail {
                path: self.path.display().to_string(),
                reason: format!("seek to {} failed: {e}", self.offset),
            })?;

        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let n = file
            .read(&mut chunk)
            .await
            .map_err(|e| DetectorError::Tail {
                path: self.path.display().to_string(),
                reason: format!("read failed: {e}"),
            })?;

        if n == 0 {
            tokio::time::sleep(self.poll_interval).await;
            return Ok(());
        }

        self.buffer.extend_from_slice(&chunk[..n]);
        self.offset += n as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn short_interval() -> Duration {
        Duration::from_millis(10)
    }

    #[tokio::test]
    async fn reads_complete_line_with_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1700000000: New connection from 10.0.0.1 on port 1883.").unwrap();
        file.flush().unwrap();

        let mut tailer = LogTailer::new(file.path(), short_interval());
        let line = tailer.next_line().await.unwrap();
        assert!(line.data.ends_with(b".\n"));
        assert!(line.as_text().contains("10.0.0.1"));
    }

    #[tokio::test]
    async fn waits_for_newline_before_emitting() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "partial line without newline").unwrap();
        file.flush().unwrap();

        let mut tailer = LogTailer::new(file.path(), short_interval());
        let result =
            tokio::time::timeout(Duration::from_millis(100), tailer.next_line()).await;
        // 개행이 없으므로 라인이 나오면 안 됨
        assert!(result.is_err());

        writeln!(file).unwrap();
        file.flush().unwrap();
        let line = tailer.next_line().await.unwrap();
        assert_eq!(&line.data[..], b"partial line without newline\n");
    }

    #[tokio::test]
    async fn reads_multiple_lines_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first").unwrap();
        writeln!(file, "second").unwrap();
        file.flush().unwrap();

        let mut tailer = LogTailer::new(file.path(), short_interval());
        assert_eq!(&tailer.next_line().await.unwrap().data[..], b"first\n");
        assert_eq!(&tailer.next_line().await.unwrap().data[..], b"second\n");
    }

    #[tokio::test]
    async fn missing_file_is_a_wait_condition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mosquitto.log");

        let mut tailer = LogTailer::new(&path, short_interval());
        let pending =
            tokio::time::timeout(Duration::from_millis(50), tailer.next_line()).await;
        assert!(pending.is_err()); // 파일이 없으면 대기

        std::fs::write(&path, "appeared\n").unwrap();
        let line = tailer.next_line().await.unwrap();
        assert_eq!(&line.data[..], b"appeared\n");
    }

    #[tokio::test]
    async fn shrunken_file_restarts_from_beginning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mosquitto.log");
        std::fs::write(&path, "old line one\nold line two\n").unwrap();

        let mut tailer = LogTailer::new(&path, short_interval());
        assert_eq!(&tailer.next_line().await.unwrap().data[..], b"old line one\n");
        assert_eq!(&tailer.next_line().await.unwrap().data[..], b"old line two\n");

        // 로테이션: 더 짧은 새 파일로 교체
        std::fs::write(&path, "fresh\n").unwrap();
        let line = tailer.next_line().await.unwrap();
        assert_eq!(&line.data[..], b"fresh\n");
    }

    #[tokio::test]
    async fn rotation_discards_partial_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mosquitto.log");
        std::fs::write(&path, "complete\nincomplete tail without newline").unwrap();

        let mut tailer = LogTailer::new(&path, short_interval());
        assert_eq!(&tailer.next_line().await.unwrap().data[..], b"complete\n");

        // 부분 라인이 버퍼에 남은 상태로 로테이션 발생
        std::fs::write(&path, "new\n").unwrap();
        let line = tailer.next_line().await.unwrap();
        assert_eq!(&line.data[..], b"new\n");
    }

    #[tokio::test]
    async fn appended_data_resumes_at_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mosquitto.log");
        std::fs::write(&path, "one\n").unwrap();

        let mut tailer = LogTailer::new(&path, short_interval());
        assert_eq!(&tailer.next_line().await.unwrap().data[..], b"one\n");
        let offset_after_first = tailer.offset();

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        writeln!(file, "two").unwrap();

        let line = tailer.next_line().await.unwrap();
        assert_eq!(&line.data[..], b"two\n");
        assert!(tailer.offset() > offset_after_first);
    }
}
