use super::AlertSink;
use crate::error::SinkError;
use async_trait::async_trait;
use log::info;

/// 메시지를 로그로만 남기는 채널
///
/// 텔레그램 설정이 없을 때 사용합니다.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, text: &str, silent: bool) -> Result<(), SinkError> {
        let mode = if silent { "무음" } else { "알림" };
        info!("[{}] {}", mode, text);
        Ok(())
    }
}
