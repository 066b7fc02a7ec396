// 알림 전송 모듈
// 포맷된 텍스트를 무음 여부와 함께 전달합니다.

pub mod log_sink;
pub mod telegram;

use crate::error::SinkError;
use async_trait::async_trait;

pub use log_sink::LogSink;
pub use telegram::TelegramSink;

/// 알림 전송 채널
///
/// 텍스트에는 `<b>`, `<i>` 태그만 사용할 수 있습니다.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// 메시지 전송
    ///
    /// # Arguments
    /// * `text` - 보낼 메시지
    /// * `silent` - true면 알림음 없이 전송
    async fn send(&self, text: &str, silent: bool) -> Result<(), SinkError>;
}
