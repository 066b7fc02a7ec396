use super::AlertSink;
use crate::error::SinkError;
use async_trait::async_trait;
use log::{debug, warn};

/// 허용하는 HTML 태그
const ALLOWED_TAGS: [&str; 4] = ["<b>", "</b>", "<i>", "</i>"];

/// 텔레그램 봇 API 전송 채널
pub struct TelegramSink {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(bot_token: &str, chat_id: &str) -> Self {
        TelegramSink {
            http: reqwest::Client::new(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    async fn send_message(
        &self,
        text: &str,
        silent: bool,
        parse_mode: Option<&str>,
    ) -> Result<(), SinkError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let silent = if silent { "true" } else { "false" };

        let mut params = vec![
            ("chat_id", self.chat_id.as_str()),
            ("text", text),
            ("disable_notification", silent),
            ("disable_web_page_preview", "true"),
        ];
        if let Some(mode) = parse_mode {
            params.push(("parse_mode", mode));
        }

        let response = self.http.post(&url).form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// HTML 특수문자를 이스케이프한 뒤 허용 태그만 되살림
pub fn escape_html(text: &str) -> String {
    let mut escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    for tag in ALLOWED_TAGS {
        let encoded = tag.replace('<', "&lt;").replace('>', "&gt;");
        escaped = escaped.replace(&encoded, tag);
    }
    escaped
}

/// 허용 태그를 제거한 일반 텍스트
pub fn strip_tags(text: &str) -> String {
    ALLOWED_TAGS
        .iter()
        .fold(text.to_string(), |acc, tag| acc.replace(tag, ""))
}

#[async_trait]
impl AlertSink for TelegramSink {
    /// HTML로 전송하고, 실패하면 태그를 뺀 일반 텍스트로 한 번 더 시도합니다.
    async fn send(&self, text: &str, silent: bool) -> Result<(), SinkError> {
        match self.send_message(&escape_html(text), silent, Some("HTML")).await {
            Ok(()) => {
                debug!("텔레그램 메시지 전송 완료 (무음: {})", silent);
                Ok(())
            }
            Err(e) => {
                warn!("HTML 메시지 전송 실패, 일반 텍스트로 재시도: {}", e);
                self.send_message(&strip_tags(text), silent, None).await
            }
        }
    }
}
