//! Telegram Bot API 集成
//!
//! 通过 getUpdates 长轮询接收文本消息，转交分发循环；通过 sendMessage 发送回复。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{InboundMessage, Transport};
use crate::core::ChatId;

/// Telegram 单条消息上限 4096 字符，留出余量
const MAX_MESSAGE_CHARS: usize = 4000;

/// 轮询出错后的退避时间
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// getUpdates / sendMessage 的通用响应包
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Telegram 客户端
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str, poll_timeout_secs: u64) -> anyhow::Result<Self> {
        // HTTP 超时必须长于长轮询本身
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 15))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
            poll_timeout_secs,
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> anyhow::Result<T>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.base_url, method);
        let resp: ApiResponse<T> = self.http.post(&url).json(body).send().await?.json().await?;
        if !resp.ok {
            anyhow::bail!(
                "Telegram API error in {}: {}",
                method,
                resp.description.unwrap_or_default()
            );
        }
        resp.result
            .ok_or_else(|| anyhow::anyhow!("Telegram API returned no result for {}", method))
    }

    /// 拉取一批更新
    pub async fn get_updates(&self, offset: i64) -> anyhow::Result<Vec<Update>> {
        let req = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: vec!["message"],
        };
        self.call("getUpdates", &req).await
    }

    /// 长轮询循环：把文本消息按到达顺序送入 `inbound`，直到关闭或分发端退出
    pub async fn run_poller(
        &self,
        inbound: mpsc::Sender<InboundMessage>,
        shutdown: CancellationToken,
    ) {
        let mut offset = 0;
        tracing::info!("Telegram long polling started");

        loop {
            let updates = tokio::select! {
                _ = shutdown.cancelled() => break,
                r = self.get_updates(offset) => r,
            };

            match updates {
                Ok(updates) => {
                    let (messages, next) = extract_messages(updates, offset);
                    offset = next;
                    for msg in messages {
                        if inbound.send(msg).await.is_err() {
                            tracing::info!("Dispatcher gone, stopping poller");
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed, retrying");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        tracing::info!("Telegram long polling stopped");
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send(&self, chat_id: ChatId, text: &str) -> anyhow::Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let req = SendMessageRequest {
                chat_id: chat_id.0,
                text: &chunk,
            };
            let _: serde_json::Value = self.call("sendMessage", &req).await?;
        }
        Ok(())
    }
}

/// 取出文本消息，并计算下一次 getUpdates 的 offset（最大 update_id + 1）
pub fn extract_messages(updates: Vec<Update>, offset: i64) -> (Vec<InboundMessage>, i64) {
    let mut next = offset;
    let mut messages = Vec::new();
    for update in updates {
        next = next.max(update.update_id + 1);
        let Some(message) = update.message else { continue };
        let Some(text) = message.text else { continue };
        messages.push(InboundMessage::new(message.chat.id, text));
    }
    (messages, next)
}

/// 按字符（而非字节）切分过长文本
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }
    text.chars()
        .collect::<Vec<_>>()
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}
