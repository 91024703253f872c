//! 外部集成：聊天传输层
//!
//! 核心只依赖 [`Transport`]（发送文本）与 [`InboundMessage`]（收到的文本）；
//! Telegram 长轮询是目前唯一的实现。

pub mod telegram;

use async_trait::async_trait;

use crate::core::ChatId;

/// 发送端：把一条文本发给某个 chat
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, chat_id: ChatId, text: &str) -> anyhow::Result<()>;
}

/// 传输层收到的一条文本消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub text: String,
}

impl InboundMessage {
    pub fn new(chat_id: impl Into<ChatId>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
        }
    }
}
