//! 输出汇（Output Sink）
//!
//! 所有出站文本进入同一个队列，由唯一的 drain 任务按入队顺序交给 [`Transport`]。
//! 发送失败只记日志，不重试。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::ChatId;
use crate::integrations::Transport;

/// 一条待发送的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: ChatId,
    pub text: String,
}

/// 出站队列的发送端；可自由克隆
#[derive(Clone, Debug)]
pub struct OutputSink {
    tx: mpsc::UnboundedSender<OutgoingMessage>,
}

impl OutputSink {
    /// 仅创建队列，由调用方自行消费（测试中直接检查出站消息）
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutgoingMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// 创建队列并启动 drain 任务；所有 OutputSink 被丢弃后，任务发完剩余消息即退出
    pub fn spawn(transport: Arc<dyn Transport>) -> (Self, JoinHandle<()>) {
        let (sink, rx) = Self::channel();
        let handle = tokio::spawn(drain(rx, transport));
        (sink, handle)
    }

    pub fn send(&self, chat_id: ChatId, text: impl Into<String>) {
        let msg = OutgoingMessage {
            chat_id,
            text: text.into(),
        };
        if self.tx.send(msg).is_err() {
            tracing::warn!(%chat_id, "Output sink closed, message dropped");
        }
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<OutgoingMessage>, transport: Arc<dyn Transport>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = transport.send(msg.chat_id, &msg.text).await {
            tracing::warn!(chat_id = %msg.chat_id, error = %e, "Failed to deliver message");
        }
    }
    tracing::debug!("Output sink drained");
}
