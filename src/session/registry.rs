//! 会话注册表
//!
//! 每个 chat 至多一个活跃会话。表只通过 `start` / `deliver` / `end` 三个入口修改，
//! 均在同一把锁内完成且不跨 await。抢占时先取消旧会话的 token 并移除其发送端，
//! 再装入新会话，因此旧脚本不可能收到发给新脚本的回答。

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::dialog::DialogSession;
use crate::core::{BotError, ChatId};
use crate::outbox::OutputSink;

/// 会话 ID（进程内单调递增）
pub type SessionId = u64;

/// 表中的一个槽位：输入通道的发送端 + 取消令牌
struct Slot {
    id: SessionId,
    tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

/// 会话注册表
pub struct SessionRegistry {
    slots: Mutex<HashMap<ChatId, Slot>>,
    next_id: AtomicU64,
    sink: OutputSink,
    answer_timeout: Duration,
    max_attempts: usize,
    /// 会话令牌的父令牌；取消后所有会话一并结束
    shutdown: CancellationToken,
}

impl SessionRegistry {
    pub fn new(sink: OutputSink, answer_timeout: Duration, max_attempts: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            sink,
            answer_timeout,
            max_attempts: max_attempts.max(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// 让所有会话随进程关闭令牌一起取消
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// 打开新会话；若该 chat 已有会话则先将其终止
    pub fn open(self: &Arc<Self>, chat_id: ChatId) -> DialogSession {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = self.shutdown.child_token();

        {
            let mut slots = self.lock();
            if let Some(old) = slots.remove(&chat_id) {
                old.cancel.cancel();
                tracing::info!(%chat_id, old = old.id, new = id, "Session pre-empted");
            }
            slots.insert(
                chat_id,
                Slot {
                    id,
                    tx,
                    cancel: cancel.clone(),
                },
            );
        }

        tracing::debug!(%chat_id, session = id, "Session opened");
        DialogSession::new(
            chat_id,
            id,
            rx,
            cancel,
            self.sink.clone(),
            self.answer_timeout,
            self.max_attempts,
            Arc::clone(self),
        )
    }

    /// 打开会话并在独立任务中运行脚本。
    ///
    /// 脚本结束（任何路径）时 DialogSession 被丢弃，槽位随之释放；
    /// 错误对应的用户提示在这里统一发出。
    pub fn start<F, Fut>(self: &Arc<Self>, chat_id: ChatId, name: &'static str, script: F) -> JoinHandle<()>
    where
        F: FnOnce(DialogSession) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BotError>> + Send + 'static,
    {
        let session = self.open(chat_id);
        let id = session.id();
        let sink = self.sink.clone();

        tokio::spawn(async move {
            match script(session).await {
                Ok(()) => tracing::info!(%chat_id, session = id, script = name, "Dialog finished"),
                Err(e) => {
                    match &e {
                        BotError::Persistence(_) => {
                            tracing::warn!(%chat_id, session = id, script = name, error = %e, "Dialog ended with persistence error")
                        }
                        _ => tracing::info!(%chat_id, session = id, script = name, error = %e, "Dialog ended unsuccessfully"),
                    }
                    if let Some(text) = e.user_message() {
                        sink.send(chat_id, text);
                    }
                }
            }
        })
    }

    /// 把文本交给当前会话；没有会话时丢弃并返回 false
    pub fn deliver(&self, chat_id: ChatId, text: impl Into<String>) -> bool {
        let slots = self.lock();
        match slots.get(&chat_id) {
            Some(slot) => slot.tx.send(text.into()).is_ok(),
            None => {
                tracing::debug!(%chat_id, "No active session, message dropped");
                false
            }
        }
    }

    /// 释放槽位；只有仍属于 `id` 的槽位才会被移除（已被抢占的旧会话不会移除继任者）
    pub fn end(&self, chat_id: ChatId, id: SessionId) -> bool {
        let mut slots = self.lock();
        match slots.get(&chat_id) {
            Some(slot) if slot.id == id => {
                if let Some(slot) = slots.remove(&chat_id) {
                    slot.cancel.cancel();
                }
                tracing::debug!(%chat_id, session = id, "Session ended");
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self, chat_id: ChatId) -> bool {
        self.lock().contains_key(&chat_id)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChatId, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}
