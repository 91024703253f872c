//! 提醒调度器
//!
//! 每条提醒对应一个 tokio 任务：等待到 `fire_at - 预通知提前量` 发出预通知，
//! 再等待到 `fire_at - 最终提前量` 发出最终通知，然后从文档中删除该提醒。
//! 所有等待只由 `fire_at` 与当前时间推导，启动时可完全从持久化状态重建。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::clock::Clock;
use super::model::{Reminder, ReminderBook, ReminderStage};
use crate::config::RemindersSection;
use crate::core::{BotError, ChatId};
use crate::outbox::OutputSink;
use crate::store::Document;

/// 提前量配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub pre_notice_lead: chrono::Duration,
    pub final_notice_lead: chrono::Duration,
    /// 新提醒（以及启动时保留的提醒）至少要在此时长之后
    pub min_lead: chrono::Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self::from(&RemindersSection::default())
    }
}

impl From<&RemindersSection> for ReminderPolicy {
    fn from(cfg: &RemindersSection) -> Self {
        Self {
            pre_notice_lead: chrono::Duration::hours(cfg.pre_notice_lead_hours),
            final_notice_lead: chrono::Duration::hours(cfg.final_notice_lead_hours),
            min_lead: chrono::Duration::hours(cfg.min_lead_hours),
        }
    }
}

pub struct ReminderScheduler {
    book: Arc<Document<ReminderBook>>,
    sink: OutputSink,
    clock: Arc<dyn Clock>,
    policy: ReminderPolicy,
    shutdown: CancellationToken,
}

impl ReminderScheduler {
    pub fn new(
        book: Arc<Document<ReminderBook>>,
        sink: OutputSink,
        clock: Arc<dyn Clock>,
        policy: ReminderPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            book,
            sink,
            clock,
            policy,
            shutdown,
        }
    }

    pub fn book(&self) -> &Arc<Document<ReminderBook>> {
        &self.book
    }

    /// 允许的最早 fire_at
    pub fn earliest_allowed(&self) -> DateTime<Utc> {
        self.clock.now() + self.policy.min_lead
    }

    /// 启动时调用一次：静默丢弃已过期（或两小时内到期）的提醒，其余全部排程。
    /// 返回排程数量；写入失败不影响排程。
    pub async fn set_all(self: &Arc<Self>) -> usize {
        let floor = self.earliest_allowed();
        match self.book.mutate(|b| Ok(b.discard_before(floor))).await {
            Ok(discarded) if discarded > 0 => {
                tracing::info!(discarded, "Stale reminders discarded")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Could not persist pruned reminders"),
        }

        let live = self.book.read(ReminderBook::entries).await;
        let count = live.len();
        for (chat_id, reminder) in live {
            self.spawn(chat_id, reminder);
        }
        tracing::info!(count, "Reminders scheduled");
        count
    }

    /// 新增一条提醒并立即排程。
    ///
    /// 早于 `now + min_lead` 时返回 [`BotError::PastDate`]；写入失败时提醒仍已排程，
    /// 返回 [`BotError::Persistence`]。
    pub async fn add_one(
        self: &Arc<Self>,
        chat_id: ChatId,
        fire_at: DateTime<Utc>,
        title: impl Into<String>,
    ) -> Result<Reminder, BotError> {
        if fire_at < self.earliest_allowed() {
            return Err(BotError::PastDate);
        }

        let reminder = Reminder::new(fire_at, title);
        let saved = self
            .book
            .mutate(|b| {
                b.push(chat_id, reminder.clone());
                Ok(())
            })
            .await;
        self.spawn(chat_id, reminder.clone());
        tracing::info!(%chat_id, reminder = %reminder.id, fire_at = %reminder.fire_at, "Reminder added");

        saved.map(|()| reminder)
    }

    fn spawn(self: &Arc<Self>, chat_id: ChatId, reminder: Reminder) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run(chat_id, reminder).await })
    }

    async fn run(&self, chat_id: ChatId, reminder: Reminder) {
        if reminder.stage == ReminderStage::Pending {
            if !self.wait_until(reminder.fire_at - self.policy.pre_notice_lead).await {
                return;
            }
            self.sink.send(chat_id, reminder.notice());
            tracing::info!(%chat_id, reminder = %reminder.id, "Pre-notice sent");

            let saved = self
                .book
                .mutate(|b| Ok(b.set_stage(chat_id, reminder.id, ReminderStage::PreNoticeSent)))
                .await;
            if let Err(e) = saved {
                tracing::warn!(%chat_id, reminder = %reminder.id, error = %e, "Could not persist reminder stage");
            }
        }

        if !self.wait_until(reminder.fire_at - self.policy.final_notice_lead).await {
            return;
        }
        self.sink.send(chat_id, reminder.notice());

        match self.book.mutate(|b| Ok(b.remove(chat_id, reminder.id))).await {
            Ok(_) => tracing::info!(%chat_id, reminder = %reminder.id, "Reminder retired"),
            Err(e) => {
                tracing::warn!(%chat_id, reminder = %reminder.id, error = %e, "Reminder retired in memory only")
            }
        }
    }

    /// 等到 `at`（已过去则立即返回）；关闭时返回 false
    async fn wait_until(&self, at: DateTime<Utc>) -> bool {
        let delay = (at - self.clock.now()).to_std().unwrap_or_default();
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
