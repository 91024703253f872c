//! 分发循环：把收到的消息路由到即时命令、对话脚本或当前会话

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::commands::Command;
use crate::core::ChatId;
use crate::features::{flashcards, help, knowledge_test, reminders, schedule};
use crate::integrations::InboundMessage;
use crate::reminders::ReminderScheduler;
use crate::session::SessionRegistry;
use crate::store::BotData;

pub struct Bot {
    registry: Arc<SessionRegistry>,
    data: BotData,
    scheduler: Arc<ReminderScheduler>,
}

impl Bot {
    pub fn new(registry: Arc<SessionRegistry>, data: BotData, scheduler: Arc<ReminderScheduler>) -> Self {
        Self {
            registry,
            data,
            scheduler,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// 处理一条消息。启动了对话脚本时返回其任务句柄。
    ///
    /// 即时命令不打断当前会话；普通文本交给当前会话（没有则丢弃）。
    pub async fn handle(&self, chat_id: ChatId, text: &str) -> Option<JoinHandle<()>> {
        let Some(command) = Command::parse(text) else {
            if !self.registry.deliver(chat_id, text) {
                tracing::debug!(%chat_id, "No active dialog, message dropped");
            }
            return None;
        };
        tracing::debug!(
            %chat_id,
            command = command.name(),
            dialog = command.starts_dialog(),
            "Command received"
        );

        let sink = self.registry.sink();
        let name = command.name();
        let handle = match command {
            Command::Version => {
                sink.send(chat_id, help::version_text());
                return None;
            }
            Command::Help => {
                sink.send(chat_id, help::help_text());
                return None;
            }
            Command::ShowFlashcard(term) => {
                let text = self
                    .data
                    .flashcards
                    .read(|b| flashcards::display_flashcard(b, chat_id, term.as_deref()))
                    .await;
                sink.send(chat_id, text);
                return None;
            }
            Command::ShowReminders => {
                sink.send(chat_id, reminders::show_reminders(&self.scheduler, chat_id).await);
                return None;
            }
            Command::ShowSchedule => {
                let text = self.data.schedules.read(|t| t.render(chat_id)).await;
                sink.send(chat_id, text);
                return None;
            }
            Command::AddFlashcard => {
                let book = Arc::clone(&self.data.flashcards);
                self.registry
                    .start(chat_id, name, move |s| flashcards::add_flashcard(s, book))
            }
            Command::DeleteFlashcard => {
                let book = Arc::clone(&self.data.flashcards);
                self.registry
                    .start(chat_id, name, move |s| flashcards::delete_flashcard(s, book))
            }
            Command::EditFlashcard => {
                let book = Arc::clone(&self.data.flashcards);
                self.registry
                    .start(chat_id, name, move |s| flashcards::edit_flashcard(s, book))
            }
            Command::KnowledgeTest => {
                let book = Arc::clone(&self.data.flashcards);
                self.registry
                    .start(chat_id, name, move |s| knowledge_test::knowledge_test(s, book))
            }
            Command::AddReminder => {
                let scheduler = Arc::clone(&self.scheduler);
                self.registry
                    .start(chat_id, name, move |s| reminders::add_reminder(s, scheduler))
            }
            Command::AddClass => {
                let timetable = Arc::clone(&self.data.schedules);
                self.registry
                    .start(chat_id, name, move |s| schedule::add_class(s, timetable))
            }
            Command::EditClass => {
                let timetable = Arc::clone(&self.data.schedules);
                self.registry
                    .start(chat_id, name, move |s| schedule::edit_class(s, timetable))
            }
            Command::DeleteClass => {
                let timetable = Arc::clone(&self.data.schedules);
                self.registry
                    .start(chat_id, name, move |s| schedule::delete_class(s, timetable))
            }
            Command::DeleteSchedule => {
                let timetable = Arc::clone(&self.data.schedules);
                self.registry
                    .start(chat_id, name, move |s| schedule::delete_schedule(s, timetable))
            }
        };
        Some(handle)
    }

    /// 单一分发循环，直到入站通道关闭或收到关闭信号
    pub async fn run(&self, mut inbound: mpsc::Receiver<InboundMessage>, shutdown: CancellationToken) {
        tracing::info!("Dispatcher started");
        loop {
            let msg = tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = inbound.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            self.handle(msg.chat_id, &msg.text).await;
        }
        tracing::info!(active_dialogs = self.registry.active_count(), "Dispatcher stopped");
    }
}
