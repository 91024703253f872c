//! 提醒脚本：新增提醒、列出提醒

use std::sync::Arc;

use super::finish;
use crate::core::{BotError, ChatId};
use crate::reminders::{parse_date, render_reminders, ReminderScheduler};
use crate::session::DialogSession;

/// `/dodajprzypomnienie`
pub async fn add_reminder(mut session: DialogSession, scheduler: Arc<ReminderScheduler>) -> Result<(), BotError> {
    let fire_at = session
        .ask_parsed("Podaj datę w formacie DD-MM-RR HH:MM", parse_date)
        .await?;
    if fire_at < scheduler.earliest_allowed() {
        return Err(BotError::PastDate);
    }

    let title = session.ask("Podaj tytuł przypomnienia").await?.trim().to_string();
    let saved = scheduler
        .add_one(session.chat_id(), fire_at, title)
        .await
        .map(|_| ());
    finish(&session, saved, "Dodano przypomnienie")
}

/// `/pokazprzypomnienia`
pub async fn show_reminders(scheduler: &ReminderScheduler, chat_id: ChatId) -> String {
    scheduler
        .book()
        .read(|book| render_reminders(book, chat_id))
        .await
}
