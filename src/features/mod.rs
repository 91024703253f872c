//! 功能脚本：闪卡、知识测验、提醒、课程表、帮助
//!
//! 每个多步脚本都是 `async fn(DialogSession, ...) -> Result<(), BotError>`，
//! 由 [`SessionRegistry::start`](crate::session::SessionRegistry::start) 在独立任务中运行。

pub mod flashcards;
pub mod help;
pub mod knowledge_test;
pub mod reminders;
pub mod schedule;

use crate::core::{BotError, PERSISTENCE_WARNING};
use crate::session::DialogSession;

/// 持久化之后的收尾：写入失败只发软警告（内存修改已保留），随后照常确认
pub(crate) fn finish(session: &DialogSession, saved: Result<(), BotError>, done: &str) -> Result<(), BotError> {
    match saved {
        Ok(()) => {}
        Err(BotError::Persistence(e)) => {
            tracing::warn!(chat_id = %session.chat_id(), error = %e, "Change kept in memory only");
            session.say(PERSISTENCE_WARNING);
        }
        Err(e) => return Err(e),
    }
    session.say(done);
    Ok(())
}
