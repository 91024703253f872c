//! 持久化：三份按 ChatId 组织的 JSON 文档（闪卡、提醒、课程表）
//!
//! - **backend**: 文档读写接口（文件系统 / 内存）
//! - **document**: 内存文档与单写者任务

mod backend;
mod document;

use std::sync::Arc;

use tokio::task::JoinHandle;

pub use backend::{DocumentBackend, FsBackend, MemoryBackend, EMPTY_DOCUMENT};
pub use document::{Document, DocumentWriter};

use crate::core::BotError;
use crate::features::flashcards::FlashcardBook;
use crate::features::schedule::Timetable;
use crate::reminders::ReminderBook;

pub const FLASHCARDS_DOCUMENT: &str = "flashcards.json";
pub const REMINDERS_DOCUMENT: &str = "reminders.json";
pub const SCHEDULES_DOCUMENT: &str = "schedules.json";

/// 启动时加载的全部文档，共享同一个写者任务
#[derive(Clone)]
pub struct BotData {
    pub flashcards: Arc<Document<FlashcardBook>>,
    pub reminders: Arc<Document<ReminderBook>>,
    pub schedules: Arc<Document<Timetable>>,
}

impl BotData {
    /// 加载三份文档并启动写者任务
    pub async fn load(backend: Arc<dyn DocumentBackend>) -> Result<(Self, JoinHandle<()>), BotError> {
        let (writer, handle) = DocumentWriter::spawn(Arc::clone(&backend));
        let data = Self {
            flashcards: Arc::new(
                Document::load(FLASHCARDS_DOCUMENT, backend.as_ref(), writer.clone()).await?,
            ),
            reminders: Arc::new(
                Document::load(REMINDERS_DOCUMENT, backend.as_ref(), writer.clone()).await?,
            ),
            schedules: Arc::new(Document::load(SCHEDULES_DOCUMENT, backend.as_ref(), writer).await?),
        };
        Ok((data, handle))
    }
}
