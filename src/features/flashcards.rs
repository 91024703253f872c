//! 闪卡：(chat, 主题, 术语) → 定义
//!
//! 主题与术语录入时统一小写，查找因此不区分大小写。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::finish;
use crate::core::{BotError, ChatId};
use crate::session::DialogSession;
use crate::store::Document;

pub const FLASHCARD_EXISTS: &str = "Fiszka juz istnieje, edytuj za pomoca /edytujfiszke";
pub const FLASHCARD_MISSING: &str = "Fiszka nie istnieje";
pub const TERM_NOT_FOUND: &str = "Nie znaleziono pojecia";
pub const TERM_HINT: &str = "Podaj pojecie po spacji";

/// 术语 → 定义
pub type Deck = BTreeMap<String, String>;

/// 全部闪卡文档：chat → 主题 → 术语 → 定义
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlashcardBook(BTreeMap<ChatId, BTreeMap<String, Deck>>);

/// 去掉首尾空白并转小写
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

impl FlashcardBook {
    pub fn contains(&self, chat_id: ChatId, topic: &str, term: &str) -> bool {
        self.deck(chat_id, topic)
            .is_some_and(|deck| deck.contains_key(term))
    }

    pub fn deck(&self, chat_id: ChatId, topic: &str) -> Option<&Deck> {
        self.0.get(&chat_id).and_then(|topics| topics.get(topic))
    }

    /// 新增；(主题, 术语) 已存在时返回校验错误且不改动原定义
    pub fn add(&mut self, chat_id: ChatId, topic: &str, term: &str, definition: &str) -> Result<(), BotError> {
        if topic.is_empty() || term.is_empty() {
            return Err(BotError::validation("Temat i pojecie nie moga byc puste"));
        }
        if self.contains(chat_id, topic, term) {
            return Err(BotError::validation(FLASHCARD_EXISTS));
        }
        self.0
            .entry(chat_id)
            .or_default()
            .entry(topic.to_string())
            .or_default()
            .insert(term.to_string(), definition.to_string());
        Ok(())
    }

    pub fn edit(&mut self, chat_id: ChatId, topic: &str, term: &str, definition: &str) -> Result<(), BotError> {
        match self
            .0
            .get_mut(&chat_id)
            .and_then(|topics| topics.get_mut(topic))
            .and_then(|deck| deck.get_mut(term))
        {
            Some(current) => {
                *current = definition.to_string();
                Ok(())
            }
            None => Err(BotError::validation(FLASHCARD_MISSING)),
        }
    }

    /// 删除并返回旧定义；主题空了就一并删除
    pub fn remove(&mut self, chat_id: ChatId, topic: &str, term: &str) -> Result<String, BotError> {
        let topics = self
            .0
            .get_mut(&chat_id)
            .ok_or_else(|| BotError::validation(FLASHCARD_MISSING))?;
        let deck = topics
            .get_mut(topic)
            .ok_or_else(|| BotError::validation(FLASHCARD_MISSING))?;
        let definition = deck
            .remove(term)
            .ok_or_else(|| BotError::validation(FLASHCARD_MISSING))?;
        if deck.is_empty() {
            topics.remove(topic);
        }
        if topics.is_empty() {
            self.0.remove(&chat_id);
        }
        Ok(definition)
    }

    /// 在所有主题中查找术语：(主题, 定义)
    pub fn lookup(&self, chat_id: ChatId, term: &str) -> Vec<(&str, &str)> {
        let term = normalize(term);
        self.0
            .get(&chat_id)
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(|(topic, deck)| deck.get(&term).map(|d| (topic.as_str(), d.as_str())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// `/fiszka [term]` 的回复文本
pub fn display_flashcard(book: &FlashcardBook, chat_id: ChatId, term: Option<&str>) -> String {
    let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
        return TERM_HINT.to_string();
    };
    let term = normalize(term);
    let found = book.lookup(chat_id, &term);
    if found.is_empty() {
        return TERM_NOT_FOUND.to_string();
    }
    found
        .into_iter()
        .map(|(topic, definition)| format!("{}, {} - {}", topic, term, definition))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `/dodajfiszke`
pub async fn add_flashcard(mut session: DialogSession, book: Arc<Document<FlashcardBook>>) -> Result<(), BotError> {
    let chat_id = session.chat_id();
    let topic = normalize(&session.ask("Podaj temat").await?);
    let term = normalize(&session.ask("Podaj pojecie").await?);
    if book.read(|b| b.contains(chat_id, &topic, &term)).await {
        return Err(BotError::validation(FLASHCARD_EXISTS));
    }

    let definition = session.ask("Podaj definicje").await?.trim().to_string();
    let saved = book
        .mutate(|b| b.add(chat_id, &topic, &term, &definition))
        .await;
    finish(&session, saved, "Dodano fiszke")
}

/// `/usunfiszke`
pub async fn delete_flashcard(mut session: DialogSession, book: Arc<Document<FlashcardBook>>) -> Result<(), BotError> {
    let chat_id = session.chat_id();
    let topic = normalize(&session.ask("Podaj temat").await?);
    let term = normalize(&session.ask("Podaj pojecie").await?);

    let saved = book
        .mutate(|b| b.remove(chat_id, &topic, &term).map(|_| ()))
        .await;
    finish(&session, saved, "Usunieto fiszke")
}

/// `/edytujfiszke`
pub async fn edit_flashcard(mut session: DialogSession, book: Arc<Document<FlashcardBook>>) -> Result<(), BotError> {
    let chat_id = session.chat_id();
    let topic = normalize(&session.ask("Podaj temat").await?);
    let term = normalize(&session.ask("Podaj pojecie").await?);
    if !book.read(|b| b.contains(chat_id, &topic, &term)).await {
        return Err(BotError::validation(FLASHCARD_MISSING));
    }

    let definition = session.ask("Podaj definicje").await?.trim().to_string();
    let saved = book
        .mutate(|b| b.edit(chat_id, &topic, &term, &definition))
        .await;
    finish(&session, saved, "Edytowano fiszke")
}
