//! 提醒记录与提醒文档

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::ChatId;

/// 用户输入与通知中使用的日期格式（DD-MM-RR HH:MM，UTC）
pub const DATE_LAYOUT: &str = "%d-%m-%y %H:%M";

pub const BAD_DATE: &str = "Niepoprawny format daty";

/// 两段式通知的进度；随文档持久化，重启后不会重发已发出的预通知
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStage {
    #[default]
    Pending,
    PreNoticeSent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub stage: ReminderStage,
}

impl Reminder {
    pub fn new(fire_at: DateTime<Utc>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            fire_at,
            title: title.into(),
            stage: ReminderStage::Pending,
        }
    }

    /// 两个阶段发送的通知文本相同
    pub fn notice(&self) -> String {
        format!("Przypominam: {} {}", self.title, format_date(self.fire_at))
    }
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.format(DATE_LAYOUT).to_string()
}

pub fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(s.trim(), DATE_LAYOUT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| BAD_DATE.to_string())
}

/// 全部提醒文档：chat → 提醒列表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderBook(BTreeMap<ChatId, Vec<Reminder>>);

impl ReminderBook {
    pub fn push(&mut self, chat_id: ChatId, reminder: Reminder) {
        self.0.entry(chat_id).or_default().push(reminder);
    }

    pub fn list(&self, chat_id: ChatId) -> &[Reminder] {
        self.0.get(&chat_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 所有提醒 (chat, 提醒)
    pub fn entries(&self) -> Vec<(ChatId, Reminder)> {
        self.0
            .iter()
            .flat_map(|(chat_id, list)| list.iter().map(|r| (*chat_id, r.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_stage(&mut self, chat_id: ChatId, id: Uuid, stage: ReminderStage) -> bool {
        match self
            .0
            .get_mut(&chat_id)
            .and_then(|list| list.iter_mut().find(|r| r.id == id))
        {
            Some(reminder) => {
                reminder.stage = stage;
                true
            }
            None => false,
        }
    }

    /// 按 ID 删除；列表空了就删除该 chat 的条目
    pub fn remove(&mut self, chat_id: ChatId, id: Uuid) -> Option<Reminder> {
        let list = self.0.get_mut(&chat_id)?;
        let pos = list.iter().position(|r| r.id == id)?;
        let removed = list.remove(pos);
        if list.is_empty() {
            self.0.remove(&chat_id);
        }
        Some(removed)
    }

    /// 丢弃 fire_at 早于 `floor` 的提醒，返回丢弃数量
    pub fn discard_before(&mut self, floor: DateTime<Utc>) -> usize {
        let before = self.len();
        for list in self.0.values_mut() {
            list.retain(|r| r.fire_at >= floor);
        }
        self.0.retain(|_, list| !list.is_empty());
        before - self.len()
    }
}

/// `/pokazprzypomnienia` 的回复文本，按时间排序
pub fn render_reminders(book: &ReminderBook, chat_id: ChatId) -> String {
    let mut list: Vec<&Reminder> = book.list(chat_id).iter().collect();
    list.sort_by_key(|r| r.fire_at);

    let mut out = String::from("Aktualne przypomnienia:");
    if list.is_empty() {
        out.push_str("\nBrak przypomnień");
    }
    for r in list {
        out.push_str(&format!("\n{} - {}", r.title, format_date(r.fire_at)));
    }
    out
}
