//! 课程表：每个 chat 一周七天，每天按开始时间排序的课程列表

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::finish;
use crate::core::{BotError, ChatId};
use crate::session::DialogSession;
use crate::store::Document;

pub const TIME_LAYOUT: &str = "%H:%M";
pub const UNKNOWN_DAY: &str = "Nie znam takiego dnia :(";
pub const BAD_TIME: &str = "Niepoprawny format godziny";
pub const ENDS_BEFORE_START: &str = "Zajęcia nie mogą się kończyć przed rozpoczęciem :/";
pub const CLASS_EXISTS: &str = "Podane zajęcia są juz zapisane";
pub const CLASS_MISSING: &str = "Podane zajęcia nie istnieją";
pub const EMPTY_SCHEDULE: &str = "Brak zajęć :/";

/// 星期（周一开始）；声明顺序即排序顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn polish_name(self) -> &'static str {
        match self {
            Weekday::Monday => "poniedziałek",
            Weekday::Tuesday => "wtorek",
            Weekday::Wednesday => "środa",
            Weekday::Thursday => "czwartek",
            Weekday::Friday => "piątek",
            Weekday::Saturday => "sobota",
            Weekday::Sunday => "niedziela",
        }
    }

    /// 按波兰语名称解析，不区分大小写
    pub fn parse_polish(s: &str) -> Option<Weekday> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|d| d.polish_name() == s)
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.polish_name())
    }
}

/// 一节课
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub name: String,
}

impl Class {
    /// 结束早于开始时拒绝（相等允许）
    pub fn new(start: NaiveTime, end: NaiveTime, name: impl Into<String>) -> Result<Self, BotError> {
        if end < start {
            return Err(BotError::validation(ENDS_BEFORE_START));
        }
        Ok(Self {
            start,
            end,
            name: name.into(),
        })
    }

    fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {}",
            self.start.format(TIME_LAYOUT),
            self.end.format(TIME_LAYOUT),
            self.name
        )
    }
}

pub fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s.trim(), TIME_LAYOUT).map_err(|_| BAD_TIME.to_string())
}

pub fn parse_weekday(s: &str) -> Result<Weekday, String> {
    Weekday::parse_polish(s).ok_or_else(|| UNKNOWN_DAY.to_string())
}

/// 按开始时间有序插入；开始时间相同时排在已有课程之后
pub fn insert_sorted(day: &mut Vec<Class>, class: Class) {
    let pos = day
        .iter()
        .position(|c| class.start < c.start)
        .unwrap_or(day.len());
    day.insert(pos, class);
}

/// 全部课程表文档：chat → 星期 → 课程
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timetable(BTreeMap<ChatId, BTreeMap<Weekday, Vec<Class>>>);

impl Timetable {
    pub fn day(&self, chat_id: ChatId, day: Weekday) -> &[Class] {
        self.0
            .get(&chat_id)
            .and_then(|week| week.get(&day))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, chat_id: ChatId, day: Weekday, name: &str) -> bool {
        self.day(chat_id, day).iter().any(|c| c.is_named(name))
    }

    pub fn add_class(&mut self, chat_id: ChatId, day: Weekday, class: Class) -> Result<(), BotError> {
        if self.contains(chat_id, day, &class.name) {
            return Err(BotError::validation(CLASS_EXISTS));
        }
        let list = self.0.entry(chat_id).or_default().entry(day).or_default();
        insert_sorted(list, class);
        Ok(())
    }

    pub fn remove_class(&mut self, chat_id: ChatId, day: Weekday, name: &str) -> Result<Class, BotError> {
        let week = self
            .0
            .get_mut(&chat_id)
            .ok_or_else(|| BotError::validation(CLASS_MISSING))?;
        let list = week
            .get_mut(&day)
            .ok_or_else(|| BotError::validation(CLASS_MISSING))?;
        let pos = list
            .iter()
            .position(|c| c.is_named(name))
            .ok_or_else(|| BotError::validation(CLASS_MISSING))?;
        let removed = list.remove(pos);
        if list.is_empty() {
            week.remove(&day);
        }
        if week.is_empty() {
            self.0.remove(&chat_id);
        }
        Ok(removed)
    }

    /// 用新课程替换同名旧课程并重新排序；新名称与当天其他课程重名时拒绝
    pub fn replace_class(&mut self, chat_id: ChatId, day: Weekday, old_name: &str, class: Class) -> Result<(), BotError> {
        if !self.contains(chat_id, day, old_name) {
            return Err(BotError::validation(CLASS_MISSING));
        }
        if !class.is_named(old_name) && self.contains(chat_id, day, &class.name) {
            return Err(BotError::validation(CLASS_EXISTS));
        }
        self.remove_class(chat_id, day, old_name)?;
        self.add_class(chat_id, day, class)
    }

    pub fn clear(&mut self, chat_id: ChatId) {
        self.0.remove(&chat_id);
    }

    /// `/plan` 的回复文本
    pub fn render(&self, chat_id: ChatId) -> String {
        let Some(week) = self.0.get(&chat_id) else {
            return EMPTY_SCHEDULE.to_string();
        };
        let mut out = String::new();
        for (day, classes) in week.iter().filter(|(_, c)| !c.is_empty()) {
            out.push_str(day.polish_name());
            out.push('\n');
            for class in classes {
                out.push_str(&class.to_string());
                out.push('\n');
            }
            out.push('\n');
        }
        if out.is_empty() {
            EMPTY_SCHEDULE.to_string()
        } else {
            out.trim_end().to_string()
        }
    }
}

/// 依次询问开始与结束时间
async fn ask_hours(session: &mut DialogSession) -> Result<(NaiveTime, NaiveTime), BotError> {
    let start = session
        .ask_parsed("Podaj godzinę rozpoczęcia w formacie HH:MM", parse_time)
        .await?;
    let end = session
        .ask_parsed("Podaj godzinę zakończenia w formacie HH:MM", parse_time)
        .await?;
    if end < start {
        return Err(BotError::validation(ENDS_BEFORE_START));
    }
    Ok((start, end))
}

/// `/dodajzajecia`
pub async fn add_class(mut session: DialogSession, timetable: Arc<Document<Timetable>>) -> Result<(), BotError> {
    let chat_id = session.chat_id();
    let day = session.ask_parsed("Podaj dzień tygodnia", parse_weekday).await?;
    let (start, end) = ask_hours(&mut session).await?;
    let name = session.ask("Podaj nazwę").await?.trim().to_string();
    if timetable.read(|t| t.contains(chat_id, day, &name)).await {
        return Err(BotError::validation(CLASS_EXISTS));
    }

    let class = Class::new(start, end, name)?;
    let saved = timetable.mutate(|t| t.add_class(chat_id, day, class)).await;
    finish(&session, saved, "Dodano zajęcia")
}

/// `/edytujzajecia`
pub async fn edit_class(mut session: DialogSession, timetable: Arc<Document<Timetable>>) -> Result<(), BotError> {
    let chat_id = session.chat_id();
    let day = session.ask_parsed("Podaj dzień tygodnia", parse_weekday).await?;
    let old_name = session.ask("Podaj nazwę").await?.trim().to_string();
    if !timetable.read(|t| t.contains(chat_id, day, &old_name)).await {
        return Err(BotError::validation(CLASS_MISSING));
    }

    let (start, end) = ask_hours(&mut session).await?;
    let name = session.ask("Podaj nową nazwę").await?.trim().to_string();
    let class = Class::new(start, end, name)?;
    let saved = timetable
        .mutate(|t| t.replace_class(chat_id, day, &old_name, class))
        .await;
    finish(&session, saved, "Edytowano zajęcia")
}

/// `/usunzajecia`
pub async fn delete_class(mut session: DialogSession, timetable: Arc<Document<Timetable>>) -> Result<(), BotError> {
    let chat_id = session.chat_id();
    let day = session.ask_parsed("Podaj dzień tygodnia", parse_weekday).await?;
    let name = session.ask("Podaj nazwę").await?.trim().to_string();

    let saved = timetable
        .mutate(|t| t.remove_class(chat_id, day, &name).map(|_| ()))
        .await;
    finish(&session, saved, "Usunięto zajęcia")
}

/// `/usunplan`
pub async fn delete_schedule(mut session: DialogSession, timetable: Arc<Document<Timetable>>) -> Result<(), BotError> {
    let chat_id = session.chat_id();
    let answer = session.ask("Napisz 'TAK' zeby usunąć plan").await?;
    if answer.trim() != "TAK" {
        session.say("Ok, nie usuwamy");
        return Ok(());
    }

    let saved = timetable
        .mutate(|t| {
            t.clear(chat_id);
            Ok(())
        })
        .await;
    finish(&session, saved, "Usunięto plan")
}
