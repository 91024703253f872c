//! 提醒：记录模型、时钟与两段式调度器
//!
//! - **model**: 提醒记录、提醒文档与日期格式
//! - **clock**: 调度器读取"现在"的接口
//! - **scheduler**: 启动时重建全部定时任务，运行中新增提醒

mod clock;
mod model;
mod scheduler;

pub use clock::{Clock, SystemClock, TokioClock};
pub use model::{
    format_date, parse_date, render_reminders, Reminder, ReminderBook, ReminderStage, BAD_DATE,
    DATE_LAYOUT,
};
pub use scheduler::{ReminderPolicy, ReminderScheduler};
