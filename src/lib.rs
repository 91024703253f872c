//! StudyBot - Telegram 学习助手
//!
//! 模块划分：
//! - **bot**: 分发循环（命令 → 即时回复 / 对话脚本 / 当前会话）
//! - **commands**: 命令表
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、关闭信号、ChatId
//! - **features**: 闪卡、知识测验、提醒、课程表、帮助脚本
//! - **integrations**: 传输层接口与 Telegram 长轮询实现
//! - **observability**: tracing 初始化
//! - **outbox**: 按 chat 保序的发送队列
//! - **reminders**: 两段式提醒与启动时重建调度
//! - **session**: 每个 chat 至多一个对话会话
//! - **store**: JSON 文档与单写者持久化

pub mod bot;
pub mod commands;
pub mod config;
pub mod core;
pub mod features;
pub mod integrations;
pub mod observability;
pub mod outbox;
pub mod reminders;
pub mod session;
pub mod store;

pub use bot::Bot;
pub use core::{BotError, ChatId};
