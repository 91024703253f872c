//! 机器人错误类型
//!
//! 对话脚本统一返回 `Result<(), BotError>`：超时与取消立即终止脚本并释放会话；
//! 校验类错误由脚本就地告知用户；持久化失败只给出软警告，内存中的修改保留。

use thiserror::Error;

/// 对话、调度与持久化过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BotError {
    /// 在答复窗口内未收到回复
    #[error("Answer timeout")]
    Timeout,

    /// 会话被同一 chat 的新会话抢占
    #[error("Session cancelled")]
    Cancelled,

    /// 输入格式错误、重复或不存在的条目；内容即发给用户的提示
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 提醒时间早于允许的下限
    #[error("Date is before the allowed floor")]
    PastDate,

    /// 序列化或写文件失败
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl BotError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// 超时或取消：脚本应立即结束，不再向用户发送任何内容
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Timeout | Self::Cancelled)
    }

    /// 脚本以该错误结束时发给用户的说明；超时的致歉在提问处已发送，取消则静默
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Timeout | Self::Cancelled => None,
            Self::Validation(msg) => Some(msg.clone()),
            Self::PastDate => Some(PAST_DATE_MESSAGE.to_string()),
            Self::Persistence(_) => Some(PERSISTENCE_WARNING.to_string()),
        }
    }
}

/// 提醒时间太早
pub const PAST_DATE_MESSAGE: &str = "Data jest z przeszłości, spróbuj ponownie";

/// 写文件失败时的软警告（内存中的修改已保留）
pub const PERSISTENCE_WARNING: &str =
    "Wystapil problem, moga wystapic problemy z tym wpisem w przyszlosci, skontaktuj sie z administratorem";

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<std::io::Error> for BotError {
    fn from(e: std::io::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}
