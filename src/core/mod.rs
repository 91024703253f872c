//! 核心层：错误类型、基础标识、优雅关闭

pub mod error;
pub mod shutdown;
pub mod types;

pub use error::{BotError, PAST_DATE_MESSAGE, PERSISTENCE_WARNING};
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use types::ChatId;
