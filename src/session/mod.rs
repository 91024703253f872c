//! 会话引擎
//!
//! - **registry**: 会话注册表，保证每个 chat 至多一个活跃的多步对话
//! - **dialog**: 对话引擎，一问一答、超时与取消

mod dialog;
mod registry;

pub use dialog::{get_answer, DialogSession, TIMEOUT_APOLOGY};
pub use registry::{SessionId, SessionRegistry};
