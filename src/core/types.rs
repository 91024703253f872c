//! 基础标识类型

use std::fmt;

use serde::{Deserialize, Serialize};

/// 对话对端（一个远程用户或群组）的标识；所有按用户划分的状态都以它为主键。
///
/// JSON 文档中作为对象的键出现（`{"12345": ...}`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
