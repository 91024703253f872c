//! 帮助与版本信息

use crate::commands::Command;

pub fn version_text() -> String {
    format!("v {}", env!("CARGO_PKG_VERSION"))
}

/// `/help` 的回复：每个命令一行
pub fn help_text() -> String {
    let mut out = String::from("Dostępne komendy:\n");
    for command in Command::documented() {
        out.push_str(&format!("{} - {}\n", command.usage(), command.description()));
    }
    out.trim_end().to_string()
}
