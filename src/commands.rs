//! 命令表：命令名 → 处理方式
//!
//! 只比较消息的第一个词（去掉群聊中的 `@botname` 后缀），因此 `/plan` 与 `/usunplan`、
//! `/fiszka` 与 `/dodajfiszke` 互不混淆。

/// 所有支持的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Version,
    Help,
    /// `/fiszka [term]`
    ShowFlashcard(Option<String>),
    AddFlashcard,
    DeleteFlashcard,
    EditFlashcard,
    KnowledgeTest,
    AddReminder,
    ShowReminders,
    AddClass,
    EditClass,
    DeleteClass,
    DeleteSchedule,
    ShowSchedule,
}

impl Command {
    /// 解析一条消息；不是命令时返回 None
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim_start();
        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (text, ""),
        };
        let name = head.split('@').next().unwrap_or(head);

        let command = match name {
            "/version" => Command::Version,
            "/help" | "/start" => Command::Help,
            "/fiszka" => Command::ShowFlashcard(Some(rest.to_string()).filter(|r| !r.is_empty())),
            "/dodajfiszke" => Command::AddFlashcard,
            "/usunfiszke" => Command::DeleteFlashcard,
            "/edytujfiszke" => Command::EditFlashcard,
            "/test" => Command::KnowledgeTest,
            "/dodajprzypomnienie" => Command::AddReminder,
            "/pokazprzypomnienia" => Command::ShowReminders,
            "/dodajzajecia" => Command::AddClass,
            "/edytujzajecia" => Command::EditClass,
            "/usunzajecia" => Command::DeleteClass,
            "/usunplan" => Command::DeleteSchedule,
            "/plan" => Command::ShowSchedule,
            _ => return None,
        };
        Some(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Version => "/version",
            Command::Help => "/help",
            Command::ShowFlashcard(_) => "/fiszka",
            Command::AddFlashcard => "/dodajfiszke",
            Command::DeleteFlashcard => "/usunfiszke",
            Command::EditFlashcard => "/edytujfiszke",
            Command::KnowledgeTest => "/test",
            Command::AddReminder => "/dodajprzypomnienie",
            Command::ShowReminders => "/pokazprzypomnienia",
            Command::AddClass => "/dodajzajecia",
            Command::EditClass => "/edytujzajecia",
            Command::DeleteClass => "/usunzajecia",
            Command::DeleteSchedule => "/usunplan",
            Command::ShowSchedule => "/plan",
        }
    }

    /// 是否启动多步对话（占用该 chat 的会话槽位）
    pub fn starts_dialog(&self) -> bool {
        matches!(
            self,
            Command::AddFlashcard
                | Command::DeleteFlashcard
                | Command::EditFlashcard
                | Command::KnowledgeTest
                | Command::AddReminder
                | Command::AddClass
                | Command::EditClass
                | Command::DeleteClass
                | Command::DeleteSchedule
        )
    }

    pub fn usage(&self) -> &'static str {
        match self {
            Command::ShowFlashcard(_) => "/fiszka [pojecie]",
            other => other.name(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::Version => "wersja bota",
            Command::Help => "lista komend",
            Command::ShowFlashcard(_) => "pokaż definicję pojęcia",
            Command::AddFlashcard => "dodaj fiszkę",
            Command::DeleteFlashcard => "usuń fiszkę",
            Command::EditFlashcard => "edytuj fiszkę",
            Command::KnowledgeTest => "test wiedzy z wybranego tematu",
            Command::AddReminder => "dodaj przypomnienie",
            Command::ShowReminders => "pokaż przypomnienia",
            Command::AddClass => "dodaj zajęcia do planu",
            Command::EditClass => "edytuj zajęcia",
            Command::DeleteClass => "usuń zajęcia",
            Command::DeleteSchedule => "usuń cały plan",
            Command::ShowSchedule => "pokaż plan zajęć",
        }
    }

    /// 帮助中列出的命令，按展示顺序
    pub fn documented() -> Vec<Command> {
        vec![
            Command::Help,
            Command::Version,
            Command::ShowFlashcard(None),
            Command::AddFlashcard,
            Command::EditFlashcard,
            Command::DeleteFlashcard,
            Command::KnowledgeTest,
            Command::AddReminder,
            Command::ShowReminders,
            Command::ShowSchedule,
            Command::AddClass,
            Command::EditClass,
            Command::DeleteClass,
            Command::DeleteSchedule,
        ]
    }
}
